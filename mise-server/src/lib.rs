pub mod auth;
pub mod config;
pub mod database;
pub mod detect;
pub mod errors;
pub mod generation;
pub mod illustrate;
pub mod routes;
pub mod saved;
pub mod state;
pub mod storage;
