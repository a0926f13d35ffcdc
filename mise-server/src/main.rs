use anyhow::{anyhow, Context, Result};
use clap::Parser;
use mise_server::{config::Config, routes, state::AppState};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// The address and optionally port to bind to
    #[clap(long, default_value = "0.0.0.0:3001")]
    address: String,

    /// Whether to use HTTPS / TLS
    #[clap(long)]
    tls: bool,

    /// PEM certificate chain, used with --tls
    #[clap(long, default_value = "certs/fullchain.pem")]
    cert_path: String,

    /// PEM private key, used with --tls
    #[clap(long, default_value = "certs/privkey.pem")]
    key_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Reading configuration")?;

    // initialize tracing; keep the guard alive so buffered lines get flushed
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _guard = match &config.log_dir {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "access.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .json()
                .with_writer(non_blocking)
                .with_env_filter(filter())
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter()).init();
            None
        }
    };
    tracing::info!("Starting with {:?}", config);

    // Parse command line arguments
    let args = Args::parse();

    let state = AppState::from_config(&config)
        .await
        .context("Building application state")?;
    let app = routes::router(state);

    // In development, use HTTP. In production, use HTTPS.
    if args.tls {
        rustls::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;
        let tls_config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(&args.cert_path, &args.key_path)
                .await
                .context("Loading TLS certificate")?;

        let addr = args.address.parse()?;
        tracing::info!("Listening on {}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .context("Starting TLS server")?;
    } else {
        let listener = tokio::net::TcpListener::bind(&args.address).await?;
        tracing::info!("Listening on {}", args.address);
        axum::serve(listener, app).await?;
    }
    Ok(())
}
