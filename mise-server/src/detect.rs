//! Ingredient detection by an external program.
//!
//! The program gets an image path as its last argument and must print a JSON
//! array of ingredient names on stdout.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::process::Command;

#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("Failed to start ingredient detection")]
    Spawn(#[from] std::io::Error),
    #[error("Ingredient detection failed")]
    Failed { details: String },
    #[error("Failed to parse detection output")]
    BadOutput { details: String },
}

impl DetectError {
    /// What went wrong, for the client.
    pub fn details(&self) -> String {
        match self {
            DetectError::Spawn(err) => err.to_string(),
            DetectError::Failed { details } | DetectError::BadOutput { details } => details.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Detector {
    program: String,
    args: Vec<String>,
}

impl Detector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line such as `python3 detect.py`.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace().map(String::from);
        let program = words.next().context("Detector command is empty")?;
        Ok(Self::new(program, words.collect()))
    }

    pub async fn detect(&self, image: &Path) -> Result<Vec<String>, DetectError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("Detector exited with {}: {stderr}", output.status);
            return Err(DetectError::Failed {
                details: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            });
        }
        let ingredients: Vec<String> =
            serde_json::from_slice(&output.stdout).map_err(|err| DetectError::BadOutput {
                details: format!(
                    "{err}: {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                ),
            })?;
        Ok(ingredients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(body: &str) -> Detector {
        // `sh -c <body> detect <image>` makes the image path `$1`.
        Detector::new("sh", vec!["-c".into(), body.into(), "detect".into()])
    }

    #[test]
    fn command_line_is_split() {
        let detector = Detector::from_command_line("python3  backend/detect.py").unwrap();
        assert_eq!(detector.program, "python3");
        assert_eq!(detector.args, vec!["backend/detect.py"]);
        assert!(Detector::from_command_line("   ").is_err());
    }

    #[tokio::test]
    async fn reads_json_list_from_stdout() {
        let detector = script(r#"test -n "$1" && echo '["tomato", "basil"]'"#);
        let ingredients = detector.detect(Path::new("/tmp/upload.jpg")).await.unwrap();
        assert_eq!(ingredients, vec!["tomato", "basil"]);
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let detector = script("echo 'model missing' >&2; exit 3");
        let err = detector.detect(Path::new("x.jpg")).await.unwrap_err();
        assert!(matches!(err, DetectError::Failed { .. }));
        assert_eq!(err.details(), "model missing");
    }

    #[tokio::test]
    async fn non_list_output_is_bad_output() {
        let detector = script(r#"echo '{"ingredients": []}'"#);
        let err = detector.detect(Path::new("x.jpg")).await.unwrap_err();
        assert!(matches!(err, DetectError::BadOutput { .. }));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let detector = Detector::new("/nonexistent/detector", vec![]);
        let err = detector.detect(Path::new("x.jpg")).await.unwrap_err();
        assert!(matches!(err, DetectError::Spawn(_)));
    }
}
