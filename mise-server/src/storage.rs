use std::path::{Path, PathBuf};

use base64::Engine;
use sha2::{Digest, Sha256};

use crate::illustrate::{EncodedImage, ImageError};

/// Public URL prefix the image directory is served under.
pub const GENERATED_URL_PREFIX: &str = "/generated";

/// Write-once store for generated images. Files are never updated or removed.
#[derive(Clone, Debug)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode and write an image, returning its server-relative URL.
    pub async fn save(&self, prompt: &str, image: &EncodedImage) -> Result<String, ImageError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(image.base64.trim())?;
        if bytes.is_empty() {
            return Err(ImageError::MissingPayload);
        }
        let name = format!(
            "{}.{}",
            file_stem(prompt, chrono::Utc::now().timestamp_micros()),
            extension_for(&bytes, &image.mime_type)
        );
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&name), &bytes).await?;
        tracing::info!("Saved generated image {name} ({} bytes)", bytes.len());
        Ok(format!("{GENERATED_URL_PREFIX}/{name}"))
    }
}

/// First 16 hex digits of the SHA-256 of the prompt and the time.
fn file_stem(prompt: &str, micros: i64) -> String {
    let digest = Sha256::digest(format!("{prompt}{micros}").as_bytes());
    hex::encode(&digest[..8])
}

/// Trust the bytes over the declared MIME type.
fn extension_for(bytes: &[u8], mime_type: &str) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::WebP) => "webp",
        Ok(image::ImageFormat::Gif) => "gif",
        _ => match mime_type {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        },
    }
}
