/// Photo intake for inspection sheets
///
/// Photos picked from disk are decoded once, downscaled so the longest side
/// fits `max_side`, re-encoded as JPEG and kept inline on the record as a
/// `data:image/jpeg;base64,...` URI. Records therefore carry their photos with
/// them and need no cache directory.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default longest side for stored photos (same as the editing preview tier)
pub const DEFAULT_MAX_SIDE: u32 = 1280;

/// JPEG quality used when re-encoding photos
const JPEG_QUALITY: u8 = 80;

const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhotoError {
    #[error("no se pudo leer la foto: {0}")]
    Io(String),
    #[error("imagen no válida: {0}")]
    Decode(String),
    #[error("no se pudo codificar la foto: {0}")]
    Encode(String),
    #[error("data URI no válida")]
    InvalidDataUri,
}

/// An embedded image, stored as a self-describing data URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Photo(String);

impl Photo {
    /// Wrap an existing data URI. Only the `data:<mime>;base64,` shape is checked,
    /// the payload itself is decoded lazily.
    pub fn from_data_uri(uri: impl Into<String>) -> Result<Self, PhotoError> {
        let uri = uri.into();
        let (header, payload) = uri.split_once(',').ok_or(PhotoError::InvalidDataUri)?;
        if !header.starts_with("data:") || !header.ends_with(";base64") || payload.is_empty() {
            return Err(PhotoError::InvalidDataUri);
        }
        Ok(Photo(uri))
    }

    /// Build a photo from already-encoded JPEG bytes
    pub fn from_jpeg_bytes(bytes: &[u8]) -> Self {
        Photo(format!("{}{}", JPEG_DATA_URI_PREFIX, BASE64.encode(bytes)))
    }

    pub fn as_data_uri(&self) -> &str {
        &self.0
    }

    /// Decode the base64 payload back into the raw file bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, PhotoError> {
        let (_, payload) = self.0.split_once(',').ok_or(PhotoError::InvalidDataUri)?;
        BASE64
            .decode(payload.trim())
            .map_err(|_| PhotoError::InvalidDataUri)
    }

    /// Decode into pixels. Fails with `Decode` if the bytes are not an image.
    pub fn decode(&self) -> Result<DynamicImage, PhotoError> {
        let bytes = self.to_bytes()?;
        image::load_from_memory(&bytes).map_err(|e| PhotoError::Decode(e.to_string()))
    }
}

/// Load a photo from disk, downscale it and return it as an inline JPEG
pub fn load_photo(path: &Path, max_side: u32) -> Result<Photo, PhotoError> {
    let bytes = std::fs::read(path).map_err(|e| PhotoError::Io(e.to_string()))?;
    let img = image::load_from_memory(&bytes).map_err(|e| PhotoError::Decode(e.to_string()))?;

    debug!(
        "📷 Loaded photo {:?}: {}x{}",
        path.file_name().unwrap_or_default(),
        img.width(),
        img.height()
    );

    let scaled = downscale(img, max_side);
    let jpeg = encode_jpeg(&scaled)?;
    Ok(Photo::from_jpeg_bytes(&jpeg))
}

/// Async wrapper, decoding and resizing is CPU-bound
pub async fn load_photo_async(path: std::path::PathBuf, max_side: u32) -> Result<Photo, PhotoError> {
    tokio::task::spawn_blocking(move || load_photo(&path, max_side))
        .await
        .map_err(|e| PhotoError::Io(format!("Task join error: {}", e)))?
}

/// Shrink so the longest side is at most `max_side`. Smaller images are kept as-is.
pub fn downscale(img: DynamicImage, max_side: u32) -> DynamicImage {
    if img.width() <= max_side && img.height() <= max_side {
        return img;
    }
    // resize() keeps the aspect ratio inside the bounding box
    img.resize(max_side, max_side, FilterType::Lanczos3)
}

/// Encode as baseline RGB JPEG
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, PhotoError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| PhotoError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) fn test_photo(width: u32, height: u32) -> Photo {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 120, 40]),
    ));
    Photo::from_jpeg_bytes(&encode_jpeg(&img).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_shape() {
        assert!(Photo::from_data_uri("data:image/png;base64,AAAA").is_ok());
        assert_eq!(
            Photo::from_data_uri("image/png;base64,AAAA"),
            Err(PhotoError::InvalidDataUri)
        );
        assert_eq!(
            Photo::from_data_uri("data:image/png,AAAA"),
            Err(PhotoError::InvalidDataUri)
        );
        assert_eq!(
            Photo::from_data_uri("data:image/png;base64,"),
            Err(PhotoError::InvalidDataUri)
        );
    }

    #[test]
    fn test_jpeg_photo_decodes() {
        let photo = test_photo(40, 30);
        assert!(photo.as_data_uri().starts_with("data:image/jpeg;base64,"));
        let img = photo.decode().unwrap();
        assert_eq!((img.width(), img.height()), (40, 30));
    }

    #[test]
    fn test_garbage_payload_fails_decode() {
        let photo = Photo::from_data_uri("data:image/jpeg;base64,bm90IGFuIGltYWdl").unwrap();
        assert!(matches!(photo.decode(), Err(PhotoError::Decode(_))));
    }

    #[test]
    fn test_downscale_keeps_aspect() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4000, 2000));
        let scaled = downscale(img, 1280);
        assert_eq!((scaled.width(), scaled.height()), (1280, 640));

        let small = DynamicImage::ImageRgb8(image::RgbImage::new(300, 200));
        let kept = downscale(small, 1280);
        assert_eq!((kept.width(), kept.height()), (300, 200));
    }

    #[test]
    fn test_load_photo_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valvula.png");
        image::RgbImage::from_pixel(2000, 1000, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let photo = load_photo(&path, 500).unwrap();
        let img = photo.decode().unwrap();
        assert_eq!((img.width(), img.height()), (500, 250));
    }
}
