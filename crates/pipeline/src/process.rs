//! Turning downloaded bytes into a storable cover image.

use crate::upload::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

const JPEG_QUALITY: u8 = 85;

/// A processed image, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Given raw bytes, produce processed bytes with dimensions and a mime type.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn process(&self, bytes: Vec<u8>) -> Result<ProcessedImage>;
}

/// Sniff the image format from its leading bytes.
pub fn detect_image_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    if bytes.len() >= 12 && bytes[0..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return Some("webp");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if bytes.starts_with(b"BM") {
        return Some("bmp");
    }
    None
}

/// [`ImageProcessor`] backed by the `image` crate.
///
/// Images are scaled down so that their longest edge is at most `max_edge`.
/// PNGs stay PNG; everything else is re-encoded as JPEG.
#[derive(Debug, Clone, Copy)]
pub struct DefaultProcessor {
    max_edge: u32,
}
impl DefaultProcessor {
    pub fn new(max_edge: u32) -> Self {
        Self { max_edge: max_edge.max(1) }
    }

    fn process_blocking(self, bytes: &[u8]) -> Result<ProcessedImage> {
        let Some(extension) = detect_image_extension(bytes) else {
            tracing::debug!(len = bytes.len(), "Bytes are not a recognised image format");
            exn::bail!(ErrorKind::ProcessingFailed);
        };
        let decoded = image::load_from_memory(bytes).or_raise(|| ErrorKind::ProcessingFailed)?;
        let resized = self.fit(decoded);
        let (width, height) = resized.dimensions();
        let mut out = Vec::new();
        let (content_type, extension) = if extension == "png" {
            resized
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .or_raise(|| ErrorKind::ProcessingFailed)?;
            ("image/png", "png")
        } else {
            DynamicImage::ImageRgb8(resized.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
                .or_raise(|| ErrorKind::ProcessingFailed)?;
            ("image/jpeg", "jpg")
        };
        Ok(ProcessedImage {
            bytes: out,
            width,
            height,
            content_type,
            extension,
        })
    }

    fn fit(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = image.dimensions();
        if width.max(height) <= self.max_edge {
            return image;
        }
        // `resize` preserves the aspect ratio within the bounds.
        image.resize(self.max_edge, self.max_edge, FilterType::Lanczos3)
    }
}

#[async_trait]
impl ImageProcessor for DefaultProcessor {
    async fn process(&self, bytes: Vec<u8>) -> Result<ProcessedImage> {
        let processor = *self;
        tokio::task::spawn_blocking(move || processor.process_blocking(&bytes))
            .await
            .or_raise(|| ErrorKind::ProcessingFailed)?
    }
}
