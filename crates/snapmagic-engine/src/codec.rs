use std::fs;
use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageReader;
use snapmagic_contracts::photos::{mime_for_path, EditedImage, PhotoSource};

use crate::error::EditError;

pub const DEFAULT_OUTPUT_MIME: &str = "image/png";

/// Original image content ready for transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn encode(source: &PhotoSource) -> Result<ImagePayload, EditError> {
    let bytes = fs::read(&source.path).map_err(|source_err| EditError::Read {
        path: source.path.clone(),
        source: source_err,
    })?;
    let declared = source.mime_type.trim();
    let mime_type = if declared.is_empty() {
        mime_for_path(&source.path)
            .unwrap_or("application/octet-stream")
            .to_string()
    } else {
        declared.to_string()
    };
    Ok(ImagePayload { bytes, mime_type })
}

/// Wraps returned image bytes. Any mime type is accepted; a missing one means
/// PNG.
pub fn decode(bytes: Vec<u8>, mime_type: Option<&str>) -> EditedImage {
    let mime_type = mime_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_OUTPUT_MIME);
    EditedImage::new(bytes, mime_type)
}

/// Reads width and height from the image header, if the format is known.
pub fn dimensions(image: &EditedImage) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(image.bytes.as_slice()))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
