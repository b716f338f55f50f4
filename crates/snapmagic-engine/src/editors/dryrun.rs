use std::io::Cursor;

use image::{ImageFormat, Rgba};
use sha2::{Digest, Sha256};
use snapmagic_contracts::photos::EditedImage;

use super::ImageEditor;
use crate::codec::{self, ImagePayload};
use crate::error::EditError;

const TINT_STRENGTH: f32 = 0.25;

/// Offline editor: blends a prompt-derived tint over the input and returns a
/// PNG. Useful for demos and for exercising a batch without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunEditor;

impl ImageEditor for DryrunEditor {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn edit(&self, payload: &ImagePayload, prompt: &str) -> Result<EditedImage, EditError> {
        let decoded = image::load_from_memory(&payload.bytes).map_err(|err| {
            EditError::EmptyResult(format!("dryrun could not decode input: {err}"))
        })?;
        let (r, g, b) = tint_from_prompt(prompt);
        let mut canvas = decoded.to_rgba8();
        for pixel in canvas.pixels_mut() {
            let Rgba([pr, pg, pb, pa]) = *pixel;
            *pixel = Rgba([mix(pr, r), mix(pg, g), mix(pb, b), pa]);
        }

        let mut out = Cursor::new(Vec::new());
        canvas
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|err| EditError::Service(format!("dryrun encode failed: {err}")))?;
        Ok(codec::decode(out.into_inner(), Some("image/png")))
    }
}

fn tint_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

fn mix(base: u8, tint: u8) -> u8 {
    let value = base as f32 * (1.0 - TINT_STRENGTH) + tint as f32 * TINT_STRENGTH;
    value.round().clamp(0.0, 255.0) as u8
}
