//! Per-image filters: nearest-neighbour upscale and pixel tagging.
//!
//! Filters never mutate their input. Each returns a fresh allocation carrying the input's id,
//! so the caller can drop the input as soon as the call returns.

use crate::error::FilterError;
use crate::types::BYTES_PER_PIXEL;
use crate::utils::config::TransformConsts;
use crate::{Image, ImageId, Pixel};

/// A stage transformation. Implementations are called concurrently on independent images.
pub trait Transform: Send + Sync {
    /// Short stage name for logs and error markers.
    fn name(&self) -> &'static str;

    fn apply(&self, image: &Image) -> Result<Image, FilterError>;
}

/// Upscale by an integer factor.
#[derive(Clone, Copy, Debug)]
pub struct ScaleUp {
    pub factor: u32,
}

impl Default for ScaleUp {
    fn default() -> Self {
        Self {
            factor: TransformConsts::DEFAULT_SCALE_FACTOR,
        }
    }
}

impl Transform for ScaleUp {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn apply(&self, image: &Image) -> Result<Image, FilterError> {
        scale_up(image, self.factor)
    }
}

/// Add the id-derived tag pixel (see [`tag_pixel`]) to every pixel.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddTagPixel;

impl Transform for AddTagPixel {
    fn name(&self) -> &'static str {
        "pixel"
    }

    fn apply(&self, image: &Image) -> Result<Image, FilterError> {
        add_pixel(image, tag_pixel(image.id()))
    }
}

/// Tag for image `id`: byte 0 is `(4 * (id + 1)) % 256`, the rest zero.
pub fn tag_pixel(id: ImageId) -> Pixel {
    let v = TransformConsts::TAG_STEP.wrapping_mul(id.0.wrapping_add(1)) % 256;
    Pixel([v as u8, 0, 0, 0])
}

fn ensure_not_empty(image: &Image) -> Result<(), FilterError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(FilterError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

/// Nearest-neighbour upscale: each source pixel becomes a `factor` x `factor` block.
pub fn scale_up(image: &Image, factor: u32) -> Result<Image, FilterError> {
    if factor == 0 {
        return Err(FilterError::ZeroFactor);
    }
    ensure_not_empty(image)?;
    let overflow = || FilterError::Overflow {
        width: image.width(),
        height: image.height(),
        factor,
    };
    let width = image.width().checked_mul(factor).ok_or_else(overflow)?;
    let height = image.height().checked_mul(factor).ok_or_else(overflow)?;
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(overflow)?;

    let src = image.pixels();
    let src_row = image.width() as usize * BYTES_PER_PIXEL;
    let factor = factor as usize;
    let mut out = Vec::with_capacity(len);
    for row in src.chunks_exact(src_row) {
        let start = out.len();
        for px in row.chunks_exact(BYTES_PER_PIXEL) {
            for _ in 0..factor {
                out.extend_from_slice(px);
            }
        }
        // Remaining rows of the block repeat the row just written.
        for _ in 1..factor {
            out.extend_from_within(start..start + src_row * factor);
        }
    }

    Image::from_rgba(width, height, out)
        .map(|img| img.with_id(image.id()))
        .map_err(|e| FilterError::Other(e.to_string()))
}

/// Per-channel saturating add of `pixel` to every pixel of `image`.
pub fn add_pixel(image: &Image, pixel: Pixel) -> Result<Image, FilterError> {
    ensure_not_empty(image)?;
    let out: Vec<u8> = image
        .pixels()
        .chunks_exact(BYTES_PER_PIXEL)
        .flat_map(|px| {
            let mut sum = [0u8; BYTES_PER_PIXEL];
            for (i, byte) in sum.iter_mut().enumerate() {
                *byte = px[i].saturating_add(pixel.0[i]);
            }
            sum
        })
        .collect();

    Image::from_rgba(image.width(), image.height(), out)
        .map(|img| img.with_id(image.id()))
        .map_err(|e| FilterError::Other(e.to_string()))
}
