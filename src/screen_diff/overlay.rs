use super::DiffMask;
use crate::error::PairError;
use image::{Rgba, RgbaImage};

/// Copy of `after` with every flagged mask pixel forced to `highlight`,
/// fully opaque. Unflagged pixels are left untouched.
pub fn render_overlay(
    after: &RgbaImage,
    mask: &DiffMask,
    highlight: [u8; 3],
) -> Result<RgbaImage, PairError> {
    let (width, height) = after.dimensions();
    let (mask_width, mask_height) = mask.dimensions();
    if (mask_width, mask_height) != (width, height) {
        return Err(PairError::DimensionMismatch {
            a_width: width,
            a_height: height,
            b_width: mask_width,
            b_height: mask_height,
        });
    }

    let [r, g, b] = highlight;
    let mut overlay = after.clone();
    for (x, y, px) in overlay.enumerate_pixels_mut() {
        if mask.is_flagged(x, y) {
            *px = Rgba([r, g, b, 255]);
        }
    }

    Ok(overlay)
}
