use super::DiffMask;
use crate::config::ComparisonOptions;
use crate::error::PairError;
use image::{Rgba, RgbaImage};

/// Largest possible YIQ delta between two pixels
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Difference count plus the per-pixel mask it was derived from
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDiff {
    pub diff_pixel_count: u64,
    pub mask: DiffMask,
}

/// Per-pixel image comparison.
///
/// Implementations must be pure and deterministic, flag a mask pixel (alpha
/// non-zero) exactly when it is counted, and flag no fewer pixels as the
/// threshold decreases. Callers only invoke it on equally sized grids.
pub trait PixelComparator {
    fn compare(
        &self,
        before: &RgbaImage,
        after: &RgbaImage,
        options: &ComparisonOptions,
    ) -> Result<PixelDiff, PairError>;
}

impl<T: PixelComparator + ?Sized> PixelComparator for &T {
    fn compare(
        &self,
        before: &RgbaImage,
        after: &RgbaImage,
        options: &ComparisonOptions,
    ) -> Result<PixelDiff, PairError> {
        (**self).compare(before, after, options)
    }
}

/// Perceptual comparator working on YIQ colour distance with
/// anti-aliasing detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct YiqComparator;

impl PixelComparator for YiqComparator {
    fn compare(
        &self,
        before: &RgbaImage,
        after: &RgbaImage,
        options: &ComparisonOptions,
    ) -> Result<PixelDiff, PairError> {
        let (width, height) = before.dimensions();
        if after.dimensions() != (width, height) {
            return Err(PairError::DimensionMismatch {
                a_width: width,
                a_height: height,
                b_width: after.width(),
                b_height: after.height(),
            });
        }

        let mut mask = RgbaImage::new(width, height);

        if before.as_raw() == after.as_raw() {
            if !options.emit_mask {
                for (x, y, px) in before.enumerate_pixels() {
                    mask.put_pixel(x, y, faded_gray(px, options.alpha_weight));
                }
            }
            return Ok(PixelDiff {
                diff_pixel_count: 0,
                mask: DiffMask::new(mask),
            });
        }

        let max_delta = MAX_YIQ_DELTA * options.threshold * options.threshold;
        let [dr, dg, db] = options.diff_color;
        let [ar, ag, ab] = options.anti_alias_color;
        let mut count = 0u64;

        for y in 0..height {
            for x in 0..width {
                let p1 = before.get_pixel(x, y);
                let p2 = after.get_pixel(x, y);
                let delta = color_delta(p1, p2, false);

                let out = if delta.abs() > max_delta {
                    let anti_aliased = !options.include_anti_aliasing
                        && (is_anti_aliased(before, after, x, y)
                            || is_anti_aliased(after, before, x, y));
                    if anti_aliased {
                        Rgba([ar, ag, ab, 0])
                    } else {
                        count += 1;
                        Rgba([dr, dg, db, 255])
                    }
                } else if options.emit_mask {
                    Rgba([0, 0, 0, 0])
                } else {
                    faded_gray(p1, options.alpha_weight)
                };
                mask.put_pixel(x, y, out);
            }
        }

        Ok(PixelDiff {
            diff_pixel_count: count,
            mask: DiffMask::new(mask),
        })
    }
}

fn blend(c: f64, a: f64) -> f64 {
    255.0 + (c - 255.0) * a
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

/// Pixel blended onto white by its own alpha
fn flatten(px: &Rgba<u8>) -> (f64, f64, f64) {
    let [r, g, b, a] = px.0;
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    if a < 255 {
        let a = f64::from(a) / 255.0;
        (blend(r, a), blend(g, a), blend(b, a))
    } else {
        (r, g, b)
    }
}

/// Signed YIQ distance; negative when the second pixel is brighter.
/// With `y_only` only the brightness difference is returned.
fn color_delta(p1: &Rgba<u8>, p2: &Rgba<u8>, y_only: bool) -> f64 {
    if p1 == p2 {
        return 0.0;
    }

    let (r1, g1, b1) = flatten(p1);
    let (r2, g2, b2) = flatten(p2);
    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let dy = y1 - y2;
    if y_only {
        return dy;
    }

    let di = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let dq = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq;
    if y1 > y2 { -delta } else { delta }
}

fn faded_gray(px: &Rgba<u8>, alpha_weight: f64) -> Rgba<u8> {
    let [r, g, b, a] = px.0;
    let luma = rgb2y(f64::from(r), f64::from(g), f64::from(b));
    let v = blend(luma, alpha_weight * f64::from(a) / 255.0).clamp(0.0, 255.0) as u8;
    Rgba([v, v, v, 0])
}

/// Inclusive 3x3 neighbourhood bounds clamped to the grid
fn neighbourhood(img: &RgbaImage, x: u32, y: u32) -> (u32, u32, u32, u32) {
    let (width, height) = img.dimensions();
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(width - 1),
        (y + 1).min(height - 1),
    )
}

/// Whether the pixel at (x, y) looks like an anti-aliased edge: it has
/// both a darker and a brighter neighbour, and one of those extremes sits in
/// a flat region of both images.
fn is_anti_aliased(img: &RgbaImage, other: &RgbaImage, x: u32, y: u32) -> bool {
    let (x0, y0, x2, y2) = neighbourhood(img, x, y);
    let center = img.get_pixel(x, y);
    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let mut min_at = None;
    let mut max_at = None;

    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }
            let delta = color_delta(center, img.get_pixel(nx, ny), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_at = Some((nx, ny));
            } else if delta > max {
                max = delta;
                max_at = Some((nx, ny));
            }
        }
    }

    let flat_in_both = |at: Option<(u32, u32)>| {
        at.is_some_and(|(ax, ay)| {
            has_many_siblings(img, ax, ay) && has_many_siblings(other, ax, ay)
        })
    };
    match (min_at, max_at) {
        (Some(_), Some(_)) => flat_in_both(min_at) || flat_in_both(max_at),
        _ => false,
    }
}

/// More than two identical neighbours (edges count as one)
fn has_many_siblings(img: &RgbaImage, x: u32, y: u32) -> bool {
    let (x0, y0, x2, y2) = neighbourhood(img, x, y);
    let center = img.get_pixel(x, y);
    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);

    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }
            if img.get_pixel(nx, ny) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn options(threshold: f64) -> ComparisonOptions {
        ComparisonOptions {
            threshold,
            ..ComparisonOptions::default()
        }
    }

    /// Horizontal gradient with a few hard edits
    fn sample_pair() -> (RgbaImage, RgbaImage) {
        let before = RgbaImage::from_fn(16, 8, |x, _| {
            let v = (x * 16) as u8;
            Rgba([v, v, v, 255])
        });
        let mut after = before.clone();
        after.put_pixel(2, 2, Rgba([255, 0, 0, 255]));
        after.put_pixel(9, 5, Rgba([0, 0, 255, 255]));
        after.put_pixel(12, 1, Rgba([40, 200, 40, 255]));
        let shifted = after.get_pixel(5, 5).0;
        after.put_pixel(5, 5, Rgba([shifted[0] + 10, shifted[1] + 10, shifted[2] + 10, 255]));
        (before, after)
    }

    #[test]
    fn test_identical_grids_have_no_diff() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([12, 34, 56, 255]));
        let result = YiqComparator.compare(&img, &img.clone(), &options(0.0)).unwrap();
        assert_eq!(result.diff_pixel_count, 0);
        assert_eq!(result.mask.flagged_count(), 0);
    }

    #[test]
    fn test_count_matches_flagged_mask_pixels() {
        let (before, after) = sample_pair();
        for emit_mask in [true, false] {
            let opts = ComparisonOptions {
                emit_mask,
                ..options(0.05)
            };
            let result = YiqComparator.compare(&before, &after, &opts).unwrap();
            assert!(result.diff_pixel_count > 0);
            assert_eq!(result.diff_pixel_count as usize, result.mask.flagged_count());
        }
    }

    #[test]
    fn test_flagged_pixels_use_diff_color() {
        let before = RgbaImage::from_pixel(5, 5, WHITE);
        let mut after = before.clone();
        after.put_pixel(2, 3, BLACK);
        let opts = ComparisonOptions {
            diff_color: [1, 2, 3],
            ..options(0.1)
        };

        let result = YiqComparator.compare(&before, &after, &opts).unwrap();
        assert_eq!(result.diff_pixel_count, 1);
        assert!(result.mask.is_flagged(2, 3));
        assert_eq!(*result.mask.as_image().get_pixel(2, 3), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_lower_threshold_never_flags_fewer() {
        let (before, after) = sample_pair();
        let counts: Vec<u64> = [1.0, 0.5, 0.2, 0.1, 0.05, 0.0]
            .iter()
            .map(|&t| YiqComparator.compare(&before, &after, &options(t)).unwrap().diff_pixel_count)
            .collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{counts:?}");
        assert_eq!(counts[0], 0);
        assert_eq!(counts[5], 4);
    }

    #[test]
    fn test_deterministic() {
        let (before, after) = sample_pair();
        let first = YiqComparator.compare(&before, &after, &options(0.1)).unwrap();
        let second = YiqComparator.compare(&before, &after, &options(0.1)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_anti_aliased_edge_can_be_excluded() {
        // Black/white split with a mid-gray pixel inserted on the edge
        let before = RgbaImage::from_fn(6, 6, |x, _| if x < 3 { BLACK } else { WHITE });
        let mut after = before.clone();
        after.put_pixel(3, 2, Rgba([128, 128, 128, 255]));

        let counted = YiqComparator.compare(&before, &after, &options(0.1)).unwrap();
        assert_eq!(counted.diff_pixel_count, 1);

        let opts = ComparisonOptions {
            include_anti_aliasing: false,
            ..options(0.1)
        };
        let skipped = YiqComparator.compare(&before, &after, &opts).unwrap();
        assert_eq!(skipped.diff_pixel_count, 0);
        assert!(!skipped.mask.is_flagged(3, 2));
        assert_eq!(*skipped.mask.as_image().get_pixel(3, 2), Rgba([255, 255, 0, 0]));
    }

    #[test]
    fn test_mismatched_sizes_rejected() {
        let a = RgbaImage::new(4, 4);
        let b = RgbaImage::new(4, 5);
        assert!(matches!(
            YiqComparator.compare(&a, &b, &options(0.1)),
            Err(PairError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_color_delta_sign() {
        assert!(color_delta(&WHITE, &BLACK, false) < 0.0);
        assert!(color_delta(&BLACK, &WHITE, false) > 0.0);
        assert_eq!(color_delta(&WHITE, &WHITE, false), 0.0);
    }
}
