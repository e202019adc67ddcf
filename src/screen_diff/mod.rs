pub mod batch;
pub mod compare;
pub mod overlay;
pub mod pairing;
pub mod raster;

use image::RgbaImage;
use serde::Serialize;
use std::path::PathBuf;

/// Trailing part of a filename that, with the prefix, identifies a pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrailingFragment {
    /// Digits as written in the filename; leading zeros are kept for identity
    Sequence(String),
    Text(String),
}

impl TrailingFragment {
    pub fn as_str(&self) -> &str {
        match self {
            TrailingFragment::Sequence(digits) => digits,
            TrailingFragment::Text(text) => text,
        }
    }
}

/// One before/after comparison unit discovered in the image directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub identity_key: String,
    pub prefix: String,
    pub fragment: TrailingFragment,
    pub label_a: String,
    pub label_b: String,
    pub path_a: PathBuf,
    pub path_b: PathBuf,
}

/// Per-pixel difference flags. Only the alpha channel carries meaning:
/// non-zero alpha marks a differing pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffMask(RgbaImage);

impl DiffMask {
    pub fn new(buffer: RgbaImage) -> Self {
        Self(buffer)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn is_flagged(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[3] != 0
    }

    pub fn flagged_count(&self) -> usize {
        self.0.pixels().filter(|px| px.0[3] != 0).count()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.0
    }
}

/// Outcome of one pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub identity_key: String,
    pub has_diff: bool,
    pub diff_pixel_count: u64,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
}

impl ComparisonResult {
    pub fn no_diff(identity_key: &str) -> Self {
        Self {
            identity_key: identity_key.to_string(),
            has_diff: false,
            diff_pixel_count: 0,
            output_path: None,
            error_message: None,
        }
    }

    pub fn diff(identity_key: &str, diff_pixel_count: u64, output_path: Option<PathBuf>) -> Self {
        Self {
            identity_key: identity_key.to_string(),
            has_diff: true,
            diff_pixel_count,
            output_path,
            error_message: None,
        }
    }

    /// Failed pairs count as "no diff" in the aggregate
    pub fn failed(identity_key: &str, error: &crate::error::PairError) -> Self {
        Self {
            identity_key: identity_key.to_string(),
            has_diff: false,
            diff_pixel_count: 0,
            output_path: None,
            error_message: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}
