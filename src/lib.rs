#![deny(clippy::all)]

pub mod config;
pub mod error;
pub mod screen_diff;

pub use config::Config;
pub use error::{ConfigError, PairError};
pub use screen_diff::batch::{BatchRunner, BatchSummary, sweep_stale_overlays};
pub use screen_diff::compare::{PixelComparator, PixelDiff, YiqComparator};
pub use screen_diff::pairing::{PatternRule, discover_pairs, scan_directory};
pub use screen_diff::{ComparisonResult, DiffMask, ImagePair, TrailingFragment};
