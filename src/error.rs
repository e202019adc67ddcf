use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a configuration file.
///
/// These never abort a run on their own; `Config::load_or_default` logs them
/// and falls back to the default bundle.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Faults confined to a single image pair.
#[derive(Debug, Error)]
pub enum PairError {
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("dimension mismatch: A {a_width}x{a_height}, B {b_width}x{b_height}")]
    DimensionMismatch {
        a_width: u32,
        a_height: u32,
        b_width: u32,
        b_height: u32,
    },

    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("comparator failed: {0}")]
    Comparator(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_message_names_both_sizes() {
        let err = PairError::DimensionMismatch {
            a_width: 10,
            a_height: 20,
            b_width: 12,
            b_height: 20,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("dimension mismatch"));
        assert!(msg.contains("10x20"));
        assert!(msg.contains("12x20"));
    }
}
