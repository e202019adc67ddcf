use crate::error::ConfigError;
use crate::screen_diff::pairing::PatternRule;
use image::ImageFormat;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Full comparison configuration, loaded once and passed by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub image_directory: PathBuf,
    pub file_patterns: FilePatterns,
    pub comparison: ComparisonOptions,
    pub output: OutputOptions,
}

/// How screenshot filenames are recognized and paired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilePatterns {
    pub file_extension: String,
    pub marker_a: String,
    pub marker_b: String,
    pub separator: String,
    /// Tried in order, first match wins
    pub rules: Vec<PatternRule>,
}

/// Settings handed to the pixel comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComparisonOptions {
    /// 0..1, lower is more sensitive
    pub threshold: f64,
    pub include_anti_aliasing: bool,
    pub alpha_weight: f64,
    pub emit_mask: bool,
    pub diff_color: [u8; 3],
    pub anti_alias_color: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputOptions {
    pub diff_prefix: String,
    pub generate_diff_images: bool,
    pub clean_before_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_directory: PathBuf::from(r"D:\AutoScreenCut"),
            file_patterns: FilePatterns::default(),
            comparison: ComparisonOptions::default(),
            output: OutputOptions::default(),
        }
    }
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self {
            file_extension: ".png".to_string(),
            marker_a: "A".to_string(),
            marker_b: "B".to_string(),
            separator: "_".to_string(),
            rules: vec![
                PatternRule::Numeric,
                PatternRule::NumericCompact,
                PatternRule::Suffix,
            ],
        }
    }
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            include_anti_aliasing: true,
            alpha_weight: 1.0,
            emit_mask: true,
            diff_color: [255, 0, 0],
            anti_alias_color: [255, 255, 0],
        }
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            diff_prefix: "diff_".to_string(),
            generate_diff_images: true,
            clean_before_run: true,
        }
    }
}

impl FilePatterns {
    /// Extension with a guaranteed leading dot, e.g. `.png`
    pub fn extension(&self) -> String {
        if self.file_extension.starts_with('.') {
            self.file_extension.clone()
        } else {
            format!(".{}", self.file_extension)
        }
    }

    /// ASCII case-insensitive extension check.
    pub fn has_extension(&self, file_name: &str) -> bool {
        let ext = self.extension();
        file_name.len() > ext.len()
            && file_name
                .get(file_name.len() - ext.len()..)
                .is_some_and(|tail| tail.eq_ignore_ascii_case(&ext))
    }

    /// File name without the configured extension.
    pub fn strip_extension<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        if self.has_extension(file_name) {
            file_name.get(..file_name.len() - self.extension().len())
        } else {
            None
        }
    }
}

impl Config {
    /// Read, parse and validate a config file. No fallback.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::from_file`] but any failure is logged and the default
    /// bundle is returned instead.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path.as_ref()) {
            Ok(config) => {
                info!("Loaded config from {}", path.as_ref().display());
                config
            }
            Err(err) => {
                warn!("{err}; using default configuration");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let patterns = &self.file_patterns;
        if patterns.file_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid(
                "filePatterns.fileExtension must not be empty".to_string(),
            ));
        }
        let ext = patterns.extension();
        let lossless_rgba = matches!(
            ImageFormat::from_extension(ext.trim_start_matches('.')),
            Some(ImageFormat::Png | ImageFormat::Tiff | ImageFormat::Bmp | ImageFormat::WebP)
        );
        if !lossless_rgba {
            return Err(ConfigError::Invalid(format!(
                "filePatterns.fileExtension {ext} cannot store RGBA overlays losslessly \
                 (use .png, .tiff, .bmp or .webp)"
            )));
        }
        if patterns.marker_a.is_empty() || patterns.marker_b.is_empty() {
            return Err(ConfigError::Invalid(
                "role markers must not be empty".to_string(),
            ));
        }
        if patterns.marker_a == patterns.marker_b {
            return Err(ConfigError::Invalid(format!(
                "role markers must differ, both are {:?}",
                patterns.marker_a
            )));
        }
        if patterns.rules.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one filename rule must be enabled".to_string(),
            ));
        }

        let threshold = self.comparison.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "comparison.threshold must be within 0..1, got {threshold}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn partial_file_is_filled_from_defaults() {
        let file = write_config(
            r#"{
                "imageDirectory": "/tmp/shots",
                "comparison": { "threshold": 0.3 },
                "output": { "diffPrefix": "delta_" }
            }"#,
        );

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.image_directory, PathBuf::from("/tmp/shots"));
        assert_eq!(config.comparison.threshold, 0.3);
        assert!(config.comparison.include_anti_aliasing);
        assert_eq!(config.output.diff_prefix, "delta_");
        assert!(config.output.generate_diff_images);
        assert_eq!(config.file_patterns, FilePatterns::default());
    }

    #[test]
    fn full_original_layout_parses() {
        let file = write_config(
            r#"{
                "imageDirectory": "C:\\shots",
                "filePatterns": { "fileExtension": ".png", "rules": ["suffix"] },
                "comparison": {
                    "threshold": 1,
                    "includeAntiAliasing": false,
                    "alphaWeight": 0.5,
                    "emitMask": true,
                    "diffColor": [0, 255, 0],
                    "antiAliasColor": [0, 0, 255]
                },
                "output": { "diffPrefix": "diff_", "generateDiffImages": false }
            }"#,
        );

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.file_patterns.rules, vec![PatternRule::Suffix]);
        assert_eq!(config.comparison.diff_color, [0, 255, 0]);
        assert!(!config.comparison.include_anti_aliasing);
        assert!(!config.output.generate_diff_images);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = write_config("{ not json");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(Config::load_or_default(file.path()), Config::default());
    }

    #[test]
    fn empty_extension_is_rejected() {
        let file = write_config(r#"{ "filePatterns": { "fileExtension": "" } }"#);
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn lossy_or_unknown_extensions_are_rejected() {
        for ext in [".jpg", "jpeg", ".gif", ".txt"] {
            let mut config = Config::default();
            config.file_patterns.file_extension = ext.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{ext} should be rejected"
            );
        }
        for ext in [".png", "tiff", ".TIF", ".bmp", ".webp"] {
            let mut config = Config::default();
            config.file_patterns.file_extension = ext.to_string();
            assert!(config.validate().is_ok(), "{ext} should be accepted");
        }
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = Config::default();
        config.comparison.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn extension_matching_ignores_case_and_missing_dot() {
        let patterns = FilePatterns {
            file_extension: "png".to_string(),
            ..FilePatterns::default()
        };
        assert_eq!(patterns.extension(), ".png");
        assert!(patterns.has_extension("home_A_001.PNG"));
        assert!(!patterns.has_extension("home_A_001.jpg"));
        assert!(!patterns.has_extension(".png"));
        assert_eq!(patterns.strip_extension("x_B_1.png"), Some("x_B_1"));
    }
}
