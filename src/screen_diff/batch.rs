use super::compare::PixelComparator;
use super::overlay::render_overlay;
use super::pairing::{discover_pairs, scan_directory};
use super::raster::{load_grid, write_overlay};
use super::{ComparisonResult, ImagePair};
use crate::config::Config;
use crate::error::PairError;
use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Aggregate of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub results: Vec<ComparisonResult>,
    pub total_pairs: usize,
    pub pairs_with_diff: usize,
    pub pairs_without_diff: usize,
    pub total_diff_pixels: u64,
    /// File names of the overlays written this run
    pub overlays: Vec<String>,
    pub stale_removed: usize,
}

impl BatchSummary {
    /// Fold in a finished pair. Counters only move here.
    fn record(&mut self, result: ComparisonResult) {
        self.total_pairs += 1;
        if result.has_diff {
            self.pairs_with_diff += 1;
            self.total_diff_pixels += result.diff_pixel_count;
        } else {
            self.pairs_without_diff += 1;
        }

        if let Some(name) = result
            .output_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
        {
            if !self.overlays.contains(&name) {
                self.overlays.push(name);
            }
        }

        self.results.push(result);
    }

    pub fn failed_pairs(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stale_removed > 0 {
            writeln!(f, "🧹 Removed {} stale overlay image(s)", self.stale_removed)?;
            writeln!(f)?;
        }
        writeln!(f, "=== Comparison complete ===")?;
        writeln!(f, "Total pairs: {}", self.total_pairs)?;
        writeln!(f, "Pairs with differences: {}", self.pairs_with_diff)?;
        writeln!(f, "Pairs without differences: {}", self.pairs_without_diff)?;
        writeln!(f, "Total differing pixels: {}", self.total_diff_pixels)?;

        if !self.results.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Details ===")?;
            for result in &self.results {
                match (&result.error_message, result.has_diff) {
                    (Some(err), _) => writeln!(f, "❌ [{}] {}", result.identity_key, err)?,
                    (None, true) => writeln!(
                        f,
                        "🔍 [{}] {} differing pixels",
                        result.identity_key, result.diff_pixel_count
                    )?,
                    (None, false) => writeln!(f, "✅ [{}] no differences", result.identity_key)?,
                }
            }
        }

        if !self.overlays.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Overlay images ===")?;
            for name in &self.overlays {
                writeln!(f, "🔴 {name}")?;
            }
        }

        Ok(())
    }
}

/// Delete overlays left behind by earlier runs.
///
/// Matches regular files named `<diffPrefix>*<extension>`. Files that cannot
/// be removed are logged and skipped.
pub fn sweep_stale_overlays(dir: &Path, config: &Config) -> Result<usize> {
    let prefix = config.output.diff_prefix.as_str();
    if prefix.is_empty() {
        warn!("Empty diff prefix, refusing to sweep {}", dir.display());
        return Ok(0);
    }

    let mut removed = 0;
    for name in scan_directory(dir, config)? {
        if !name.starts_with(prefix) {
            continue;
        }
        let path = dir.join(&name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed stale overlay {name}");
                removed += 1;
            }
            Err(err) => warn!("Could not remove stale overlay {}: {err}", path.display()),
        }
    }

    if removed > 0 {
        info!("Removed {removed} stale overlay image(s)");
    }
    Ok(removed)
}

/// Drives discovery, comparison and overlay rendering over a directory,
/// one pair at a time.
pub struct BatchRunner<'a, C> {
    config: &'a Config,
    comparator: C,
}

impl<'a, C: PixelComparator> BatchRunner<'a, C> {
    pub fn new(config: &'a Config, comparator: C) -> Self {
        Self { config, comparator }
    }

    fn image_dir(&self) -> &Path {
        &self.config.image_directory
    }

    /// Run the whole batch. Only an invalid configuration or an unreadable
    /// image directory is an error; every per-pair fault ends up in the
    /// summary instead.
    pub fn run(&self) -> Result<BatchSummary> {
        self.config.validate()?;
        let dir = self.image_dir();
        info!("Scanning {}", dir.display());

        let mut summary = BatchSummary::default();
        if self.config.output.clean_before_run {
            summary.stale_removed = sweep_stale_overlays(dir, self.config)?;
        }

        let names = scan_directory(dir, self.config)?;
        let pairs = discover_pairs(&names, dir, self.config)?;
        if pairs.is_empty() {
            info!("No comparable image pairs in {}", dir.display());
            return Ok(summary);
        }
        info!("Found {} image pair(s) to compare", pairs.len());

        for pair in &pairs {
            let result = self.process_pair(pair);
            summary.record(result);
        }

        info!(
            "Compared {} pair(s), {} with differences",
            summary.total_pairs, summary.pairs_with_diff
        );
        Ok(summary)
    }

    /// Compare a single pair, converting any fault into an error result.
    pub fn process_pair(&self, pair: &ImagePair) -> ComparisonResult {
        info!("Comparing [{}]: {} vs {}", pair.identity_key, pair.label_a, pair.label_b);
        match self.try_process_pair(pair) {
            Ok(result) => result,
            Err(err) => {
                warn!("Pair [{}] skipped: {err}", pair.identity_key);
                ComparisonResult::failed(&pair.identity_key, &err)
            }
        }
    }

    fn try_process_pair(&self, pair: &ImagePair) -> Result<ComparisonResult, PairError> {
        let before = load_grid(&pair.path_a)?;
        let after = load_grid(&pair.path_b)?;

        if before.dimensions() != after.dimensions() {
            return Err(PairError::DimensionMismatch {
                a_width: before.width(),
                a_height: before.height(),
                b_width: after.width(),
                b_height: after.height(),
            });
        }

        let options = &self.config.comparison;
        let diff = self.comparator.compare(&before, &after, options)?;
        debug!("[{}] {} differing pixels", pair.identity_key, diff.diff_pixel_count);

        if diff.diff_pixel_count == 0 {
            return Ok(ComparisonResult::no_diff(&pair.identity_key));
        }

        if !self.config.output.generate_diff_images {
            return Ok(ComparisonResult::diff(&pair.identity_key, diff.diff_pixel_count, None));
        }

        let overlay = render_overlay(&after, &diff.mask, options.diff_color)?;
        let output_path = self.overlay_path(pair);
        write_overlay(&output_path, &overlay)?;
        info!("Overlay written to {}", output_path.display());

        Ok(ComparisonResult::diff(
            &pair.identity_key,
            diff.diff_pixel_count,
            Some(output_path),
        ))
    }

    /// `<image dir>/<diffPrefix><prefix>_<fragment><extension>`
    pub fn overlay_path(&self, pair: &ImagePair) -> PathBuf {
        let file_name = format!(
            "{}{}_{}{}",
            self.config.output.diff_prefix,
            pair.prefix,
            pair.fragment.as_str(),
            self.config.file_patterns.extension()
        );
        self.image_dir().join(file_name)
    }
}
