use super::{ImagePair, TrailingFragment};
use crate::config::{Config, FilePatterns};
use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Filename grammar. With `S` the separator and `M` a role marker:
/// - `Numeric`: `<prefix>S<M>S<digits>`
/// - `NumericCompact`: `<prefix>S<M><digits>`
/// - `Suffix`: `<prefix>S<M>S<any text>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternRule {
    Numeric,
    NumericCompact,
    Suffix,
}

impl PatternRule {
    fn is_numeric(self) -> bool {
        matches!(self, PatternRule::Numeric | PatternRule::NumericCompact)
    }

    fn pattern(self, separator: &str, marker_a: &str, marker_b: &str) -> String {
        let sep = regex::escape(separator);
        let role = format!("(?P<role>{}|{})", regex::escape(marker_a), regex::escape(marker_b));
        let tail = match self {
            PatternRule::Numeric => format!("{sep}(?P<frag>[0-9]+)"),
            PatternRule::NumericCompact => "(?P<frag>[0-9]+)".to_string(),
            PatternRule::Suffix => format!("{sep}(?P<frag>.+)"),
        };
        format!("^(?P<prefix>.+){sep}{role}{tail}$")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    A,
    B,
}

/// Result of matching a single filename against the rule list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMatch {
    pub prefix: String,
    pub role: Role,
    pub fragment: TrailingFragment,
}

/// Compiled, ordered rule list
#[derive(Debug)]
pub struct PairMatcher {
    rules: Vec<(PatternRule, Regex)>,
    marker_a: String,
    separator: String,
}

impl PairMatcher {
    pub fn new(patterns: &FilePatterns) -> Result<Self> {
        let rules = patterns
            .rules
            .iter()
            .map(|&rule| {
                let pattern =
                    rule.pattern(&patterns.separator, &patterns.marker_a, &patterns.marker_b);
                Regex::new(&pattern)
                    .with_context(|| format!("Failed to compile filename rule {rule:?}"))
                    .map(|re| (rule, re))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            marker_a: patterns.marker_a.clone(),
            separator: patterns.separator.clone(),
        })
    }

    /// Match a file stem (extension already removed). First rule wins.
    pub fn match_stem(&self, stem: &str) -> Option<FileMatch> {
        self.rules.iter().find_map(|(rule, re)| {
            let caps = re.captures(stem)?;
            let role = if &caps["role"] == self.marker_a {
                Role::A
            } else {
                Role::B
            };
            let frag = caps["frag"].to_string();
            let fragment = if rule.is_numeric() {
                TrailingFragment::Sequence(frag)
            } else {
                TrailingFragment::Text(frag)
            };

            Some(FileMatch {
                prefix: caps["prefix"].to_string(),
                role,
                fragment,
            })
        })
    }

    pub fn identity_key(&self, prefix: &str, fragment: &TrailingFragment) -> String {
        format!("{}{}{}", prefix, self.separator, fragment.as_str())
    }
}

#[derive(Debug)]
struct PartialPair {
    prefix: String,
    fragment: TrailingFragment,
    file_a: Option<String>,
    file_b: Option<String>,
}

/// List the candidate screenshots of a directory (non-recursive).
///
/// Failing to read the directory is the one fault that aborts a batch.
pub fn scan_directory(dir: &Path, config: &Config) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read image directory {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            debug!("Skipping non UTF-8 filename {:?}", entry.file_name());
            continue;
        };
        if config.file_patterns.has_extension(&name) {
            names.push(name);
        }
    }

    Ok(names)
}

/// Group filenames into complete A/B pairs, sorted by prefix then fragment.
///
/// Files whose role has no counterpart are dropped, as are previously
/// generated overlays (names starting with the diff prefix).
pub fn discover_pairs<S: AsRef<str>>(
    file_names: &[S],
    dir: &Path,
    config: &Config,
) -> Result<Vec<ImagePair>> {
    let matcher = PairMatcher::new(&config.file_patterns)?;
    let diff_prefix = config.output.diff_prefix.as_str();
    let mut groups: HashMap<String, PartialPair> = HashMap::new();

    for name in file_names {
        let name = name.as_ref();
        if !diff_prefix.is_empty() && name.starts_with(diff_prefix) {
            debug!("Ignoring overlay artifact {name}");
            continue;
        }
        let Some(stem) = config.file_patterns.strip_extension(name) else {
            continue;
        };
        let Some(found) = matcher.match_stem(stem) else {
            debug!("No filename rule matched {name}");
            continue;
        };

        let key = matcher.identity_key(&found.prefix, &found.fragment);
        let entry = groups.entry(key).or_insert_with(|| PartialPair {
            prefix: found.prefix.clone(),
            fragment: found.fragment.clone(),
            file_a: None,
            file_b: None,
        });
        // Colliding names can split differently; keep the smallest split so
        // the pair does not depend on listing order.
        let smaller = found
            .prefix
            .cmp(&entry.prefix)
            .then_with(|| compare_fragments(&found.fragment, &entry.fragment))
            .is_lt();
        if smaller {
            entry.prefix = found.prefix.clone();
            entry.fragment = found.fragment.clone();
        }
        let slot = match found.role {
            Role::A => &mut entry.file_a,
            Role::B => &mut entry.file_b,
        };
        if let Some(previous) = slot.replace(name.to_string()) {
            debug!("{name} replaces {previous} for the same role");
        }
    }

    let mut pairs: Vec<ImagePair> = groups
        .into_iter()
        .filter_map(|(identity_key, partial)| {
            let (Some(label_a), Some(label_b)) = (partial.file_a, partial.file_b) else {
                debug!("Dropping incomplete pair {identity_key}");
                return None;
            };
            Some(ImagePair {
                identity_key,
                prefix: partial.prefix,
                fragment: partial.fragment,
                path_a: dir.join(&label_a),
                path_b: dir.join(&label_b),
                label_a,
                label_b,
            })
        })
        .collect();

    pairs.sort_by(|a, b| {
        a.prefix
            .cmp(&b.prefix)
            .then_with(|| compare_fragments(&a.fragment, &b.fragment))
    });

    Ok(pairs)
}

/// Sequences order by numeric value and precede free-form text.
fn compare_fragments(a: &TrailingFragment, b: &TrailingFragment) -> Ordering {
    match (a, b) {
        (TrailingFragment::Sequence(x), TrailingFragment::Sequence(y)) => {
            let tx = x.trim_start_matches('0');
            let ty = y.trim_start_matches('0');
            tx.len()
                .cmp(&ty.len())
                .then_with(|| tx.cmp(ty))
                .then_with(|| x.cmp(y))
        }
        (TrailingFragment::Sequence(_), TrailingFragment::Text(_)) => Ordering::Less,
        (TrailingFragment::Text(_), TrailingFragment::Sequence(_)) => Ordering::Greater,
        (TrailingFragment::Text(x), TrailingFragment::Text(y)) => x.cmp(y),
    }
}
