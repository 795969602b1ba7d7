use crate::detection::ParseLimits;
use crate::error::GrexError;
use crate::reconcile::MAX_NAME_DEPTH;
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Tunables of the detection engine.
///
/// Loaded from a `key = value` file; blank lines and lines starting with `#` are
/// ignored. Keys that are absent keep their default.
///
/// ```text
/// # grex.conf
/// min-score = 40
/// parallel-scoring = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Scores at or below this are not a match.
    pub min_score: u32,
    /// The deepest parent chain a hierarchical directory may have.
    pub max_name_depth: usize,
    /// The most entries a single directory may declare.
    pub max_entry_count: u64,
    /// Score descriptors on the rayon pool.
    pub parallel_scoring: bool,
    /// Extract entries on the rayon pool.
    pub parallel_extraction: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_score: 25,
            max_name_depth: MAX_NAME_DEPTH,
            max_entry_count: 1_000_000,
            parallel_scoring: false,
            parallel_extraction: true,
        }
    }
}

impl EngineConfig {
    /// Loads the configuration file at `file_name` over the defaults.
    pub fn load<P: AsRef<Path>>(file_name: P) -> Result<Self, GrexError> {
        let path = file_name.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => GrexError::FileNotFound(path.display().to_string()),
            _ => err.into(),
        })?;
        Self::parse(file)
    }

    /// Parses configuration lines from `reader` over the defaults.
    pub fn parse<R: Read>(reader: R) -> Result<Self, GrexError> {
        let mut config = Self::default();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((name, value)) = line.split_once('=') else {
                return Err(GrexError::InvalidData(format!(
                    "Expected key = value, found {line:?}"
                )));
            };
            let (name, value) = (name.trim(), value.trim());
            match name {
                "min-score" => config.min_score = parse_value(name, value)?,
                "max-name-depth" => config.max_name_depth = parse_value(name, value)?,
                "max-entry-count" => config.max_entry_count = parse_value(name, value)?,
                "parallel-scoring" => config.parallel_scoring = parse_value(name, value)?,
                "parallel-extraction" => config.parallel_extraction = parse_value(name, value)?,
                _ => warn!("Ignoring unknown configuration key {name:?}"),
            }
        }
        Ok(config)
    }

    /// The parse limits handed to descriptors.
    pub fn limits(&self) -> ParseLimits {
        ParseLimits {
            max_entry_count: self.max_entry_count,
            max_name_depth: self.max_name_depth,
        }
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, GrexError> {
    value
        .parse()
        .map_err(|_| GrexError::InvalidData(format!("Invalid value {value:?} for {name}")))
}
