use super::{DescriptorInfo, Signature};
use crate::error::GrexError;
use crate::ext::io_ext::ReadExt;
use crate::source::{ReadSeek, Source};
use crate::validator::Validator;
use std::io::{Seek, SeekFrom};
use std::path::Path;

/// Fixed point weights of the individual scoring checks.
pub mod weight {
    /// The candidate's extension is one the descriptor declares.
    pub const EXTENSION: u32 = 25;
    /// A magic signature matched.
    pub const SIGNATURE: u32 = 50;
    /// A structural header field is plausible.
    pub const FIELD: u32 = 10;
}

/// Upper bounds applied while parsing a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// The most entries a single directory may declare.
    pub max_entry_count: u64,
    /// The deepest parent chain a hierarchical directory may have.
    pub max_name_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_entry_count: 1_000_000,
            max_name_depth: crate::reconcile::MAX_NAME_DEPTH,
        }
    }
}

/// A candidate container handed to descriptors for scoring and parsing.
#[derive(Debug, Clone)]
pub struct Probe {
    source: Source,
    file_name: String,
    size: u64,
    limits: ParseLimits,
}

impl Probe {
    /// Creates a probe over `source`, recording its current size.
    pub fn new(source: Source, file_name: impl Into<String>) -> Result<Self, GrexError> {
        let size = source.size()?;
        Ok(Self {
            source,
            file_name: file_name.into(),
            size,
            limits: ParseLimits::default(),
        })
    }

    /// Creates a probe over the file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, GrexError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !path.is_file() {
            return Err(GrexError::FileNotFound(path.display().to_string()));
        }
        Self::new(Source::from_path(path), file_name)
    }

    /// Creates a probe over bytes held in memory.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            source: Source::from_bytes(bytes),
            file_name: file_name.into(),
            size,
            limits: ParseLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file name without its extension.
    pub fn file_stem(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.file_name,
        }
    }

    /// The lowercase extension of the file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// The size of the candidate when the probe was created.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn limits(&self) -> ParseLimits {
        self.limits
    }

    /// Opens an independent cursor on the candidate.
    pub fn open(&self) -> Result<Box<dyn ReadSeek>, GrexError> {
        self.source.open()
    }

    /// Starts scoring the candidate with its own cursor.
    pub fn score_card(&self) -> Result<ScoreCard<'_>, GrexError> {
        Ok(ScoreCard {
            probe: self,
            reader: self.open()?,
            score: 0,
        })
    }
}

/// Accumulates the weights of the checks a candidate passes.
///
/// A check that fails simply adds nothing. Reads past the end of the candidate and
/// validator rejections count as failed checks; other errors are returned.
pub struct ScoreCard<'p> {
    probe: &'p Probe,
    reader: Box<dyn ReadSeek>,
    score: u32,
}

impl ScoreCard<'_> {
    /// Adds `weight` if the candidate's extension is one of `extensions`.
    pub fn extension(&mut self, extensions: &[&str], weight: u32) -> bool {
        let matched = self.probe.extension().is_some_and(|ext| {
            extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(&ext))
        });
        if matched {
            self.score += weight;
        }
        matched
    }

    /// Adds `weight` if `magic` is found at `offset`.
    pub fn signature(&mut self, signature: &Signature, weight: u32) -> Result<bool, GrexError> {
        let end = signature.offset.saturating_add(signature.magic.len() as u64);
        if end > self.probe.size() {
            return Ok(false);
        }
        self.reader.seek(SeekFrom::Start(signature.offset))?;
        let found = self.reader.peek_bytes(signature.magic.len())?;
        let matched = found == signature.magic;
        if matched {
            self.score += weight;
        }
        Ok(matched)
    }

    /// Adds `weight` once if any of the descriptor's signatures match.
    ///
    /// A descriptor without signatures never matches here.
    pub fn signatures(&mut self, info: &DescriptorInfo, weight: u32) -> Result<bool, GrexError> {
        for signature in info.signatures {
            if self.signature(signature, weight)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Runs a structural check and adds `weight` if it succeeds.
    ///
    /// The check receives the cursor and the candidate size.
    pub fn field<F>(&mut self, weight: u32, check: F) -> Result<bool, GrexError>
    where
        F: FnOnce(&mut dyn ReadSeek, u64) -> Result<(), GrexError>,
    {
        match check(self.reader.as_mut(), self.probe.size()) {
            Ok(()) => {
                self.score += weight;
                Ok(true)
            }
            Err(err) if err.is_mismatch() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Adds `weight` if `offset` lies inside the candidate.
    pub fn offset_in_bounds(&mut self, offset: i64, weight: u32) -> bool {
        let valid = Validator::check_offset(offset, self.probe.size()).is_ok();
        if valid {
            self.score += weight;
        }
        valid
    }

    pub fn total(&self) -> u32 {
        self.score
    }
}
