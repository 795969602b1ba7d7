//! Heuristic format detection.
//!
//! Every registered [`FormatDescriptor`] scores a candidate [`Probe`]; the
//! [`DetectionEngine`] ranks the scores and hands the candidate to the winner's
//! directory parser. Scoring is a heuristic: the winner's parse may still fail, and
//! that failure is reported rather than retried with the runner-up.

mod engine;
mod probe;

pub use engine::{DetectionEngine, Match};
pub use probe::{weight, ParseLimits, Probe, ScoreCard};

use crate::entry::Entry;
use crate::error::GrexError;

/// A magic byte sequence expected at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub offset: u64,
    pub magic: &'static [u8],
}

/// Static metadata a descriptor declares about the containers it reads.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorInfo {
    /// A human readable format name.
    pub name: &'static str,
    /// File extensions, lowercase and without the leading dot.
    pub extensions: &'static [&'static str],
    /// Magic signatures; a candidate matching any of them matches the format.
    pub signatures: &'static [Signature],
    /// Display labels for the extensions of files found inside the container.
    pub file_types: &'static [(&'static str, &'static str)],
}

impl DescriptorInfo {
    /// Returns `true` if `extension` is one of the declared extensions, ignoring case.
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
    }
}

/// A format-specific reader of container directories.
///
/// Implementations must be stateless between calls: everything a parse needs is read
/// from the probe and kept in locals, so the same descriptor can score and parse
/// many candidates concurrently.
pub trait FormatDescriptor: Send + Sync {
    fn info(&self) -> &DescriptorInfo;

    /// Rates how well `probe` fits this format. Zero means "not this format".
    ///
    /// Failed sub-checks add nothing; only unrecoverable errors such as an I/O
    /// failure are returned, and the engine scores those as zero.
    fn score(&self, probe: &Probe) -> Result<u32, GrexError>;

    /// Reads the container directory and describes every logical file in it.
    fn parse_directory(&self, probe: &Probe) -> Result<Vec<Entry>, GrexError>;
}
