use super::{FormatDescriptor, Probe};
use crate::archive::Archive;
use crate::descriptors::{BlteDescriptor, PakDescriptor};
use crate::engine_config::EngineConfig;
use crate::error::GrexError;
use crate::validator::Validator;
use log::{debug, warn};
use rayon::prelude::*;
use std::fmt;
use std::path::Path;

/// One descriptor's score for a candidate.
#[derive(Clone, Copy)]
pub struct Match<'e> {
    pub descriptor: &'e dyn FormatDescriptor,
    /// The registration index of the descriptor.
    pub index: usize,
    pub score: u32,
}

impl fmt::Debug for Match<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("format", &self.descriptor.info().name)
            .field("index", &self.index)
            .field("score", &self.score)
            .finish()
    }
}

/// Selects the best matching format descriptor for an unidentified candidate.
///
/// The engine keeps no state between calls besides its registered descriptors and
/// configuration. Descriptors are ranked by score; equal scores keep registration
/// order, so the descriptor registered first wins a tie.
pub struct DetectionEngine {
    descriptors: Vec<Box<dyn FormatDescriptor>>,
    config: EngineConfig,
}

impl DetectionEngine {
    /// Creates an engine with no registered descriptors.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            descriptors: Vec::new(),
            config,
        }
    }

    /// Creates an engine with the descriptors shipped in this crate.
    pub fn with_builtin_descriptors(config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        engine.register(PakDescriptor).register(BlteDescriptor);
        engine
    }

    pub fn register<D: FormatDescriptor + 'static>(&mut self, descriptor: D) -> &mut Self {
        self.descriptors.push(Box::new(descriptor));
        self
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &dyn FormatDescriptor> {
        self.descriptors.iter().map(|descriptor| descriptor.as_ref())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scores `probe` with one descriptor. Errors and empty candidates score zero.
    pub fn score(&self, descriptor: &dyn FormatDescriptor, probe: &Probe) -> u32 {
        if probe.size() == 0 {
            return 0;
        }
        match descriptor.score(probe) {
            Ok(score) => score,
            Err(err) => {
                debug!(
                    "{}: {} scoring failed: {err}",
                    probe.file_name(),
                    descriptor.info().name
                );
                0
            }
        }
    }

    /// Scores `probe` with every descriptor and returns the non-zero scores, best first.
    pub fn score_all(&self, probe: &Probe) -> Vec<Match<'_>> {
        let scores = self
            .descriptors
            .iter()
            .map(|descriptor| self.score(descriptor.as_ref(), probe))
            .collect();
        self.rank(scores)
    }

    /// Same as [`DetectionEngine::score_all`], scoring descriptors on the rayon pool.
    ///
    /// Every descriptor opens its own cursor on the candidate.
    pub fn score_all_parallel(&self, probe: &Probe) -> Vec<Match<'_>> {
        let scores = self
            .descriptors
            .par_iter()
            .map(|descriptor| self.score(descriptor.as_ref(), probe))
            .collect();
        self.rank(scores)
    }

    fn rank(&self, scores: Vec<u32>) -> Vec<Match<'_>> {
        let mut matches: Vec<Match<'_>> = scores
            .into_iter()
            .enumerate()
            .filter(|&(_, score)| score > 0)
            .map(|(index, score)| Match {
                descriptor: self.descriptors[index].as_ref(),
                index,
                score,
            })
            .collect();
        // Stable, so ties stay in registration order.
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches
    }

    fn score_configured(&self, probe: &Probe) -> Vec<Match<'_>> {
        if self.config.parallel_scoring {
            self.score_all_parallel(probe)
        } else {
            self.score_all(probe)
        }
    }

    /// Returns up to `n` matches that score above the minimum viable score.
    pub fn best_matches(&self, probe: &Probe, n: usize) -> Vec<Match<'_>> {
        self.score_configured(probe)
            .into_iter()
            .filter(|m| m.score > self.config.min_score)
            .take(n)
            .collect()
    }

    /// Returns the best match, or `NoMatchingFormat` if nothing scores above the minimum.
    pub fn detect(&self, probe: &Probe) -> Result<Match<'_>, GrexError> {
        let matches = self.score_configured(probe);
        for m in &matches {
            debug!(
                "{}: {} scored {}",
                probe.file_name(),
                m.descriptor.info().name,
                m.score
            );
        }
        matches
            .into_iter()
            .next()
            .filter(|m| m.score > self.config.min_score)
            .ok_or_else(|| GrexError::NoMatchingFormat(probe.file_name().to_string()))
    }

    /// Detects the format of `probe` and parses its directory with the winner.
    ///
    /// A parse failure is reported as `ParseFailed`; the next best descriptor is not tried.
    pub fn open(&self, probe: Probe) -> Result<Archive, GrexError> {
        let probe = probe.with_limits(self.config.limits());
        let best = self.detect(&probe)?;
        let info = *best.descriptor.info();
        debug!(
            "{}: parsing as {} (score {})",
            probe.file_name(),
            info.name,
            best.score
        );

        let parse_failed = |reason: GrexError| {
            warn!("{}: {} parse failed: {reason}", probe.file_name(), info.name);
            GrexError::ParseFailed {
                format: info.name.to_string(),
                reason: Box::new(reason),
            }
        };
        let entries = best
            .descriptor
            .parse_directory(&probe)
            .map_err(parse_failed)?;
        Validator::check_count(entries.len(), self.config.max_entry_count).map_err(parse_failed)?;

        debug!("{}: {} entries", probe.file_name(), entries.len());
        Ok(Archive::new(info, probe, entries).with_parallel_extraction(self.config.parallel_extraction))
    }

    /// Opens the container file at `path`.
    pub fn open_path<P: AsRef<Path>>(&self, path: P) -> Result<Archive, GrexError> {
        self.open(Probe::from_path(path)?)
    }
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::with_builtin_descriptors(EngineConfig::default())
    }
}
