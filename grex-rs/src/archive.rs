use crate::detection::{DescriptorInfo, Probe};
use crate::entry::Entry;
use crate::error::GrexError;
use crate::file_type_hints::FileTypeHints;
use crate::reconcile::Reconciler;
use crate::source::Source;
use crate::validator::Validator;
use log::{debug, warn};
use rayon::prelude::*;
use std::fs;
use std::path::Path;

/// The outcome of a batch extraction.
///
/// One entry failing does not stop the others; every entry ends up in exactly one
/// of the two lists, in directory order.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Names of the entries that were extracted.
    pub extracted: Vec<String>,
    /// Names of the entries that failed, with the reason.
    pub failed: Vec<(String, GrexError)>,
}

impl ExtractionReport {
    /// Returns `true` if no entry failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A container whose format was detected and whose directory was parsed.
///
/// `Archive` is the main entry point after detection. It owns the parsed entries,
/// which can be looked up by name, reconciled, and extracted one at a time or in a
/// batch. Every extraction opens its own handle on the container, so an `Archive`
/// can be shared between threads.
///
/// ```no_run
/// use grex_rs::DetectionEngine;
///
/// let engine = DetectionEngine::default();
/// let archive = engine.open_path("id1/pak0.pak").unwrap();
/// for entry in archive.entries() {
///     println!("{} ({} bytes)", entry.name(), entry.decoded_length());
/// }
/// let report = archive.extract_to("out").unwrap();
/// assert!(report.is_complete());
/// ```
#[derive(Debug)]
pub struct Archive {
    /// The format the container was parsed as.
    format: DescriptorInfo,
    /// The container itself.
    source: Source,
    /// The container's file name.
    file_name: String,
    /// Parsed entries in directory order.
    entries: Vec<Entry>,
    /// Display labels for entry extensions.
    hints: FileTypeHints,
    /// Whether batch extraction uses the rayon pool.
    parallel: bool,
}

impl Archive {
    pub fn new(format: DescriptorInfo, probe: Probe, entries: Vec<Entry>) -> Self {
        Self {
            hints: FileTypeHints::from_descriptor(&format),
            format,
            source: probe.source().clone(),
            file_name: probe.file_name().to_string(),
            entries,
            parallel: true,
        }
    }

    pub fn with_parallel_extraction(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Adds display labels on top of the ones the format declares.
    pub fn with_file_type_hints(mut self, hints: FileTypeHints) -> Self {
        self.hints.merge(hints);
        self
    }

    pub fn format(&self) -> &DescriptorInfo {
        &self.format
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an entry by name, ignoring case and the kind of path separator.
    pub fn find(&self, name: &str) -> Option<&Entry> {
        let wanted = normalize(name);
        self.entries
            .iter()
            .find(|entry| normalize(entry.name()) == wanted)
    }

    /// Extracts the entry called `name`.
    pub fn extract(&self, name: &str) -> Result<Vec<u8>, GrexError> {
        self.find(name)
            .ok_or_else(|| GrexError::FileNotFound(format!("Entry not found: {name}")))?
            .extract()
    }

    /// Returns the display label of an entry's file type.
    pub fn file_type(&self, entry: &Entry) -> Option<&str> {
        self.hints.label(entry.name())
    }

    /// Runs `reconciler` over the entries.
    pub fn reconcile(&mut self, reconciler: &Reconciler) -> Result<usize, GrexError> {
        reconciler.run(&mut self.entries)
    }

    /// Extracts every entry and hands its bytes to `sink`.
    ///
    /// Entries are extracted on the rayon pool when parallel extraction is enabled,
    /// so `sink` may be called from several threads at once.
    pub fn extract_each<F>(&self, sink: F) -> ExtractionReport
    where
        F: Fn(&Entry, Vec<u8>) -> Result<(), GrexError> + Sync,
    {
        let extract_one = |entry: &Entry| -> Result<String, (String, GrexError)> {
            entry
                .extract()
                .and_then(|bytes| sink(entry, bytes))
                .map(|()| entry.name().to_string())
                .map_err(|err| {
                    warn!("{}: failed to extract {}: {err}", self.file_name, entry.name());
                    (entry.name().to_string(), err)
                })
        };

        let results: Vec<_> = if self.parallel {
            self.entries.par_iter().map(extract_one).collect()
        } else {
            self.entries.iter().map(extract_one).collect()
        };

        let mut report = ExtractionReport::default();
        for result in results {
            match result {
                Ok(name) => report.extracted.push(name),
                Err(failure) => report.failed.push(failure),
            }
        }
        debug!(
            "{}: extracted {} entries, {} failed",
            self.file_name,
            report.extracted.len(),
            report.failed.len()
        );
        report
    }

    /// Writes every entry below `directory`, creating subdirectories as needed.
    ///
    /// Names that would land outside `directory` fail like any other entry.
    pub fn extract_to<P: AsRef<Path>>(&self, directory: P) -> Result<ExtractionReport, GrexError> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;

        Ok(self.extract_each(|entry, bytes| {
            let name = Validator::check_relative_path(entry.name())?;
            let output_file_path = directory.join(name.replace('\\', "/"));
            if let Some(parent) = output_file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output_file_path, bytes)?;
            Ok(())
        }))
    }
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/").to_lowercase()
}
