use super::NameDictionary;
use crate::entry::Entry;
use crate::error::GrexError;
use crate::resource_flags::ResourceFlags;
use log::{debug, warn};
use std::io::Read;

/// Builds the positional name given to entries whose container stores no names.
pub fn placeholder_name(index: usize, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        format!("file_{index:05}")
    } else {
        format!("file_{index:05}.{extension}")
    }
}

/// One ordered post-processing step over a parsed entry list.
pub trait ReconcilePass: Send + Sync {
    fn name(&self) -> &str;

    /// Updates entries in place and returns how many were changed.
    fn apply(&self, entries: &mut [Entry]) -> Result<usize, GrexError>;
}

/// Runs reconciliation passes in the order they were pushed.
#[derive(Default)]
pub struct Reconciler {
    passes: Vec<Box<dyn ReconcilePass>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<P: ReconcilePass + 'static>(&mut self, pass: P) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn run(&self, entries: &mut [Entry]) -> Result<usize, GrexError> {
        let mut changed = 0;
        for pass in &self.passes {
            let count = pass.apply(entries)?;
            debug!("{}: {count} of {} entries changed", pass.name(), entries.len());
            changed += count;
        }
        Ok(changed)
    }
}

const BUILTIN_SIGNATURES: &[(&[u8], &str)] = &[
    (b"PACK", "pak"),
    (b"BLTE", "blte"),
    (b"IBSP", "bsp"),
    (b"RIFF", "wav"),
    (b"OggS", "ogg"),
    (b"ID3", "mp3"),
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xFF\xD8\xFF", "jpg"),
    (b"GIF8", "gif"),
    (b"DDS ", "dds"),
    (b"PK\x03\x04", "zip"),
    (b"BM", "bmp"),
];

/// Gives placeholder-named entries an extension based on their leading bytes.
///
/// Entries that fail to decode are logged and left alone.
pub struct ExtensionSniffPass {
    signatures: Vec<(&'static [u8], &'static str)>,
}

impl ExtensionSniffPass {
    pub fn new() -> Self {
        Self {
            signatures: BUILTIN_SIGNATURES.to_vec(),
        }
    }

    /// Adds a signature, checked before the built-in ones.
    pub fn with_signature(mut self, magic: &'static [u8], extension: &'static str) -> Self {
        self.signatures.insert(0, (magic, extension));
        self
    }

    fn sniff(&self, entry: &Entry) -> Result<Option<&'static str>, GrexError> {
        let longest = self
            .signatures
            .iter()
            .map(|(magic, _)| magic.len())
            .max()
            .unwrap_or(0);
        let mut head = Vec::with_capacity(longest);
        entry.open()?.take(longest as u64).read_to_end(&mut head)?;
        Ok(self
            .signatures
            .iter()
            .find(|(magic, _)| head.starts_with(magic))
            .map(|&(_, extension)| extension))
    }
}

impl Default for ExtensionSniffPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcilePass for ExtensionSniffPass {
    fn name(&self) -> &str {
        "extension sniff"
    }

    fn apply(&self, entries: &mut [Entry]) -> Result<usize, GrexError> {
        let mut changed = 0;
        for entry in entries.iter_mut() {
            if !entry.flags().contains(ResourceFlags::PLACEHOLDER_NAME) {
                continue;
            }
            let extension = match self.sniff(entry) {
                Ok(Some(extension)) => extension,
                Ok(None) => continue,
                Err(err) => {
                    warn!("{}: skipping extension sniff: {err}", entry.name());
                    continue;
                }
            };
            let stem = match entry.name().rsplit_once('.') {
                Some((stem, _)) => stem,
                None => entry.name(),
            };
            let name = format!("{stem}.{extension}");
            if name != entry.name() {
                entry.rename(name);
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Restores names of entries that only carry a name hash.
pub struct HashRenamePass {
    dictionary: NameDictionary,
}

impl HashRenamePass {
    pub fn new(dictionary: NameDictionary) -> Self {
        Self { dictionary }
    }
}

impl ReconcilePass for HashRenamePass {
    fn name(&self) -> &str {
        "hash rename"
    }

    fn apply(&self, entries: &mut [Entry]) -> Result<usize, GrexError> {
        let mut changed = 0;
        for entry in entries.iter_mut() {
            let Some(hash) = entry.name_hash() else {
                continue;
            };
            match self.dictionary.get(hash) {
                Some(name) if name != entry.name() => {
                    entry.rename(name);
                    changed += 1;
                }
                Some(_) => {}
                None => debug!("{}: no name for hash {hash:#010x}", entry.name()),
            }
        }
        Ok(changed)
    }
}
