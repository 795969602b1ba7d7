use crate::detection::DescriptorInfo;
use crate::error::GrexError;
use crate::utility::dsv_file::DsvFile;
use std::collections::HashMap;
use std::path::Path;

/// Display labels for file extensions, such as `wav` → `Wave Audio`.
///
/// Extensions are stored lowercase without the leading dot.
#[derive(Debug, Clone, Default)]
pub struct FileTypeHints {
    labels: HashMap<String, String>,
}

impl FileTypeHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the labels a descriptor declares.
    pub fn from_descriptor(info: &DescriptorInfo) -> Self {
        let mut hints = Self::new();
        for (extension, label) in info.file_types {
            hints.insert(extension, *label);
        }
        hints
    }

    /// Loads `extension|label` rows from a `|` delimited file with `#` comments.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GrexError> {
        let dsv = DsvFile::from_file(path, "|", Some("#"))?;
        let mut hints = Self::new();
        for row in dsv.rows {
            match row.as_slice() {
                [extension, label] if !extension.is_empty() => hints.insert(extension, label),
                _ => {
                    return Err(GrexError::InvalidData(format!(
                        "Expected extension|label, found {row:?}"
                    )))
                }
            }
        }
        Ok(hints)
    }

    pub fn insert(&mut self, extension: &str, label: impl Into<String>) {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.labels.insert(extension, label.into());
    }

    /// Adds every label of `other`, replacing labels already present.
    pub fn merge(&mut self, other: FileTypeHints) {
        self.labels.extend(other.labels);
    }

    /// Returns the label for the extension of `name`.
    pub fn label(&self, name: &str) -> Option<&str> {
        let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let (_, extension) = file_name.rsplit_once('.')?;
        self.labels
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
