use crate::error::GrexError;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// A Delimiter Separated Value file, read into rows of trimmed cells.
#[derive(Debug)]
pub(crate) struct DsvFile {
    /// The delimiter string
    delimiter: String,
    /// The comment indicator string
    comment: Option<String>,
    /// The rows within the file
    pub(crate) rows: Vec<Vec<String>>,
}

impl DsvFile {
    /// Initializes an empty file with a given delimiter and optional comment string
    pub(crate) fn new(delimiter: &str, comment: Option<&str>) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            comment: comment.filter(|c| !c.is_empty()).map(str::to_string),
            rows: Vec::new(),
        }
    }

    /// Reads the file at `path`.
    pub(crate) fn from_file<P: AsRef<Path>>(
        path: P,
        delimiter: &str,
        comment: Option<&str>,
    ) -> Result<Self, GrexError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => GrexError::FileNotFound(path.display().to_string()),
            _ => err.into(),
        })?;
        let mut dsv = Self::new(delimiter, comment);
        dsv.load(file)?;
        Ok(dsv)
    }

    /// Appends the rows read from `reader`; blank and comment lines are skipped.
    pub(crate) fn load<R: Read>(&mut self, reader: R) -> Result<(), GrexError> {
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(comment) = &self.comment {
                if trimmed.starts_with(comment.as_str()) {
                    continue;
                }
            }
            let row = trimmed
                .split(self.delimiter.as_str())
                .map(|cell| cell.trim().to_string())
                .collect();
            self.rows.push(row);
        }
        Ok(())
    }
}
