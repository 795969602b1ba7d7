use crate::error::GrexError;
use crate::reconcile::{rebase_offsets, DeclaredSpan};
use crate::source::Source;
use glob::{glob, Pattern};
use std::fs;
use std::path::{Path, PathBuf};

/// The physical volumes of a container split into numbered files.
///
/// Volumes are named `<stem>.<number>`, such as `data.000`, `data.001`. The numbers
/// must be contiguous from the lowest one found.
#[derive(Debug, Clone)]
pub struct VolumeSet {
    paths: Vec<PathBuf>,
    sizes: Vec<u64>,
}

impl VolumeSet {
    /// Finds every volume that belongs to the same set as `path`.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, GrexError> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| GrexError::FileNotFound(path.display().to_string()))?;
        let pattern = match path.parent().map(|folder| folder.to_string_lossy()) {
            Some(folder) if !folder.is_empty() => {
                format!("{}/{}.*", Pattern::escape(&folder), Pattern::escape(stem))
            }
            _ => format!("{}.*", Pattern::escape(stem)),
        };

        let mut indexed_files: Vec<(usize, PathBuf)> = Vec::new();
        for entry in glob(&pattern)
            .map_err(|e| GrexError::InvalidData(format!("Bad volume pattern {pattern}: {e}")))?
        {
            let path = entry.map_err(|e| GrexError::Io(e.into()))?;
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if let Ok(index) = ext.parse::<usize>() {
                    indexed_files.push((index, path));
                }
            }
        }
        indexed_files.sort_by_key(|(index, _)| *index);

        let Some(&(first, _)) = indexed_files.first() else {
            return Err(GrexError::FileNotFound(format!(
                "No volumes found for {}",
                path.display()
            )));
        };
        for (expected, (index, _)) in (first..).zip(&indexed_files) {
            if *index != expected {
                return Err(GrexError::FileNotFound(format!(
                    "Missing volume {expected} of {stem}"
                )));
            }
        }

        let mut paths = Vec::with_capacity(indexed_files.len());
        let mut sizes = Vec::with_capacity(indexed_files.len());
        for (_, path) in indexed_files {
            sizes.push(fs::metadata(&path)?.len());
            paths.push(path);
        }
        Ok(Self { paths, sizes })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// The size of each volume when the set was discovered.
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.paths.iter().map(Source::from_path).collect()
    }

    /// Places declared spans onto the volumes, returning the source and offset of each.
    ///
    /// See [`rebase_offsets`].
    pub fn rebase(
        &self,
        spans: &[DeclaredSpan],
        alignment: u64,
    ) -> Result<Vec<(Source, u64)>, GrexError> {
        let sources = self.sources();
        Ok(rebase_offsets(spans, &self.sizes, alignment)?
            .into_iter()
            .map(|location| (sources[location.volume].clone(), location.offset))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_numbered_volumes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.001"), [1u8; 7]).unwrap();
        fs::write(dir.path().join("data.000"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("data.idx"), b"").unwrap();
        fs::write(dir.path().join("other.002"), b"").unwrap();

        let set = VolumeSet::discover(dir.path().join("data.000")).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.sizes(), [4, 7]);
        assert!(set.paths()[1].ends_with("data.001"));

        let placed = set
            .rebase(
                &[
                    DeclaredSpan {
                        offset: 0,
                        length: 4,
                    },
                    DeclaredSpan {
                        offset: 4,
                        length: 7,
                    },
                ],
                1,
            )
            .unwrap();
        assert_eq!(placed[1].0.path(), Some(set.paths()[1].as_path()));
        assert_eq!(placed[1].1, 0);
    }

    #[test]
    fn gaps_in_numbering_are_missing_volumes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.000"), b"a").unwrap();
        fs::write(dir.path().join("data.002"), b"c").unwrap();
        assert!(matches!(
            VolumeSet::discover(dir.path().join("data.000")),
            Err(GrexError::FileNotFound(_))
        ));
        assert!(VolumeSet::discover(dir.path().join("none.000")).is_err());
    }
}
