use crate::error::GrexError;
use crate::utility::dsv_file::DsvFile;
use flate2::Crc;
use std::collections::HashMap;
use std::path::Path;

/// How a container hashes the names it does not store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameHash {
    /// CRC-32 of the name bytes as given.
    #[default]
    Crc32,
    /// CRC-32 of the name lowercased, with `\` separators turned into `/`.
    Crc32Normalized,
}

impl NameHash {
    pub fn hash(self, name: &str) -> u64 {
        let mut crc = Crc::new();
        match self {
            NameHash::Crc32 => crc.update(name.as_bytes()),
            NameHash::Crc32Normalized => {
                let normalized = name.to_ascii_lowercase().replace('\\', "/");
                crc.update(normalized.as_bytes());
            }
        }
        crc.sum() as u64
    }
}

/// Known names keyed by their hash, used to restore names a container only hashes.
#[derive(Debug, Clone, Default)]
pub struct NameDictionary {
    hash: NameHash,
    names: HashMap<u64, String>,
}

impl NameDictionary {
    pub fn new(hash: NameHash) -> Self {
        Self {
            hash,
            names: HashMap::new(),
        }
    }

    pub fn from_names<I, S>(hash: NameHash, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dictionary = Self::new(hash);
        for name in names {
            dictionary.insert(name);
        }
        dictionary
    }

    /// Loads a `|` delimited name list with `#` comments.
    ///
    /// A row is either a bare name, hashed with `hash`, or `hex hash|name` for
    /// hashes that were computed elsewhere.
    pub fn load<P: AsRef<Path>>(path: P, hash: NameHash) -> Result<Self, GrexError> {
        let dsv = DsvFile::from_file(path, "|", Some("#"))?;
        let mut dictionary = Self::new(hash);
        for row in dsv.rows {
            match row.as_slice() {
                [name] if !name.is_empty() => dictionary.insert(name.as_str()),
                [key, name] if !name.is_empty() => {
                    dictionary.insert_hash(parse_hex_key(key)?, name.as_str())
                }
                _ => {
                    return Err(GrexError::InvalidData(format!(
                        "Expected name or hash|name, found {row:?}"
                    )))
                }
            }
        }
        Ok(dictionary)
    }

    pub fn hash_kind(&self) -> NameHash {
        self.hash
    }

    /// Hashes `name` and records it.
    pub fn insert(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.names.insert(self.hash.hash(&name), name);
    }

    /// Records `name` under a precomputed `hash`.
    pub fn insert_hash(&mut self, hash: u64, name: impl Into<String>) {
        self.names.insert(hash, name.into());
    }

    pub fn get(&self, hash: u64) -> Option<&str> {
        self.names.get(&hash).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn parse_hex_key(key: &str) -> Result<u64, GrexError> {
    let key = key.trim_start_matches("0x");
    let bytes = hex::decode(key)
        .map_err(|_| GrexError::InvalidData(format!("Invalid hex in name hash {key:?}")))?;
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(GrexError::InvalidData(format!(
            "Name hash {key:?} is not 1 to 8 bytes"
        )));
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| acc << 8 | b as u64))
}
