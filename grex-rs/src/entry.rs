use crate::chunked_resource::ChunkedResource;
use crate::error::GrexError;
use crate::resource::Resource;
use crate::resource_flags::ResourceFlags;
use std::io::Read;

/// One logical file produced by a directory parse.
#[derive(Debug, Clone)]
pub enum Entry {
    /// A single contiguous span, optionally behind a codec.
    Single(Resource),
    /// Several spans concatenated in list order.
    Chunked(ChunkedResource),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Single(resource) => resource.name(),
            Entry::Chunked(resource) => resource.name(),
        }
    }

    pub fn original_name(&self) -> &str {
        match self {
            Entry::Single(resource) => resource.original_name(),
            Entry::Chunked(resource) => resource.original_name(),
        }
    }

    /// The number of bytes [`Entry::extract`] returns.
    pub fn decoded_length(&self) -> u64 {
        match self {
            Entry::Single(resource) => resource.decoded_length(),
            Entry::Chunked(resource) => resource.decoded_length(),
        }
    }

    pub fn name_hash(&self) -> Option<u64> {
        match self {
            Entry::Single(resource) => resource.name_hash(),
            Entry::Chunked(resource) => resource.name_hash(),
        }
    }

    pub fn flags(&self) -> ResourceFlags {
        match self {
            Entry::Single(resource) => resource.flags(),
            Entry::Chunked(resource) => resource.flags(),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.flags().is_modified()
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        match self {
            Entry::Single(resource) => resource.rename(name),
            Entry::Chunked(resource) => resource.rename(name),
        }
    }

    /// Reads and decodes the whole entry.
    pub fn extract(&self) -> Result<Vec<u8>, GrexError> {
        match self {
            Entry::Single(resource) => resource.extract(),
            Entry::Chunked(resource) => resource.extract(),
        }
    }

    /// Opens a stream over the decoded bytes of the entry.
    pub fn open(&self) -> Result<Box<dyn Read + '_>, GrexError> {
        match self {
            Entry::Single(resource) => resource.open(),
            Entry::Chunked(resource) => Ok(Box::new(resource.open())),
        }
    }
}

impl From<Resource> for Entry {
    fn from(resource: Resource) -> Self {
        Entry::Single(resource)
    }
}

impl From<ChunkedResource> for Entry {
    fn from(resource: ChunkedResource) -> Self {
        Entry::Chunked(resource)
    }
}
