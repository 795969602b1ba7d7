use crate::codec::{Codec, RawCodec};
use crate::error::GrexError;
use crate::resource::Resource;
use crate::resource_flags::ResourceFlags;
use crate::resource_stream::ResourceStream;
use crate::source::{ReadSeek, Source};
use crate::validator::Validator;
use std::sync::Arc;

/// One encoded span of a chunked resource.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The container the chunk is stored in.
    pub(crate) source: Source,
    /// The offset of the chunk within its container.
    pub(crate) offset: u64,
    /// The encoded (compressed/encrypted) size of the chunk.
    pub(crate) encoded_len: u64,
    /// The decoded (original) content size of the chunk.
    pub(crate) decoded_len: u64,
    /// The transform applied to this chunk, if any.
    pub(crate) codec: Option<Arc<dyn Codec>>,
}

impl Chunk {
    /// Describes `encoded_len` bytes at `offset` of `source` that decode to `decoded_len`
    /// bytes through `codec`, or are copied raw when there is none.
    pub fn new(
        source: Source,
        offset: u64,
        encoded_len: u64,
        decoded_len: u64,
        codec: Option<Arc<dyn Codec>>,
    ) -> Self {
        Self {
            source,
            offset,
            encoded_len,
            decoded_len,
            codec,
        }
    }

    /// The container the chunk is stored in.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The offset of the chunk within its container.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The encoded size of the chunk.
    pub fn encoded_len(&self) -> u64 {
        self.encoded_len
    }

    /// The number of bytes the chunk contributes to the logical stream.
    pub fn decoded_len(&self) -> u64 {
        self.decoded_len
    }

    /// Decodes this chunk alone, reading through `reader`, which must be opened on `source`.
    pub(crate) fn decode(&self, reader: &mut dyn ReadSeek) -> Result<Vec<u8>, GrexError> {
        let codec: &dyn Codec = self.codec.as_deref().unwrap_or(&RawCodec);
        codec.decode(reader, self.offset, self.encoded_len, self.decoded_len)
    }

    /// Opens the chunk's container and decodes it, checking the live container size first.
    pub(crate) fn extract(&self, name: &str) -> Result<Vec<u8>, GrexError> {
        Resource::check_live_span(name, &self.source, self.offset, self.encoded_len)?;
        let mut reader = self.source.open()?;
        self.decode(reader.as_mut())
    }
}

/// A resource reconstructed from several non-contiguous encoded spans.
///
/// The logical byte stream is the concatenation of every chunk's decoded bytes in
/// list order. List order is the order of the logical file, which need not be
/// ascending offset order: deduplicated or rebased containers store later bytes
/// earlier on disk.
#[derive(Debug, Clone)]
pub struct ChunkedResource {
    name: String,
    original_name: String,
    chunks: Vec<Chunk>,
    /// The total encoded size over all chunks.
    length: u64,
    /// The total decoded size over all chunks.
    decoded_length: u64,
    name_hash: Option<u64>,
    flags: ResourceFlags,
}

impl ChunkedResource {
    /// Creates a chunked resource whose chunks all live in `source`.
    ///
    /// `offsets`, `encoded_lengths` and `decoded_lengths` (and `codecs`, when given) are
    /// index-aligned; differing lengths are an `ArityMismatch`.
    pub fn new(
        source: Source,
        name: impl Into<String>,
        offsets: Vec<u64>,
        encoded_lengths: Vec<u64>,
        decoded_lengths: Vec<u64>,
        codecs: Option<Vec<Option<Arc<dyn Codec>>>>,
    ) -> Result<Self, GrexError> {
        let count = offsets.len();
        let codec_count = codecs.as_ref().map_or(count, Vec::len);
        if encoded_lengths.len() != count || decoded_lengths.len() != count || codec_count != count
        {
            return Err(GrexError::ArityMismatch(format!(
                "{count} chunk offsets, {} encoded lengths, {} decoded lengths, {codec_count} codecs",
                encoded_lengths.len(),
                decoded_lengths.len(),
            )));
        }

        let mut codecs = codecs.unwrap_or_else(|| vec![None; count]).into_iter();
        let chunks = offsets
            .into_iter()
            .zip(encoded_lengths)
            .zip(decoded_lengths)
            .map(|((offset, encoded_len), decoded_len)| {
                Chunk::new(
                    source.clone(),
                    offset,
                    encoded_len,
                    decoded_len,
                    codecs.next().flatten(),
                )
            })
            .collect();
        Self::from_chunks(name, chunks)
    }

    /// Creates a chunked resource from chunks that may live in different containers.
    ///
    /// Raw chunks must keep their length, and neither the encoded nor the decoded total
    /// may overflow; both are a `ConstraintViolation`.
    pub fn from_chunks(name: impl Into<String>, chunks: Vec<Chunk>) -> Result<Self, GrexError> {
        let name = name.into();
        if let Some(chunk) = chunks
            .iter()
            .find(|chunk| chunk.codec.is_none() && chunk.encoded_len != chunk.decoded_len)
        {
            return Err(GrexError::constraint(format!(
                "{name}: raw chunk at {} declares {} encoded and {} decoded bytes",
                chunk.offset, chunk.encoded_len, chunk.decoded_len
            )));
        }

        let mut length = 0u64;
        let mut decoded_length = 0u64;
        for chunk in &chunks {
            length = Validator::check_end(length, chunk.encoded_len)
                .map_err(|err| GrexError::constraint(format!("{name}: {err}")))?;
            decoded_length = Validator::check_end(decoded_length, chunk.decoded_len)
                .map_err(|err| GrexError::constraint(format!("{name}: {err}")))?;
        }
        Ok(Self {
            original_name: name.clone(),
            name,
            chunks,
            length,
            decoded_length,
            name_hash: None,
            flags: ResourceFlags::empty(),
        })
    }

    /// Marks the name as synthesized from the entry's position.
    pub fn with_placeholder_name(mut self) -> Self {
        self.flags |= ResourceFlags::PLACEHOLDER_NAME;
        self
    }

    /// Records the hash of the logical name that the container stores instead of the name.
    pub fn with_name_hash(mut self, hash: u64) -> Self {
        self.name_hash = Some(hash);
        self
    }

    /// The logical path of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name the container declared, kept across renames.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// The chunks in logical order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The total encoded size over all chunks.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The size of the logical byte stream.
    pub fn decoded_length(&self) -> u64 {
        self.decoded_length
    }

    /// The hash the container stores in place of a name, if any.
    pub fn name_hash(&self) -> Option<u64> {
        self.name_hash
    }

    /// How the resource was changed since parsing.
    pub fn flags(&self) -> ResourceFlags {
        self.flags
    }

    /// Returns `true` if the resource was renamed or relocated since parsing.
    pub fn is_modified(&self) -> bool {
        self.flags.is_modified()
    }

    /// Gives the resource a new logical name. The original name is kept.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.flags.remove(ResourceFlags::PLACEHOLDER_NAME);
        self.flags.insert(ResourceFlags::RENAMED);
    }

    /// Moves one chunk to a corrected offset.
    pub fn relocate_chunk(&mut self, index: usize, offset: u64) -> Result<(), GrexError> {
        let count = self.chunks.len();
        let chunk = self.chunks.get_mut(index).ok_or_else(|| {
            GrexError::constraint(format!("chunk {index} of a resource with {count} chunks"))
        })?;
        chunk.offset = offset;
        self.flags.insert(ResourceFlags::RELOCATED);
        Ok(())
    }

    /// Reads and decodes every chunk in order, returning exactly `decoded_length` bytes.
    pub fn extract(&self) -> Result<Vec<u8>, GrexError> {
        let capacity = usize::try_from(self.decoded_length).map_err(|_| {
            GrexError::constraint(format!("{}: {} bytes", self.name, self.decoded_length))
        })?;
        let mut output = Vec::new();
        output.try_reserve_exact(capacity).map_err(|_| {
            GrexError::codec(format!(
                "{}: cannot allocate {} bytes",
                self.name, self.decoded_length
            ))
        })?;

        // Consecutive chunks usually share a container, so one handle is reused across them.
        let mut open: Option<(&Source, Box<dyn ReadSeek>)> = None;
        for chunk in &self.chunks {
            Resource::check_live_span(&self.name, &chunk.source, chunk.offset, chunk.encoded_len)?;
            let reader = match open.take() {
                Some((source, reader)) if source.same_container(&chunk.source) => reader,
                _ => chunk.source.open()?,
            };
            let (_, reader) = open.insert((&chunk.source, reader));
            let decoded = chunk.decode(&mut **reader)?;
            output.extend_from_slice(&decoded);
        }
        Ok(output)
    }

    /// Opens a seekable stream over the logical bytes that decodes one chunk at a time.
    pub fn open(&self) -> ResourceStream<'_> {
        ResourceStream::new(&self.name, &self.chunks, self.decoded_length)
    }
}
