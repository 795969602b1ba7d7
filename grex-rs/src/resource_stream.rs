use crate::chunked_resource::Chunk;
use std::io::{self, Error, ErrorKind, Read, Seek, SeekFrom};

/// The position of one chunk in the logical byte stream.
struct ChunkSpan {
    /// The virtual start offset of the chunk within the resource.
    virtual_start_offset: u64,
    /// The virtual end offset of the chunk within the resource.
    virtual_end_offset: u64,
}

/// A seekable reader over the logical bytes of a chunked resource.
///
/// Chunks are decoded whole, one at a time, when a read first touches them; the most
/// recently decoded chunk is cached so sequential reads decode every chunk once.
pub struct ResourceStream<'a> {
    name: &'a str,
    chunks: &'a [Chunk],
    spans: Vec<ChunkSpan>,
    /// The total size of the resource.
    internal_size: u64,
    /// The current read position within the resource.
    internal_position: u64,
    /// The decoded bytes of the chunk that was read last.
    cache: Vec<u8>,
    /// The start position of the cache.
    cache_start_position: u64,
    /// The end position of the cache.
    cache_end_position: u64,
}

impl<'a> ResourceStream<'a> {
    /// `size` is the checked sum of the chunks' decoded lengths, so no running offset overflows.
    pub(crate) fn new(name: &'a str, chunks: &'a [Chunk], size: u64) -> Self {
        let mut virtual_offset = 0u64;
        let spans = chunks
            .iter()
            .map(|chunk| {
                let span = ChunkSpan {
                    virtual_start_offset: virtual_offset,
                    virtual_end_offset: virtual_offset + chunk.decoded_len,
                };
                virtual_offset += chunk.decoded_len;
                span
            })
            .collect();

        ResourceStream {
            name,
            chunks,
            spans,
            internal_size: size,
            internal_position: 0,
            cache: Vec::new(),
            cache_start_position: 0,
            cache_end_position: 0,
        }
    }

    /// Returns the total size of the resource.
    pub fn size(&self) -> u64 {
        self.internal_size
    }

    fn load_chunk_at(&mut self, position: u64) -> io::Result<()> {
        // Spans are sorted and contiguous, so the first span ending past `position` holds it.
        let index = self
            .spans
            .partition_point(|span| span.virtual_end_offset <= position);
        let span = self
            .spans
            .get(index)
            .ok_or_else(|| Error::other("Chunk not found"))?;

        let decoded = self.chunks[index].extract(self.name)?;
        self.cache_start_position = span.virtual_start_offset;
        self.cache_end_position = span.virtual_end_offset;
        self.cache = decoded;
        Ok(())
    }
}

impl Read for ResourceStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut consumed = 0;

        while consumed < buf.len() && self.internal_position < self.internal_size {
            let position = self.internal_position;
            if position < self.cache_start_position || position >= self.cache_end_position {
                self.load_chunk_at(position)?;
            }

            let p = (position - self.cache_start_position) as usize;
            let available = (self.cache_end_position - position) as usize;
            let n = available.min(buf.len() - consumed);
            buf[consumed..consumed + n].copy_from_slice(&self.cache[p..p + n]);
            consumed += n;
            self.internal_position += n as u64;
        }
        Ok(consumed)
    }
}

impl Seek for ResourceStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(offset) => self.internal_position.checked_add_signed(offset),
            SeekFrom::End(offset) => self.internal_size.checked_add_signed(offset),
        };
        self.internal_position = target.ok_or_else(|| {
            Error::new(ErrorKind::InvalidInput, "Seek before the start of the resource")
        })?;
        Ok(self.internal_position)
    }
}

#[cfg(test)]
mod tests {
    use crate::chunked_resource::ChunkedResource;
    use crate::source::Source;
    use std::io::{Read, Seek, SeekFrom};

    fn resource() -> ChunkedResource {
        let source = Source::from_bytes(b"cdefghab".to_vec());
        ChunkedResource::new(source, "letters", vec![6, 0, 4], vec![2, 4, 2], vec![2, 4, 2], None)
            .unwrap()
    }

    #[test]
    fn sequential_read_crosses_chunks() {
        let resource = resource();
        let mut stream = resource.open();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abcdefgh");
        assert_eq!(stream.size(), 8);
    }

    #[test]
    fn seek_lands_inside_a_later_chunk() {
        let resource = resource();
        let mut stream = resource.open();
        assert_eq!(stream.seek(SeekFrom::End(-3)).unwrap(), 5);

        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"fg");

        stream.seek(SeekFrom::Current(-6)).unwrap();
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"bc");

        assert!(stream.seek(SeekFrom::Current(-10)).is_err());
        stream.seek(SeekFrom::Start(100)).unwrap();
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }
}
