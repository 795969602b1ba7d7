use crate::codec::Codec;
use crate::error::GrexError;
use crate::ext::io_ext::ArrayReadExt;
use crate::source::ReadSeek;
use crate::validator::Validator;
use log::trace;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag that stops a block-wise decode between two blocks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag for every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`CancelToken::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One independently encoded block of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// The offset of the block relative to the start of the encoded span.
    pub offset: u64,
    /// The encoded (compressed/encrypted) size of the block.
    pub encoded_len: u64,
    /// The decoded (original) content size of the block.
    pub decoded_len: u64,
}

/// Applies an inner codec independently to each block of a span and concatenates the results.
///
/// Containers that compress in fixed or directory-declared windows cannot be decoded
/// with a single call over the whole span; every block carries its own stream.
pub struct BlockCodecAdapter {
    inner: Arc<dyn Codec>,
    blocks: Vec<Block>,
    /// The sum of all block decoded lengths.
    decoded_len: u64,
    /// The furthest encoded byte any block reaches, from the span start.
    encoded_extent: u64,
    cancel: Option<CancelToken>,
}

impl BlockCodecAdapter {
    /// Creates an adapter from three index-aligned sequences.
    ///
    /// Returns `ArityMismatch` when the sequences differ in length and
    /// `ConstraintViolation` when a block end or the decoded total overflows.
    pub fn new(
        inner: Arc<dyn Codec>,
        block_offsets: Vec<u64>,
        block_encoded_lengths: Vec<u64>,
        block_decoded_lengths: Vec<u64>,
    ) -> Result<Self, GrexError> {
        if block_offsets.len() != block_encoded_lengths.len()
            || block_offsets.len() != block_decoded_lengths.len()
        {
            return Err(GrexError::ArityMismatch(format!(
                "{} block offsets, {} encoded lengths, {} decoded lengths",
                block_offsets.len(),
                block_encoded_lengths.len(),
                block_decoded_lengths.len()
            )));
        }

        let blocks = block_offsets
            .into_iter()
            .zip(block_encoded_lengths)
            .zip(block_decoded_lengths)
            .map(|((offset, encoded_len), decoded_len)| Block {
                offset,
                encoded_len,
                decoded_len,
            })
            .collect::<Vec<_>>();
        Self::from_blocks(inner, blocks)
    }

    /// Lays out contiguous blocks of `block_size` decoded bytes each.
    ///
    /// The last block holds the remainder of `total_decoded`, so it is shorter than
    /// `block_size` whenever the total is not a multiple of it. `encoded_lengths` must
    /// hold exactly one length per block.
    pub fn uniform(
        inner: Arc<dyn Codec>,
        block_size: u64,
        total_decoded: u64,
        encoded_lengths: Vec<u64>,
    ) -> Result<Self, GrexError> {
        if block_size == 0 {
            return Err(GrexError::constraint("block size of zero"));
        }
        let block_count = total_decoded.div_ceil(block_size);
        if block_count != encoded_lengths.len() as u64 {
            return Err(GrexError::ArityMismatch(format!(
                "{total_decoded} bytes in blocks of {block_size} need {block_count} blocks, got {} encoded lengths",
                encoded_lengths.len()
            )));
        }

        let mut blocks = Vec::with_capacity(encoded_lengths.len());
        let mut offset = 0u64;
        let mut left = total_decoded;
        for encoded_len in encoded_lengths {
            let decoded_len = left.min(block_size);
            blocks.push(Block {
                offset,
                encoded_len,
                decoded_len,
            });
            offset = Validator::check_end(offset, encoded_len)?;
            left -= decoded_len;
        }
        Self::from_blocks(inner, blocks)
    }

    fn from_blocks(inner: Arc<dyn Codec>, blocks: Vec<Block>) -> Result<Self, GrexError> {
        let mut decoded_len = 0u64;
        let mut encoded_extent = 0u64;
        for block in &blocks {
            decoded_len = Validator::check_end(decoded_len, block.decoded_len)?;
            let end = Validator::check_end(block.offset, block.encoded_len)?;
            encoded_extent = encoded_extent.max(end);
        }
        Ok(Self {
            inner,
            blocks,
            decoded_len,
            encoded_extent,
            cancel: None,
        })
    }

    /// Checks `token` between blocks and stops with `Cancelled` once it is set.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The blocks in decoding order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The sum of all block decoded lengths.
    pub fn decoded_len(&self) -> u64 {
        self.decoded_len
    }

    /// The number of encoded bytes the blocks reach into, measured from the span start.
    pub fn encoded_extent(&self) -> u64 {
        self.encoded_extent
    }

    fn check_cancelled(&self) -> Result<(), GrexError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(GrexError::Cancelled),
            _ => Ok(()),
        }
    }

    fn check_layout(&self, encoded_len: u64, decoded_len: u64) -> Result<(), GrexError> {
        if self.decoded_len != decoded_len {
            return Err(GrexError::codec(format!(
                "blocks decode to {} bytes but {decoded_len} were declared",
                self.decoded_len
            )));
        }
        if self.encoded_extent > encoded_len {
            return Err(GrexError::codec(format!(
                "blocks reach {} bytes into a span of {encoded_len}",
                self.encoded_extent
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for BlockCodecAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCodecAdapter")
            .field("inner", &self.inner)
            .field("blocks", &self.blocks.len())
            .field("decoded_len", &self.decoded_len)
            .finish()
    }
}

impl Codec for BlockCodecAdapter {
    fn name(&self) -> &str {
        "blocks"
    }

    /// Buffers the encoded span and decodes one block at a time as bytes are pulled.
    fn open<'a>(
        &'a self,
        mut input: Box<dyn Read + 'a>,
        decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        let extent = self.encoded_extent;
        self.check_layout(extent, decoded_len)?;
        let extent = usize::try_from(extent)
            .map_err(|_| GrexError::codec("block table exceeds the address space"))?;
        let encoded = input
            .read_bytes(extent)
            .map_err(|err| GrexError::from_stream(err, self.name()))?;

        Ok(Box::new(BlockStream {
            adapter: self,
            encoded,
            next_block: 0,
            current: Cursor::new(Vec::new()),
        }))
    }

    /// Seeks to every block in turn instead of buffering the whole span.
    fn decode(
        &self,
        source: &mut dyn ReadSeek,
        offset: u64,
        encoded_len: u64,
        decoded_len: u64,
    ) -> Result<Vec<u8>, GrexError> {
        self.check_layout(encoded_len, decoded_len)?;
        // Every block ends within `encoded_len`, so no block offset below can overflow.
        Validator::check_end(offset, encoded_len)?;

        let capacity = usize::try_from(decoded_len)
            .map_err(|_| GrexError::codec("decoded length exceeds the address space"))?;
        let mut output = Vec::new();
        output
            .try_reserve_exact(capacity)
            .map_err(|_| GrexError::codec(format!("cannot allocate {decoded_len} bytes")))?;

        for (index, block) in self.blocks.iter().enumerate() {
            self.check_cancelled()?;
            trace!(
                "decoding block {index} ({} -> {} bytes) with {}",
                block.encoded_len,
                block.decoded_len,
                self.inner.name()
            );
            let decoded = self.inner.decode(
                source,
                offset + block.offset,
                block.encoded_len,
                block.decoded_len,
            )?;
            output.extend_from_slice(&decoded);
        }
        Ok(output)
    }
}

struct BlockStream<'a> {
    adapter: &'a BlockCodecAdapter,
    encoded: Vec<u8>,
    next_block: usize,
    current: Cursor<Vec<u8>>,
}

impl BlockStream<'_> {
    fn decode_next(&mut self) -> Result<(), GrexError> {
        self.adapter.check_cancelled()?;
        let block = self.adapter.blocks[self.next_block];
        self.next_block += 1;

        // Block bounds were checked against the encoded extent when the stream was opened.
        let start = block.offset as usize;
        let end = start + block.encoded_len as usize;
        let mut reader = Cursor::new(&self.encoded[start..end]);
        let decoded = self
            .adapter
            .inner
            .decode(&mut reader, 0, block.encoded_len, block.decoded_len)?;
        self.current = Cursor::new(decoded);
        Ok(())
    }
}

impl Read for BlockStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.current.read(buf)?;
            if n > 0 || buf.is_empty() || self.next_block >= self.adapter.blocks.len() {
                return Ok(n);
            }
            self.decode_next()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RawCodec, ZlibCodec};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Compresses `plain` in windows of `block_size` and returns the span and encoded lengths.
    fn blocked(plain: &[u8], block_size: usize) -> (Vec<u8>, Vec<u64>) {
        let mut span = Vec::new();
        let mut lengths = Vec::new();
        for window in plain.chunks(block_size) {
            let packed = zlib(window);
            lengths.push(packed.len() as u64);
            span.extend_from_slice(&packed);
        }
        (span, lengths)
    }

    #[test]
    fn mismatched_arrays_fail_loudly() {
        let err = BlockCodecAdapter::new(Arc::new(RawCodec), vec![0, 4], vec![4], vec![4, 4])
            .unwrap_err();
        assert!(matches!(err, GrexError::ArityMismatch(_)));
    }

    #[test]
    fn last_block_holds_the_remainder() {
        let plain: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let (span, lengths) = blocked(&plain, 256);
        let adapter =
            BlockCodecAdapter::uniform(Arc::new(ZlibCodec), 256, plain.len() as u64, lengths)
                .unwrap();

        let decoded: Vec<u64> = adapter.blocks().iter().map(|b| b.decoded_len).collect();
        assert_eq!(decoded, vec![256, 256, 256, 232]);

        let mut container = vec![0u8; 5];
        container.extend_from_slice(&span);
        let mut source = Cursor::new(container);
        let out = adapter
            .decode(&mut source, 5, span.len() as u64, plain.len() as u64)
            .unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn streaming_matches_seeking_decode() {
        let plain = b"block one|block two|tail".to_vec();
        let (span, lengths) = blocked(&plain, 10);
        let adapter =
            BlockCodecAdapter::uniform(Arc::new(ZlibCodec), 10, plain.len() as u64, lengths)
                .unwrap();

        let mut stream = adapter
            .open(Box::new(Cursor::new(span.clone())), plain.len() as u64)
            .unwrap();
        let mut streamed = Vec::new();
        stream.read_to_end(&mut streamed).unwrap();

        let mut source = Cursor::new(span.clone());
        let decoded = adapter
            .decode(&mut source, 0, span.len() as u64, plain.len() as u64)
            .unwrap();
        assert_eq!(streamed, plain);
        assert_eq!(decoded, plain);
    }

    #[test]
    fn uniform_rejects_the_wrong_block_count() {
        let err = BlockCodecAdapter::uniform(Arc::new(RawCodec), 4, 9, vec![4, 4]).unwrap_err();
        assert!(matches!(err, GrexError::ArityMismatch(_)));
    }

    #[test]
    fn declared_length_must_match_the_blocks() {
        let adapter =
            BlockCodecAdapter::new(Arc::new(RawCodec), vec![0, 2], vec![2, 2], vec![2, 2])
                .unwrap();
        let mut source = Cursor::new(b"abcd".to_vec());
        let err = adapter.decode(&mut source, 0, 4, 5).unwrap_err();
        assert!(matches!(err, GrexError::CodecFailure(_)));
    }

    #[test]
    fn blocks_may_be_stored_out_of_order() {
        // The second logical block is stored first.
        let adapter =
            BlockCodecAdapter::new(Arc::new(RawCodec), vec![3, 0], vec![2, 3], vec![2, 3])
                .unwrap();
        let mut source = Cursor::new(b"cdeab".to_vec());
        assert_eq!(adapter.decode(&mut source, 0, 5, 5).unwrap(), b"abcde");
    }

    #[test]
    fn overflowing_block_coordinates_are_rejected() {
        let err = BlockCodecAdapter::new(Arc::new(RawCodec), vec![u64::MAX], vec![2], vec![2])
            .unwrap_err();
        assert!(matches!(err, GrexError::ConstraintViolation(_)));

        let err = BlockCodecAdapter::new(
            Arc::new(RawCodec),
            vec![0, 2],
            vec![2, 2],
            vec![u64::MAX, 2],
        )
        .unwrap_err();
        assert!(matches!(err, GrexError::ConstraintViolation(_)));

        let err =
            BlockCodecAdapter::uniform(Arc::new(RawCodec), 2, 4, vec![u64::MAX, 2]).unwrap_err();
        assert!(matches!(err, GrexError::ConstraintViolation(_)));
    }

    #[test]
    fn span_offset_near_the_top_of_the_address_space_fails() {
        let adapter =
            BlockCodecAdapter::new(Arc::new(RawCodec), vec![0, 2], vec![2, 2], vec![2, 2])
                .unwrap();
        let mut source = Cursor::new(b"abcd".to_vec());
        let err = adapter.decode(&mut source, u64::MAX - 1, 4, 4).unwrap_err();
        assert!(matches!(err, GrexError::ConstraintViolation(_)));
    }

    #[test]
    fn cancellation_is_checked_between_blocks() {
        let token = CancelToken::new();
        let adapter =
            BlockCodecAdapter::new(Arc::new(RawCodec), vec![0, 2], vec![2, 2], vec![2, 2])
                .unwrap()
                .with_cancel_token(token.clone());
        token.cancel();
        let mut source = Cursor::new(b"abcd".to_vec());
        assert!(matches!(
            adapter.decode(&mut source, 0, 4, 4),
            Err(GrexError::Cancelled)
        ));
    }
}
