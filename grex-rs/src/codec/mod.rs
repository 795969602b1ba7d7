//! Decode transforms applied when a resource's bytes are materialized.
//!
//! A [`Codec`] turns an encoded span into exactly the number of decoded bytes the
//! container directory declared. Codecs stream: [`Codec::open`] wraps a reader of
//! encoded bytes and yields decoded bytes on demand, so large resources never have
//! to be buffered whole. [`Codec::decode`] is the one-shot form used by extraction.

pub mod codec_kind;
pub mod lzss;
pub mod rle;
pub mod tagged;
pub mod xor;
pub mod zlib;

use crate::error::GrexError;
use crate::source::ReadSeek;
use std::fmt;
use std::io::{Read, SeekFrom};
use std::sync::Arc;

pub use codec_kind::CodecKind;
pub use lzss::{LzssCodec, LzssParams};
pub use rle::RleCodec;
pub use tagged::TaggedCodec;
pub use xor::XorCodec;
pub use zlib::{DeflateCodec, ZlibCodec};

/// A decode transform from an encoded span to a decoded byte sequence of known length.
pub trait Codec: Send + Sync + fmt::Debug {
    /// A short name used in error messages and logs.
    fn name(&self) -> &str;

    /// Wraps `input` in a reader of decoded bytes.
    ///
    /// `input` is already limited to the encoded span. Codecs that cannot tell where
    /// their output ends stop after `decoded_len` bytes; self-terminating encodings
    /// may run to their natural end so that overruns can be detected.
    fn open<'a>(
        &'a self,
        input: Box<dyn Read + 'a>,
        decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError>;

    /// Decodes `encoded_len` bytes at `offset` of `source` into exactly `decoded_len` bytes.
    fn decode(
        &self,
        source: &mut dyn ReadSeek,
        offset: u64,
        encoded_len: u64,
        decoded_len: u64,
    ) -> Result<Vec<u8>, GrexError> {
        source.seek(SeekFrom::Start(offset))?;
        let input: Box<dyn Read + '_> = Box::new(Read::take(&mut *source, encoded_len));
        let stream = self.open(input, decoded_len)?;
        collect_decoded(stream, decoded_len, self.name())
    }
}

/// Pulls exactly `decoded_len` bytes out of `stream`.
///
/// The output buffer is reserved up front from the declared length. A stream that
/// ends early or keeps producing bytes past the declared length is a codec failure.
pub(crate) fn collect_decoded<R: Read>(
    mut stream: R,
    decoded_len: u64,
    codec: &str,
) -> Result<Vec<u8>, GrexError> {
    let capacity = usize::try_from(decoded_len)
        .map_err(|_| GrexError::codec(format!("{codec}: {decoded_len} bytes cannot be addressed")))?;
    let mut output = Vec::new();
    output.try_reserve_exact(capacity).map_err(|_| {
        GrexError::codec(format!("{codec}: cannot allocate {decoded_len} bytes"))
    })?;

    Read::take(&mut stream, decoded_len)
        .read_to_end(&mut output)
        .map_err(|err| GrexError::from_stream(err, codec))?;
    if output.len() as u64 != decoded_len {
        return Err(GrexError::codec(format!(
            "{codec}: produced {} of {decoded_len} bytes",
            output.len()
        )));
    }

    let mut extra = [0u8; 1];
    let overrun = stream
        .read(&mut extra)
        .map_err(|err| GrexError::from_stream(err, codec))?;
    if overrun != 0 {
        return Err(GrexError::codec(format!(
            "{codec}: produced more than {decoded_len} bytes"
        )));
    }
    Ok(output)
}

/// A decoded stream held to the declared decoded length.
///
/// Reads past `decoded_len`, or an end of stream before it, fail with a
/// `CodecFailure` wrapped in an io error, the streaming twin of [`collect_decoded`].
pub(crate) struct DeclaredLength<'a> {
    inner: Box<dyn Read + 'a>,
    left: u64,
    decoded_len: u64,
    codec: String,
}

impl<'a> DeclaredLength<'a> {
    pub(crate) fn new(inner: Box<dyn Read + 'a>, decoded_len: u64, codec: &str) -> Self {
        Self {
            inner,
            left: decoded_len,
            decoded_len,
            codec: codec.to_string(),
        }
    }
}

impl Read for DeclaredLength<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.left == 0 {
            let mut extra = [0u8; 1];
            if self.inner.read(&mut extra)? != 0 {
                return Err(GrexError::codec(format!(
                    "{}: produced more than {} bytes",
                    self.codec, self.decoded_len
                ))
                .into());
            }
            return Ok(0);
        }

        let want = buf.len().min(usize::try_from(self.left).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(GrexError::codec(format!(
                "{}: produced {} of {} bytes",
                self.codec,
                self.decoded_len - self.left,
                self.decoded_len
            ))
            .into());
        }
        self.left -= n as u64;
        Ok(n)
    }
}

/// The identity transform: decoded bytes are the encoded bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn name(&self) -> &str {
        "raw"
    }

    fn open<'a>(
        &'a self,
        input: Box<dyn Read + 'a>,
        decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        Ok(Box::new(input.take(decoded_len)))
    }
}

/// Applies several codecs in sequence, each stage decoding the previous stage's output.
///
/// Only the final stage is bounded by the declared decoded length; intermediate
/// stages run until their input is exhausted.
#[derive(Debug, Clone)]
pub struct ChainCodec {
    stages: Vec<Arc<dyn Codec>>,
    name: String,
}

impl ChainCodec {
    pub fn new(stages: Vec<Arc<dyn Codec>>) -> Self {
        let name = stages
            .iter()
            .map(|stage| stage.name())
            .collect::<Vec<_>>()
            .join("+");
        Self { stages, name }
    }

    pub fn stages(&self) -> &[Arc<dyn Codec>] {
        &self.stages
    }
}

impl Codec for ChainCodec {
    fn name(&self) -> &str {
        &self.name
    }

    fn open<'a>(
        &'a self,
        input: Box<dyn Read + 'a>,
        decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        let Some(last) = self.stages.len().checked_sub(1) else {
            return RawCodec.open(input, decoded_len);
        };
        let mut stream = input;
        for (index, stage) in self.stages.iter().enumerate() {
            let bound = if index == last { decoded_len } else { u64::MAX };
            stream = stage.open(stream, bound)?;
        }
        Ok(stream)
    }
}
