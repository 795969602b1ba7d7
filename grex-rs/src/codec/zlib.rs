use super::Codec;
use crate::error::GrexError;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// Zlib wrapped deflate streams (RFC 1950).
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn name(&self) -> &str {
        "zlib"
    }

    fn open<'a>(
        &'a self,
        input: Box<dyn Read + 'a>,
        _decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        Ok(Box::new(ZlibDecoder::new(input)))
    }
}

/// Raw deflate streams without a zlib header (RFC 1951).
#[derive(Debug, Default, Clone, Copy)]
pub struct DeflateCodec;

impl Codec for DeflateCodec {
    fn name(&self) -> &str {
        "deflate"
    }

    fn open<'a>(
        &'a self,
        input: Box<dyn Read + 'a>,
        _decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        Ok(Box::new(DeflateDecoder::new(input)))
    }
}
