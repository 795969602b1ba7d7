use super::Codec;
use crate::error::GrexError;
use std::io::{self, Read};

const WINDOW_SIZE: usize = 4096;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Dialect parameters for [`LzssCodec`].
///
/// Game engines reuse the same 4 KiB ring buffer scheme but disagree on how the
/// window is pre-filled and where writing starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzssParams {
    /// The byte the window is filled with before decoding.
    pub fill: u8,
    /// The window position the first decoded byte is written to.
    pub start: u16,
    /// The length encoded by a stored length nibble of zero.
    pub min_match: u8,
}

impl Default for LzssParams {
    fn default() -> Self {
        Self {
            fill: 0x20,
            start: (WINDOW_SIZE - 18) as u16,
            min_match: 3,
        }
    }
}

/// LZSS with a 4 KiB ring window.
///
/// A flag byte, read least significant bit first, announces the next eight items.
/// A set bit is a literal byte; a clear bit is a two byte back-reference holding a
/// 12 bit window position and a 4 bit length.
#[derive(Debug, Default, Clone, Copy)]
pub struct LzssCodec {
    params: LzssParams,
}

impl LzssCodec {
    pub fn new(params: LzssParams) -> Self {
        Self { params }
    }
}

impl Codec for LzssCodec {
    fn name(&self) -> &str {
        "lzss"
    }

    fn open<'a>(
        &'a self,
        input: Box<dyn Read + 'a>,
        decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        Ok(Box::new(LzssReader {
            inner: input,
            window: vec![self.params.fill; WINDOW_SIZE],
            pos: self.params.start as usize & WINDOW_MASK,
            min_match: self.params.min_match as usize,
            flags: 0,
            copy: None,
            remaining: decoded_len,
        }))
    }
}

struct LzssReader<R> {
    inner: R,
    window: Vec<u8>,
    pos: usize,
    min_match: usize,
    flags: u32,
    /// Window position and length left of the back-reference being copied.
    copy: Option<(usize, usize)>,
    remaining: u64,
}

impl<R: Read> LzssReader<R> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn emit(&mut self, byte: u8, out: &mut [u8], written: &mut usize) {
        out[*written] = byte;
        *written += 1;
        self.window[self.pos] = byte;
        self.pos = (self.pos + 1) & WINDOW_MASK;
    }
}

impl<R: Read> Read for LzssReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let wanted = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let mut written = 0;

        while written < wanted {
            if let Some((src, left)) = self.copy {
                let byte = self.window[src & WINDOW_MASK];
                self.emit(byte, buf, &mut written);
                self.copy = (left > 1).then_some((src + 1, left - 1));
                continue;
            }

            self.flags >>= 1;
            if self.flags & 0x100 == 0 {
                match self.read_byte()? {
                    Some(flags) => self.flags = flags as u32 | 0xFF00,
                    None => break,
                }
            }

            if self.flags & 1 != 0 {
                match self.read_byte()? {
                    Some(byte) => self.emit(byte, buf, &mut written),
                    None => break,
                }
            } else {
                let (Some(low), Some(high)) = (self.read_byte()?, self.read_byte()?) else {
                    break;
                };
                let src = low as usize | ((high as usize & 0xF0) << 4);
                let len = (high as usize & 0x0F) + self.min_match;
                self.copy = Some((src, len));
            }
        }

        self.remaining -= written as u64;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn back_reference_overlaps_its_own_output() {
        // Literals "abc" land at 0xFEE..0xFF0, then a 6 byte copy from 0xFEE, then 'X'.
        let encoded = vec![0x17, b'a', b'b', b'c', 0xEE, 0xF3, b'X'];
        let mut source = Cursor::new(encoded);
        let out = LzssCodec::default().decode(&mut source, 0, 7, 10).unwrap();
        assert_eq!(out, b"abcabcabcX");
    }

    #[test]
    fn window_starts_with_the_fill_byte() {
        let encoded = vec![0x00, 0x00, 0x00];
        let mut source = Cursor::new(encoded.clone());
        assert_eq!(LzssCodec::default().decode(&mut source, 0, 3, 3).unwrap(), b"   ");

        let zero_filled = LzssCodec::new(LzssParams {
            fill: 0,
            ..LzssParams::default()
        });
        let mut source = Cursor::new(encoded);
        assert_eq!(zero_filled.decode(&mut source, 0, 3, 3).unwrap(), [0, 0, 0]);
    }

    #[test]
    fn exhausted_input_is_a_short_decode() {
        let encoded = vec![0xFF, b'a', b'b'];
        let mut source = Cursor::new(encoded);
        let err = LzssCodec::default().decode(&mut source, 0, 3, 5).unwrap_err();
        assert!(matches!(err, GrexError::CodecFailure(_)));
    }
}
