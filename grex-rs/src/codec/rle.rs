use super::Codec;
use crate::error::GrexError;
use std::io::{self, Read};

/// PackBits run-length encoding.
///
/// A control byte `n` in `0..=127` is followed by `n + 1` literal bytes, `129..=255`
/// is followed by one byte repeated `257 - n` times, and `128` is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct RleCodec;

impl Codec for RleCodec {
    fn name(&self) -> &str {
        "rle"
    }

    fn open<'a>(
        &'a self,
        input: Box<dyn Read + 'a>,
        decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        Ok(Box::new(PackBitsReader {
            inner: input,
            remaining: decoded_len,
            run: Run::None,
        }))
    }
}

enum Run {
    None,
    Literal(usize),
    Repeat(u8, usize),
}

struct PackBitsReader<R> {
    inner: R,
    remaining: u64,
    run: Run,
}

impl<R: Read> PackBitsReader<R> {
    /// Reads the next control byte. Returns `false` at the end of the input.
    fn next_run(&mut self) -> io::Result<bool> {
        let mut control = [0u8; 1];
        loop {
            if self.inner.read(&mut control)? == 0 {
                return Ok(false);
            }
            match control[0] {
                0x80 => continue,
                n if n < 0x80 => {
                    self.run = Run::Literal(n as usize + 1);
                    return Ok(true);
                }
                n => {
                    let mut value = [0u8; 1];
                    self.inner.read_exact(&mut value)?;
                    self.run = Run::Repeat(value[0], 257 - n as usize);
                    return Ok(true);
                }
            }
        }
    }
}

impl<R: Read> Read for PackBitsReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let wanted = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let mut written = 0;
        while written < wanted {
            match self.run {
                Run::None => {
                    if !self.next_run()? {
                        break;
                    }
                }
                Run::Literal(count) => {
                    let n = count.min(wanted - written);
                    self.inner.read_exact(&mut buf[written..written + n])?;
                    written += n;
                    self.run = if count == n { Run::None } else { Run::Literal(count - n) };
                }
                Run::Repeat(value, count) => {
                    let n = count.min(wanted - written);
                    buf[written..written + n].fill(value);
                    written += n;
                    self.run = if count == n { Run::None } else { Run::Repeat(value, count - n) };
                }
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
    fn decodes_the_packbits_reference_vector() {
        let encoded = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        let mut source = Cursor::new(encoded.to_vec());
        let out = RleCodec
            .decode(&mut source, 0, encoded.len() as u64, expected.len() as u64)
            .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn streaming_in_small_reads_matches_one_shot() {
        let encoded = vec![0x80, 0xF9, b'z', 0x01, b'a', b'b'];
        let mut stream = RleCodec.open(Box::new(Cursor::new(encoded)), 10).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"zzzzzzzzab");
    }

    #[test]
    fn truncated_literal_run_fails() {
        let encoded = vec![0x05, b'a', b'b'];
        let mut source = Cursor::new(encoded);
        let err = RleCodec.decode(&mut source, 0, 3, 6).unwrap_err();
        assert!(matches!(err, GrexError::CodecFailure(_)));
    }
}
