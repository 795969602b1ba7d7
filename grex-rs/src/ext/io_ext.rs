use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

pub trait ReadExt: Read + Seek {
    /// Reads up to `count` bytes at the current position without advancing it.
    ///
    /// Returns fewer bytes when the stream ends early.
    fn peek_bytes(&mut self, count: usize) -> io::Result<Vec<u8>>;
}

impl<T> ReadExt for T
where
    T: Read + Seek + ?Sized,
{
    fn peek_bytes(&mut self, count: usize) -> io::Result<Vec<u8>> {
        let pos = self.stream_position()?;
        let mut buf = Vec::with_capacity(count);
        Read::take(&mut *self, count as u64).read_to_end(&mut buf)?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(buf)
    }
}

/// A trait that reads byte arrays from any `Read` type.
pub trait ArrayReadExt: Read {
    /// Reads exactly `length` bytes.
    ///
    /// The buffer is reserved fallibly so that an implausible length reports
    /// `OutOfMemory` instead of aborting the process.
    fn read_bytes(&mut self, length: usize) -> io::Result<Vec<u8>>;
}

impl<T> ArrayReadExt for T
where
    T: Read + ?Sized,
{
    fn read_bytes(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let mut result: Vec<u8> = Vec::new();

        result
            .try_reserve_exact(length)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        result.resize(length, 0);

        self.read_exact(&mut result)?;

        Ok(result)
    }
}

/// Utility methods for working with seekable streams.
pub trait SeekExt: Seek {
    /// Skips over the given number of bytes from the current position.
    fn skip<P: Copy + 'static>(&mut self, size: P) -> io::Result<u64>
    where
        u64: TryFrom<P>;
}

impl<T> SeekExt for T
where
    T: Seek + ?Sized,
{
    fn skip<P: Copy + 'static>(&mut self, size: P) -> io::Result<u64>
    where
        u64: TryFrom<P>,
    {
        let size = u64::try_from(size).map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
        let size = i64::try_from(size).map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;

        self.seek(SeekFrom::Current(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn peek_leaves_the_position_alone() {
        let mut cursor = Cursor::new(b"BLTE".to_vec());
        cursor.skip(1u8).unwrap();
        assert_eq!(cursor.peek_bytes(8).unwrap(), b"LTE");
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn read_bytes_fails_on_short_input() {
        let mut cursor = Cursor::new(vec![1u8, 2]);
        assert_eq!(cursor.read_bytes(2).unwrap(), [1, 2]);
        let err = Cursor::new(vec![1u8]).read_bytes(4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
