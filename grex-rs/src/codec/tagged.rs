use super::{Codec, CodecKind};
use crate::error::GrexError;
use std::io::Read;

/// Decodes a frame whose first byte selects the transform for the rest of the frame.
///
/// Used as the inner codec of a block adapter for BLTE style frame tables, where
/// every block is tagged independently.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaggedCodec;

impl Codec for TaggedCodec {
    fn name(&self) -> &str {
        "tagged"
    }

    fn open<'a>(
        &'a self,
        mut input: Box<dyn Read + 'a>,
        decoded_len: u64,
    ) -> Result<Box<dyn Read + 'a>, GrexError> {
        let mut tag = [0u8; 1];
        input
            .read_exact(&mut tag)
            .map_err(|_| GrexError::codec("tagged: frame has no tag byte"))?;

        let kind = CodecKind::from(tag[0]);
        let codec = kind
            .codec()
            .ok_or_else(|| GrexError::codec(format!("tagged: unsupported frame type {kind:?}")))?;

        codec.open(input, decoded_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn dispatches_on_the_tag_byte() {
        let mut raw = vec![b'N'];
        raw.extend_from_slice(b"plain");
        let mut source = Cursor::new(raw);
        assert_eq!(TaggedCodec.decode(&mut source, 0, 6, 5).unwrap(), b"plain");

        let mut encoder = ZlibEncoder::new(vec![b'Z'], Compression::default());
        encoder.write_all(b"squeezed").unwrap();
        let zipped = encoder.finish().unwrap();
        let mut source = Cursor::new(zipped.clone());
        assert_eq!(
            TaggedCodec
                .decode(&mut source, 0, zipped.len() as u64, 8)
                .unwrap(),
            b"squeezed"
        );
    }

    #[test]
    fn encrypted_frames_are_rejected() {
        let mut source = Cursor::new(vec![b'E', 1, 2, 3]);
        let err = TaggedCodec.decode(&mut source, 0, 4, 3).unwrap_err();
        assert!(matches!(err, GrexError::CodecFailure(_)));
    }
}
