use crate::codec::{Codec, DeclaredLength};
use crate::error::GrexError;
use crate::ext::io_ext::ArrayReadExt;
use crate::resource_flags::ResourceFlags;
use crate::source::Source;
use crate::validator::Validator;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

/// A logical file inside a container, described by coordinates rather than loaded bytes.
///
/// Constructing a `Resource` never touches the container. Bytes are read and decoded
/// only when [`Resource::extract`] or [`Resource::open`] is called, and every call
/// starts from the coordinates again, so extraction is idempotent and a `Resource`
/// can be shared between threads.
#[derive(Debug, Clone)]
pub struct Resource {
    /// The container the encoded span lives in.
    source: Source,
    /// The logical path of the resource.
    name: String,
    /// The name the container declared, kept across renames.
    original_name: String,
    /// The starting position of the encoded span.
    offset: u64,
    /// The size of the encoded span.
    length: u64,
    /// The size after decoding; equal to `length` when there is no codec.
    decoded_length: u64,
    /// The transform applied when materializing bytes.
    codec: Option<Arc<dyn Codec>>,
    /// The hash of the logical name as stored by the container, if any.
    name_hash: Option<u64>,
    flags: ResourceFlags,
}

impl Resource {
    /// Creates a resource stored as a raw copy of `length` bytes at `offset`.
    pub fn new(source: Source, name: impl Into<String>, offset: u64, length: u64) -> Self {
        let name = name.into();
        Self {
            source,
            original_name: name.clone(),
            name,
            offset,
            length,
            decoded_length: length,
            codec: None,
            name_hash: None,
            flags: ResourceFlags::empty(),
        }
    }

    /// Creates a resource whose `length` encoded bytes decode to `decoded_length` bytes.
    pub fn with_codec(
        source: Source,
        name: impl Into<String>,
        offset: u64,
        length: u64,
        decoded_length: u64,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            decoded_length,
            codec: Some(codec),
            ..Self::new(source, name, offset, length)
        }
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

    /// The container the encoded span lives in.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The logical path of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name the container declared, kept across renames.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// The starting position of the encoded span.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The size of the encoded span.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The number of bytes `extract` returns.
    pub fn decoded_length(&self) -> u64 {
        self.decoded_length
    }

    /// The transform applied when materializing bytes, if any.
    pub fn codec(&self) -> Option<&Arc<dyn Codec>> {
        self.codec.as_ref()
    }

    /// The hash the container stores in place of a name, if any.
    pub fn name_hash(&self) -> Option<u64> {
        self.name_hash
    }

    /// How the resource was changed since parsing.
    pub fn flags(&self) -> ResourceFlags {
        self.flags
    }

    /// Returns `true` if the resource was renamed or replaced since parsing.
    pub fn is_modified(&self) -> bool {
        self.flags.is_modified()
    }

    /// Gives the resource a new logical name. The original name is kept.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.flags.remove(ResourceFlags::PLACEHOLDER_NAME);
        self.flags.insert(ResourceFlags::RENAMED);
    }

    /// Moves the encoded span to a corrected offset.
    pub fn relocate(&mut self, offset: u64) {
        self.offset = offset;
        self.flags.insert(ResourceFlags::RELOCATED);
    }

    /// Points the resource at replacement content stored raw in `source`.
    pub fn replace(&mut self, source: Source, offset: u64, length: u64) {
        self.source = source;
        self.offset = offset;
        self.length = length;
        self.decoded_length = length;
        self.codec = None;
        self.flags.insert(ResourceFlags::REPLACED);
    }

    /// Checks the encoded span against the current size of the container.
    pub fn validate(&self) -> Result<(), GrexError> {
        Validator::check_span(self.offset, self.length, self.source.size()?)?;
        if self.codec.is_none() && self.length != self.decoded_length {
            return Err(GrexError::constraint(format!(
                "{}: raw resource declares {} encoded and {} decoded bytes",
                self.name, self.length, self.decoded_length
            )));
        }
        Ok(())
    }

    /// Returns `Truncated` if the span no longer fits the live container.
    pub(crate) fn check_live_span(
        name: &str,
        source: &Source,
        offset: u64,
        length: u64,
    ) -> Result<(), GrexError> {
        let size = source.size()?;
        match offset.checked_add(length) {
            Some(end) if end <= size => Ok(()),
            end => Err(GrexError::Truncated {
                name: name.to_string(),
                end: end.unwrap_or(u64::MAX),
                size,
            }),
        }
    }

    /// Reads and decodes the resource, returning exactly `decoded_length` bytes.
    pub fn extract(&self) -> Result<Vec<u8>, GrexError> {
        Self::check_live_span(&self.name, &self.source, self.offset, self.length)?;
        let mut reader = self.source.open()?;

        match &self.codec {
            None => {
                let length = usize::try_from(self.length).map_err(|_| {
                    GrexError::constraint(format!("{}: {} bytes", self.name, self.length))
                })?;
                reader.seek(SeekFrom::Start(self.offset))?;
                reader.read_bytes(length).map_err(|err| match err.kind() {
                    // The container shrank between the size check and the read.
                    std::io::ErrorKind::UnexpectedEof => GrexError::Truncated {
                        name: self.name.clone(),
                        end: self.offset.saturating_add(self.length),
                        size: self.source.size().unwrap_or(self.offset),
                    },
                    _ => GrexError::Io(err),
                })
            }
            Some(codec) => codec
                .decode(reader.as_mut(), self.offset, self.length, self.decoded_length)
                .map_err(|err| match err {
                    GrexError::CodecFailure(message) => {
                        GrexError::CodecFailure(format!("{}: {message}", self.name))
                    }
                    other => other,
                }),
        }
    }

    /// Opens a stream of decoded bytes without buffering the whole resource.
    ///
    /// The stream yields exactly `decoded_length` bytes; a codec that produces more or
    /// fewer fails the read with a `CodecFailure`, recoverable through
    /// `std::io::Error::into_inner`.
    pub fn open(&self) -> Result<Box<dyn Read + '_>, GrexError> {
        Self::check_live_span(&self.name, &self.source, self.offset, self.length)?;
        let mut reader = self.source.open()?;
        reader.seek(SeekFrom::Start(self.offset))?;
        let input: Box<dyn Read> = Box::new(reader.take(self.length));

        match &self.codec {
            None => Ok(input),
            Some(codec) => Ok(Box::new(DeclaredLength::new(
                codec.open(input, self.decoded_length)?,
                self.decoded_length,
                codec.name(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RleCodec, ZlibCodec};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn raw_extract_returns_the_source_span() {
        let source = Source::from_bytes(b"headerPAYLOADtrailer".to_vec());
        let resource = Resource::new(source, "payload.bin", 6, 7);
        assert_eq!(resource.extract().unwrap(), b"PAYLOAD");
        assert_eq!(resource.extract().unwrap(), b"PAYLOAD");
    }

    #[test]
    fn span_past_the_end_is_truncated() {
        let source = Source::from_bytes(vec![0u8; 10]);
        let resource = Resource::new(source, "late.bin", 8, 4);
        match resource.extract() {
            Err(GrexError::Truncated { end, size, .. }) => {
                assert_eq!(end, 12);
                assert_eq!(size, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(resource.validate().is_err());
    }

    #[test]
    fn codec_output_has_the_declared_length() {
        let source = Source::from_bytes(vec![0xFB, b'-', 0x00, b'!']);
        let resource = Resource::with_codec(source, "rle.txt", 0, 4, 7, Arc::new(RleCodec));
        assert_eq!(resource.extract().unwrap(), b"------!");

        let mut streamed = Vec::new();
        resource.open().unwrap().read_to_end(&mut streamed).unwrap();
        assert_eq!(streamed, b"------!");
    }

    #[test]
    fn streams_stop_at_the_declared_length() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[7u8; 64]).unwrap();
        let packed = encoder.finish().unwrap();
        let length = packed.len() as u64;

        let short = Resource::with_codec(
            Source::from_bytes(packed.clone()),
            "short.bin",
            0,
            length,
            4,
            Arc::new(ZlibCodec),
        );
        assert!(matches!(short.extract(), Err(GrexError::CodecFailure(_))));
        let err = short
            .open()
            .unwrap()
            .read_to_end(&mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            GrexError::from_stream(err, "zlib"),
            GrexError::CodecFailure(_)
        ));

        let long = Resource::with_codec(
            Source::from_bytes(packed.clone()),
            "long.bin",
            0,
            length,
            80,
            Arc::new(ZlibCodec),
        );
        assert!(long.open().unwrap().read_to_end(&mut Vec::new()).is_err());

        let exact = Resource::with_codec(
            Source::from_bytes(packed),
            "exact.bin",
            0,
            length,
            64,
            Arc::new(ZlibCodec),
        );
        let mut streamed = Vec::new();
        exact.open().unwrap().read_to_end(&mut streamed).unwrap();
        assert_eq!(streamed, [7u8; 64]);
    }

    #[test]
    fn rename_keeps_the_original_name() {
        let source = Source::from_bytes(vec![0u8; 4]);
        let mut resource = Resource::new(source, "File0001.dat", 0, 4).with_placeholder_name();
        assert!(!resource.is_modified());

        resource.rename("sounds/boom.wav");
        assert_eq!(resource.name(), "sounds/boom.wav");
        assert_eq!(resource.original_name(), "File0001.dat");
        assert!(resource.is_modified());
        assert!(!resource.flags().contains(ResourceFlags::PLACEHOLDER_NAME));
    }
}
