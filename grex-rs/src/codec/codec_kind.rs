use super::{Codec, RawCodec, ZlibCodec};

/// The leading tag byte of a self-describing frame.
///
/// BLTE style containers prefix every frame with one byte naming the transform
/// that was applied to the rest of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecKind {
    /// Plain raw data, uncompressed and unencrypted.
    Raw = 0x4E,
    /// Zlib compressed data.
    ZLib = 0x5A,
    /// Encrypted data.
    Encrypted = 0x45,
    /// A nested frame table.
    Frame = 0x46,
    /// Unknown or unsupported type, stores the raw byte value.
    Unknown(u8),
}

impl From<u8> for CodecKind {
    fn from(byte: u8) -> Self {
        match byte {
            0x4E => CodecKind::Raw,
            0x5A => CodecKind::ZLib,
            0x45 => CodecKind::Encrypted,
            0x46 => CodecKind::Frame,
            other => CodecKind::Unknown(other),
        }
    }
}

impl CodecKind {
    /// Returns the codec that decodes the body of a frame with this tag, if supported.
    pub fn codec(self) -> Option<&'static dyn Codec> {
        match self {
            CodecKind::Raw => Some(&RawCodec),
            CodecKind::ZLib => Some(&ZlibCodec),
            CodecKind::Encrypted | CodecKind::Frame | CodecKind::Unknown(_) => None,
        }
    }
}
