use crate::block_codec::BlockCodecAdapter;
use crate::codec::{CodecKind, TaggedCodec};
use crate::detection::{weight, DescriptorInfo, FormatDescriptor, Probe, Signature};
use crate::entry::Entry;
use crate::error::GrexError;
use crate::ext::io_ext::SeekExt;
use crate::resource::Resource;
use crate::source::ReadSeek;
use crate::validator::Validator;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

/// The size of the signature and header size fields.
const PREAMBLE_SIZE: u64 = 8;
/// The size of the table format and frame count fields.
const TABLE_HEADER_SIZE: u64 = 4;
/// The size of one frame table entry.
const FRAME_ENTRY_SIZE: u64 = 24;
const TABLE_FORMAT: u8 = 0x0F;

/// Represents the header of a BLTE block table.
#[derive(Debug, Clone, Copy)]
struct BlockTableHeader {
    /// The size of the header in bytes, zero for a single untabled frame.
    header_size: u32,
    /// The format version of the table.
    table_format: u8,
    /// The number of frames in the table.
    frame_count: u32,
}

impl BlockTableHeader {
    /// Reads the header after the signature.
    fn read<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<Self> {
        let header_size = reader.read_u32::<BigEndian>()?;
        if header_size == 0 {
            return Ok(Self {
                header_size,
                table_format: 0,
                frame_count: 0,
            });
        }
        Ok(Self {
            header_size,
            table_format: reader.read_u8()?,
            frame_count: reader.read_u24::<BigEndian>()?,
        })
    }

    /// Checks the header against itself and the size of the candidate.
    fn validate(&self, size: u64) -> Result<(), GrexError> {
        if self.header_size == 0 {
            return Ok(());
        }
        if self.table_format != TABLE_FORMAT {
            return Err(GrexError::constraint(format!(
                "unknown frame table format {:#04x}",
                self.table_format
            )));
        }
        Validator::check_count_for(self.frame_count, FRAME_ENTRY_SIZE, size)?;
        let expected = PREAMBLE_SIZE + TABLE_HEADER_SIZE + self.frame_count as u64 * FRAME_ENTRY_SIZE;
        if self.header_size as u64 != expected || expected > size {
            return Err(GrexError::constraint(format!(
                "header of {} bytes for {} frames",
                self.header_size, self.frame_count
            )));
        }
        Ok(())
    }
}

/// Represents one frame of the block table.
#[derive(Debug, Clone, Copy)]
struct BlockTableEntry {
    /// The encoded size of the frame, including its codec tag.
    encoded_size: u32,
    /// The decoded size of the frame.
    content_size: u32,
}

impl BlockTableEntry {
    fn read<R: Read + Seek + ?Sized>(reader: &mut R) -> std::io::Result<Self> {
        let encoded_size = reader.read_u32::<BigEndian>()?;
        let content_size = reader.read_u32::<BigEndian>()?;
        // MD5 of the encoded frame.
        reader.skip(16u64)?;
        Ok(Self {
            encoded_size,
            content_size,
        })
    }
}

/// BLTE encoded blobs: a frame table followed by frames that each start with a
/// codec tag.
///
/// A blob holds one logical file and stores no name, so the single entry gets a
/// placeholder name derived from the container's file name.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlteDescriptor;

impl BlteDescriptor {
    const INFO: DescriptorInfo = DescriptorInfo {
        name: "BLTE",
        extensions: &["blte"],
        signatures: &[Signature {
            offset: 0,
            magic: b"BLTE",
        }],
        file_types: &[("dat", "Data")],
    };

    fn read_header(reader: &mut dyn ReadSeek, size: u64) -> Result<BlockTableHeader, GrexError> {
        reader.seek(SeekFrom::Start(4))?;
        let header = BlockTableHeader::read(reader)?;
        header.validate(size)?;
        Ok(header)
    }
}

impl FormatDescriptor for BlteDescriptor {
    fn info(&self) -> &DescriptorInfo {
        &Self::INFO
    }

    fn score(&self, probe: &Probe) -> Result<u32, GrexError> {
        let mut card = probe.score_card()?;
        if !card.signatures(&Self::INFO, weight::SIGNATURE)? {
            return Ok(0);
        }
        card.extension(Self::INFO.extensions, weight::EXTENSION);
        card.field(weight::FIELD, |reader, size| {
            Self::read_header(reader, size)?;
            Ok(())
        })?;
        Ok(card.total())
    }

    fn parse_directory(&self, probe: &Probe) -> Result<Vec<Entry>, GrexError> {
        let size = probe.size();
        let mut reader = probe.open()?;
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        if &signature != b"BLTE" {
            return Err(GrexError::constraint(format!(
                "invalid BLTE signature {}",
                hex::encode(signature)
            )));
        }
        let header = Self::read_header(reader.as_mut(), size)?;
        let name = format!("{}.dat", probe.file_stem());
        let name = Validator::check_name(&name)?;

        if header.header_size == 0 {
            // A single frame running to the end of the blob; only raw frames say
            // how long they decode.
            let encoded = size.saturating_sub(PREAMBLE_SIZE);
            let tag = reader.read_u8()?;
            if CodecKind::from(tag) != CodecKind::Raw {
                return Err(GrexError::constraint(format!(
                    "untabled frame of type {:?} has no decoded size",
                    CodecKind::from(tag)
                )));
            }
            let resource = Resource::with_codec(
                probe.source().clone(),
                name,
                PREAMBLE_SIZE,
                encoded,
                encoded - 1,
                Arc::new(TaggedCodec),
            );
            return Ok(vec![resource.with_placeholder_name().into()]);
        }

        let frame_count = header.frame_count as usize;
        let mut offsets = Vec::with_capacity(frame_count);
        let mut encoded_lengths = Vec::with_capacity(frame_count);
        let mut decoded_lengths = Vec::with_capacity(frame_count);
        let mut archive_offset = 0u64;
        for _ in 0..frame_count {
            let frame = BlockTableEntry::read(&mut reader)?;
            if frame.encoded_size == 0 {
                return Err(GrexError::constraint("frame without a codec tag"));
            }
            offsets.push(archive_offset);
            encoded_lengths.push(frame.encoded_size as u64);
            decoded_lengths.push(frame.content_size as u64);
            archive_offset += frame.encoded_size as u64;
        }

        let data_offset = header.header_size as u64;
        let (data_offset, encoded) = Validator::check_span(data_offset, archive_offset, size)?;
        let adapter =
            BlockCodecAdapter::new(Arc::new(TaggedCodec), offsets, encoded_lengths, decoded_lengths)?;
        let decoded = adapter.decoded_len();
        let resource = Resource::with_codec(
            probe.source().clone(),
            name,
            data_offset,
            encoded,
            decoded,
            Arc::new(adapter),
        );
        Ok(vec![resource.with_placeholder_name().into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib_frame(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(vec![b'Z'], Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn raw_frame(data: &[u8]) -> Vec<u8> {
        let mut frame = vec![b'N'];
        frame.extend_from_slice(data);
        frame
    }

    /// Builds a tabled BLTE blob from encoded frames and their decoded sizes.
    fn build_blte(frames: &[(Vec<u8>, usize)]) -> Vec<u8> {
        let header_size = 12 + 24 * frames.len() as u32;
        let mut blte = b"BLTE".to_vec();
        blte.extend_from_slice(&header_size.to_be_bytes());
        blte.push(TABLE_FORMAT);
        blte.extend_from_slice(&(frames.len() as u32).to_be_bytes()[1..]);
        for (frame, decoded) in frames {
            blte.extend_from_slice(&(frame.len() as u32).to_be_bytes());
            blte.extend_from_slice(&(*decoded as u32).to_be_bytes());
            blte.extend_from_slice(&[0u8; 16]);
        }
        for (frame, _) in frames {
            blte.extend_from_slice(frame);
        }
        blte
    }

    #[test]
    fn decodes_mixed_frames_in_order() {
        let blte = build_blte(&[
            (zlib_frame(b"hello, "), 7),
            (raw_frame(b"blte "), 5),
            (zlib_frame(b"world"), 5),
        ]);
        let probe = Probe::from_bytes("0a1b2c.blte", blte);
        let entries = BlteDescriptor.parse_directory(&probe).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "0a1b2c.dat");
        assert_eq!(entries[0].decoded_length(), 17);
        assert_eq!(entries[0].extract().unwrap(), b"hello, blte world");
        assert_eq!(
            BlteDescriptor.score(&probe).unwrap(),
            weight::SIGNATURE + weight::EXTENSION + weight::FIELD
        );
    }

    #[test]
    fn untabled_raw_blob() {
        let mut blte = b"BLTE".to_vec();
        blte.extend_from_slice(&0u32.to_be_bytes());
        blte.extend_from_slice(&raw_frame(b"plain"));
        let probe = Probe::from_bytes("blob", blte);
        let entries = BlteDescriptor.parse_directory(&probe).unwrap();
        assert_eq!(entries[0].extract().unwrap(), b"plain");
    }

    #[test]
    fn unknown_table_format_is_a_mismatch() {
        let mut blte = build_blte(&[(raw_frame(b"x"), 1)]);
        blte[8] = 0x10;
        let probe = Probe::from_bytes("x.blte", blte);
        assert!(matches!(
            BlteDescriptor.parse_directory(&probe),
            Err(GrexError::ConstraintViolation(_))
        ));
        assert_eq!(
            BlteDescriptor.score(&probe).unwrap(),
            weight::SIGNATURE + weight::EXTENSION
        );
    }

    #[test]
    fn parse_requires_the_signature() {
        let mut blte = build_blte(&[(raw_frame(b"x"), 1)]);
        blte[..4].copy_from_slice(b"ELTB");
        let probe = Probe::from_bytes("x.blte", blte);
        assert_eq!(BlteDescriptor.score(&probe).unwrap(), 0);
        assert!(matches!(
            BlteDescriptor.parse_directory(&probe),
            Err(GrexError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn unsupported_frames_fail_at_extraction() {
        let blte = build_blte(&[(raw_frame(b"ok"), 2), (vec![b'E', 1, 2, 3], 3)]);
        let probe = Probe::from_bytes("enc.blte", blte);
        let entries = BlteDescriptor.parse_directory(&probe).unwrap();
        assert!(matches!(
            entries[0].extract(),
            Err(GrexError::CodecFailure(_))
        ));
    }
}
