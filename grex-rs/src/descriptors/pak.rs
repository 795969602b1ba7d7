use crate::detection::{weight, DescriptorInfo, FormatDescriptor, Probe, Signature};
use crate::entry::Entry;
use crate::error::GrexError;
use crate::ext::io_ext::ArrayReadExt;
use crate::resource::Resource;
use crate::validator::Validator;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

const HEADER_SIZE: u64 = 12;
const ENTRY_SIZE: u64 = 64;
const NAME_SIZE: usize = 56;

/// The fixed header of a Quake PACK file.
#[derive(Debug, Clone, Copy)]
struct PakHeader {
    /// The signature identifying the file, `PACK`.
    signature: [u8; 4],
    /// The position of the directory.
    directory_offset: i32,
    /// The size of the directory in bytes.
    directory_length: i32,
}

impl PakHeader {
    fn read<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<Self> {
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        Ok(Self {
            signature,
            directory_offset: reader.read_i32::<LittleEndian>()?,
            directory_length: reader.read_i32::<LittleEndian>()?,
        })
    }

    /// Validates the directory span and returns its offset and entry count.
    fn directory(&self, size: u64, max_entry_count: u64) -> Result<(u64, u64), GrexError> {
        let (offset, length) =
            Validator::check_span(self.directory_offset, self.directory_length, size)?;
        if offset < HEADER_SIZE {
            return Err(GrexError::constraint(format!(
                "directory at {offset} overlaps the header"
            )));
        }
        if length % ENTRY_SIZE != 0 {
            return Err(GrexError::constraint(format!(
                "directory of {length} bytes is not a whole number of entries"
            )));
        }
        let count = Validator::check_count(length / ENTRY_SIZE, max_entry_count)?;
        Ok((offset, count))
    }
}

/// Quake `.pak` archives: a 12 byte header and a directory of 64 byte entries
/// with 56 byte names.
#[derive(Debug, Default, Clone, Copy)]
pub struct PakDescriptor;

impl PakDescriptor {
    const INFO: DescriptorInfo = DescriptorInfo {
        name: "Quake PAK",
        extensions: &["pak"],
        signatures: &[Signature {
            offset: 0,
            magic: b"PACK",
        }],
        file_types: &[
            ("bsp", "Map"),
            ("mdl", "Model"),
            ("spr", "Sprite"),
            ("wav", "Sound"),
            ("lmp", "Lump"),
            ("dem", "Demo"),
            ("cfg", "Config"),
        ],
    };
}

impl FormatDescriptor for PakDescriptor {
    fn info(&self) -> &DescriptorInfo {
        &Self::INFO
    }

    fn score(&self, probe: &Probe) -> Result<u32, GrexError> {
        let mut card = probe.score_card()?;
        if !card.signatures(&Self::INFO, weight::SIGNATURE)? {
            return Ok(0);
        }
        card.extension(Self::INFO.extensions, weight::EXTENSION);
        let max_entry_count = probe.limits().max_entry_count;
        card.field(weight::FIELD, |reader, size| {
            reader.seek(SeekFrom::Start(0))?;
            PakHeader::read(reader)?.directory(size, max_entry_count)?;
            Ok(())
        })?;
        Ok(card.total())
    }

    fn parse_directory(&self, probe: &Probe) -> Result<Vec<Entry>, GrexError> {
        let size = probe.size();
        let mut reader = probe.open()?;
        let header = PakHeader::read(&mut reader)?;
        if &header.signature != b"PACK" {
            return Err(GrexError::constraint(format!(
                "invalid PACK signature {}",
                hex::encode(header.signature)
            )));
        }
        let (offset, count) = header.directory(size, probe.limits().max_entry_count)?;

        reader.seek(SeekFrom::Start(offset))?;
        let table = reader.read_bytes((count * ENTRY_SIZE) as usize)?;
        let mut table = Cursor::new(table);

        let mut entries = Vec::with_capacity(count as usize);
        let mut name = [0u8; NAME_SIZE];
        for _ in 0..count {
            table.read_exact(&mut name)?;
            let name = Validator::check_name_bytes(&name)?;
            let file_offset = table.read_i32::<LittleEndian>()?;
            let file_length = table.read_i32::<LittleEndian>()?;
            let (file_offset, file_length) =
                Validator::check_span(file_offset, file_length, size)?;
            let resource = Resource::new(probe.source().clone(), name, file_offset, file_length);
            entries.push(resource.into());
        }
        Ok(entries)
    }
}
