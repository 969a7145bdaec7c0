//! In-memory ZIP32 reader used to inspect finished archives.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the buffer's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For data access, read each file's Local File Header and payload
//!
//! Only STORED entries can be returned; ZIP64 archives are rejected.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;

use anyhow::{Result, bail};

use super::crc32;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: usize = 65535;

/// Read-only view over a complete ZIP archive held in memory.
pub struct ZipReader<'a> {
    data: &'a [u8],
    eocd: EndOfCentralDirectory,
}

impl<'a> ZipReader<'a> {
    /// Locate the EOCD record and prepare the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid EOCD can be found or the archive needs
    /// ZIP64 extensions.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let eocd = find_eocd(data)?;
        if eocd.total_entries == 0xFFFF || eocd.cd_offset == 0xFFFF_FFFF {
            bail!("ZIP64 archives are not supported");
        }
        Ok(Self { data, eocd })
    }

    pub fn entry_count(&self) -> usize {
        self.eocd.total_entries as usize
    }

    /// List all entries in central-directory order.
    pub fn entries(&self) -> Result<Vec<ZipFileEntry>> {
        let start = self.eocd.cd_offset as usize;
        let end = start + self.eocd.cd_size as usize;
        if end > self.data.len() {
            bail!("Central Directory extends past end of archive");
        }

        let mut cursor = Cursor::new(&self.data[start..end]);
        let mut entries = Vec::with_capacity(self.entry_count());
        for _ in 0..self.entry_count() {
            entries.push(ZipFileEntry::read_cdfh(&mut cursor)?);
        }

        Ok(entries)
    }

    /// Return the stored payload of `entry`, located through its Local File Header.
    pub fn entry_data(&self, entry: &ZipFileEntry) -> Result<&'a [u8]> {
        if entry.compression_method != CompressionMethod::Stored {
            bail!(
                "Unsupported compression method: {} (only STORED/uncompressed is supported)",
                entry.compression_method.as_u16()
            );
        }

        let lfh_offset = entry.lfh_offset as usize;
        let Some(lfh) = self.data.get(lfh_offset..lfh_offset + LocalFileHeader::SIZE) else {
            bail!("Local File Header out of bounds");
        };
        if &lfh[0..4] != LocalFileHeader::SIGNATURE {
            bail!("Invalid Local File Header");
        }

        // Data starts after: LFH (30 bytes) + filename + extra field
        let file_name_length = LittleEndian::read_u16(&lfh[26..28]) as usize;
        let extra_field_length = LittleEndian::read_u16(&lfh[28..30]) as usize;
        let data_offset = lfh_offset + LocalFileHeader::SIZE + file_name_length + extra_field_length;

        match self
            .data
            .get(data_offset..data_offset + entry.compressed_size as usize)
        {
            Some(payload) => Ok(payload),
            None => bail!("Entry data for {} out of bounds", entry.file_name),
        }
    }

    /// Check every entry's stored CRC-32 against its payload.
    pub fn verify(&self) -> Result<()> {
        for entry in self.entries()? {
            let actual = crc32::checksum(self.entry_data(&entry)?);
            if actual != entry.crc32 {
                bail!(
                    "CRC mismatch for {}: stored {:08x}, computed {:08x}",
                    entry.file_name,
                    entry.crc32,
                    actual
                );
            }
        }
        Ok(())
    }
}

/// Find and parse the End of Central Directory record.
///
/// Tries the comment-less position first, then searches backwards for a
/// signature whose comment length matches the remaining bytes.
fn find_eocd(data: &[u8]) -> Result<EndOfCentralDirectory> {
    let size = EndOfCentralDirectory::SIZE;
    if data.len() < size {
        bail!("Not a valid ZIP file");
    }

    let tail = &data[data.len() - size..];
    if &tail[0..4] == EndOfCentralDirectory::SIGNATURE && tail[20..22] == [0, 0] {
        return EndOfCentralDirectory::from_bytes(tail);
    }

    let search_start = data.len().saturating_sub(MAX_COMMENT_SIZE + size);
    let window = &data[search_start..];
    for i in (0..=window.len() - size).rev() {
        if &window[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            let comment_len = LittleEndian::read_u16(&window[i + 20..i + 22]) as usize;
            if comment_len == window.len() - i - size {
                return EndOfCentralDirectory::from_bytes(&window[i..i + size]);
            }
        }
    }

    bail!("Not a valid ZIP file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipArchiveWriter;
    use bytes::Bytes;
    use byteorder::WriteBytesExt;

    fn sample() -> Bytes {
        let mut writer = ZipArchiveWriter::new();
        writer.add_file("one.jpg", Bytes::from_static(b"first")).unwrap();
        writer.add_file("two.mp4", Bytes::from_static(b"second!")).unwrap();
        writer.finalize().unwrap()
    }

    #[test]
    fn test_reads_back_written_archive() {
        let bytes = sample();
        let reader = ZipReader::new(&bytes).unwrap();
        let entries = reader.entries().unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["one.jpg", "two.mp4"]);
        assert_eq!(reader.entry_data(&entries[1]).unwrap(), b"second!");
        reader.verify().unwrap();
    }

    #[test]
    fn test_finds_eocd_behind_comment() {
        let mut bytes = sample().to_vec();
        // Patch the comment length and append the comment itself
        let len = bytes.len();
        bytes.truncate(len - 2);
        bytes.write_u16::<LittleEndian>(4).unwrap();
        bytes.extend_from_slice(b"note");

        let reader = ZipReader::new(&bytes).unwrap();
        assert_eq!(reader.entry_count(), 2);
        reader.verify().unwrap();
    }

    #[test]
    fn test_detects_corrupted_payload() {
        let mut bytes = sample().to_vec();
        // First payload byte sits right after the 30-byte header and 7-byte name
        bytes[37] ^= 0xFF;
        let reader = ZipReader::new(&bytes).unwrap();
        let err = reader.verify().unwrap_err();
        assert!(err.to_string().contains("CRC mismatch for one.jpg"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(ZipReader::new(b"definitely not a zip archive").is_err());
        assert!(ZipReader::new(b"PK").is_err());
    }
}
