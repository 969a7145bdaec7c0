//! Append-only ZIP32 assembler for stored (uncompressed) entries.

use bytes::Bytes;
use tracing::debug;

use crate::error::{ArchiveLimit, DownloadError};

use super::crc32;
use super::structures::{CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader};

/// Entry count is capped one below the 16-bit EOCD field.
pub const MAX_ENTRIES: usize = 0xFFFF;

/// Sizes and offsets must stay strictly below 2^32.
const LIMIT_32: u64 = 1 << 32;

/// A file that has already been written to the local-file section.
#[derive(Debug, Clone)]
struct ZipEntry {
    file_name: String,
    size: u32,
    crc32: u32,
    offset: u32,
}

/// Builds a ZIP archive in memory, one stored entry at a time.
///
/// Entries are never mutated or removed once added. A failed
/// [`add_file`](Self::add_file) leaves every earlier entry intact, so the
/// archive can still be finalized.
#[derive(Debug, Default)]
pub struct ZipArchiveWriter {
    /// Local file headers interleaved with entry payloads.
    chunks: Vec<Bytes>,
    entries: Vec<ZipEntry>,
    /// Running length of everything in `chunks`.
    offset: u64,
}

impl ZipArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `data` as a stored entry called `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::EncoderLimitExceeded`] when the entry would be
    /// the 65535th, when `data` is 4 GiB or larger, when the running archive
    /// offset would reach 4 GiB, or when the name exceeds 65535 bytes.
    pub fn add_file(&mut self, file_name: &str, data: Bytes) -> Result<(), DownloadError> {
        if self.entries.len() + 1 >= MAX_ENTRIES {
            return Err(ArchiveLimit::TooManyEntries { max: MAX_ENTRIES }.into());
        }
        let size = data.len() as u64;
        if size >= LIMIT_32 {
            return Err(ArchiveLimit::EntryTooLarge { size }.into());
        }
        let name = file_name.as_bytes();
        if name.len() > u16::MAX as usize {
            return Err(ArchiveLimit::FileNameTooLong { len: name.len() }.into());
        }

        let header = LocalFileHeader {
            crc32: crc32::checksum(&data),
            size: size as u32,
            file_name: name,
        };
        let next_offset = self.offset + header.encoded_len() as u64 + size;
        if next_offset >= LIMIT_32 {
            return Err(ArchiveLimit::ArchiveTooLarge {
                offset: next_offset,
            }
            .into());
        }

        debug!(
            file_name,
            size,
            crc32 = header.crc32,
            offset = self.offset,
            "Adding archive entry"
        );

        self.entries.push(ZipEntry {
            file_name: file_name.to_string(),
            size: header.size,
            crc32: header.crc32,
            offset: self.offset as u32,
        });
        self.chunks.push(Bytes::from(header.to_bytes()));
        self.chunks.push(data);
        self.offset = next_offset;

        Ok(())
    }

    /// Emit local entries, the central directory and the EOCD record as one buffer.
    pub fn finalize(self) -> Result<Bytes, DownloadError> {
        let cd_offset = self.offset;
        let cd_size: u64 = self
            .entries
            .iter()
            .map(|e| (CentralDirectoryHeader::SIZE + e.file_name.len()) as u64)
            .sum();
        let total = cd_offset + cd_size + EndOfCentralDirectory::SIZE as u64;
        if cd_size >= LIMIT_32 || total >= LIMIT_32 {
            return Err(ArchiveLimit::ArchiveTooLarge { offset: total }.into());
        }

        let mut buf = Vec::with_capacity(total as usize);
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
        for entry in &self.entries {
            CentralDirectoryHeader {
                crc32: entry.crc32,
                size: entry.size,
                lfh_offset: entry.offset,
                file_name: entry.file_name.as_bytes(),
            }
            .write_to(&mut buf);
        }
        EndOfCentralDirectory::new(self.entries.len() as u16, cd_size as u32, cd_offset as u32)
            .write_to(&mut buf);

        debug!(
            entries = self.entries.len(),
            size = buf.len(),
            "Finalized archive"
        );

        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipReader;

    #[test]
    fn test_empty_archive_is_bare_eocd() {
        let bytes = ZipArchiveWriter::new().finalize().unwrap();
        assert_eq!(
            bytes.as_ref(),
            b"PK\x05\x06\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00"
        );
    }

    #[test]
    fn test_offsets_and_central_directory() {
        let mut writer = ZipArchiveWriter::new();
        writer.add_file("a.txt", Bytes::from_static(b"hello")).unwrap();
        writer.add_file("b/c.bin", Bytes::from_static(b"\x00\x01\x02")).unwrap();
        let bytes = writer.finalize().unwrap();

        let reader = ZipReader::new(&bytes).unwrap();
        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lfh_offset, 0);
        // 30-byte header + 5-byte name + 5-byte payload
        assert_eq!(entries[1].lfh_offset, 40);
        assert_eq!(reader.entry_data(&entries[0]).unwrap(), b"hello");
        assert_eq!(reader.entry_data(&entries[1]).unwrap(), b"\x00\x01\x02");

        // Central directory starts right after the last payload
        let eocd = &bytes[bytes.len() - EndOfCentralDirectory::SIZE..];
        let eocd = EndOfCentralDirectory::from_bytes(eocd).unwrap();
        assert_eq!(eocd.total_entries, 2);
        assert_eq!(eocd.cd_offset, 40 + 30 + 7 + 3);
        assert_eq!(eocd.cd_size as usize, 46 + 5 + 46 + 7);
    }

    #[test]
    fn test_rejects_entry_limit_and_keeps_prior_entries() {
        let mut writer = ZipArchiveWriter::new();
        for i in 0..MAX_ENTRIES - 1 {
            writer.add_file(&format!("{i}"), Bytes::new()).unwrap();
        }
        assert_eq!(writer.len(), 65534);

        let err = writer.add_file("overflow", Bytes::new()).unwrap_err();
        assert_eq!(
            err,
            DownloadError::EncoderLimitExceeded(ArchiveLimit::TooManyEntries { max: 65535 })
        );
        assert_eq!(writer.len(), 65534);

        let bytes = writer.finalize().unwrap();
        let reader = ZipReader::new(&bytes).unwrap();
        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 65534);
        assert_eq!(entries[65533].file_name, "65533");
    }

    #[test]
    fn test_rejects_overlong_name() {
        let mut writer = ZipArchiveWriter::new();
        let name = "x".repeat(70_000);
        let err = writer.add_file(&name, Bytes::from_static(b"1")).unwrap_err();
        assert_eq!(
            err,
            DownloadError::EncoderLimitExceeded(ArchiveLimit::FileNameTooLong { len: 70_000 })
        );
        assert!(writer.is_empty());
    }
}
