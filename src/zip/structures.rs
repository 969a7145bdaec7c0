use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use anyhow::{Result, bail};

/// "Version needed to extract" / "version made by" written into every record (2.0).
pub const ZIP_VERSION: u16 = 20;

/// General purpose flag bit 11: filename is UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Local File Header (LFH) - 30 bytes plus the filename
pub struct LocalFileHeader<'a> {
    pub crc32: u32,
    pub size: u32,
    pub file_name: &'a [u8],
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    /// Encoded length of this header, filename included.
    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut fixed = [0u8; Self::SIZE];
        fixed[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut fixed[4..6], ZIP_VERSION);
        LittleEndian::write_u16(&mut fixed[6..8], FLAG_UTF8);
        LittleEndian::write_u16(&mut fixed[8..10], CompressionMethod::Stored.as_u16());
        // mod time and date (10..14) stay zero
        LittleEndian::write_u32(&mut fixed[14..18], self.crc32);
        LittleEndian::write_u32(&mut fixed[18..22], self.size);
        LittleEndian::write_u32(&mut fixed[22..26], self.size);
        LittleEndian::write_u16(&mut fixed[26..28], self.file_name.len() as u16);
        // extra field length (28..30) stays zero

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&fixed);
        buf.extend_from_slice(self.file_name);
        buf
    }
}

/// Central Directory File Header (CDFH) - 46 bytes plus the filename
pub struct CentralDirectoryHeader<'a> {
    pub crc32: u32,
    pub size: u32,
    pub lfh_offset: u32,
    pub file_name: &'a [u8],
}

impl CentralDirectoryHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const SIZE: usize = 46;

    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len()
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let mut fixed = [0u8; Self::SIZE];
        fixed[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut fixed[4..6], ZIP_VERSION);
        LittleEndian::write_u16(&mut fixed[6..8], ZIP_VERSION);
        LittleEndian::write_u16(&mut fixed[8..10], FLAG_UTF8);
        LittleEndian::write_u16(&mut fixed[10..12], CompressionMethod::Stored.as_u16());
        LittleEndian::write_u32(&mut fixed[16..20], self.crc32);
        LittleEndian::write_u32(&mut fixed[20..24], self.size);
        LittleEndian::write_u32(&mut fixed[24..28], self.size);
        LittleEndian::write_u16(&mut fixed[28..30], self.file_name.len() as u16);
        // extra, comment, disk start, internal and external attributes stay zero
        LittleEndian::write_u32(&mut fixed[42..46], self.lfh_offset);

        buf.extend_from_slice(&fixed);
        buf.extend_from_slice(self.file_name);
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// EOCD for a single-disk archive without a comment.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let mut fixed = [0u8; Self::SIZE];
        fixed[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut fixed[4..6], self.disk_number);
        LittleEndian::write_u16(&mut fixed[6..8], self.disk_with_cd);
        LittleEndian::write_u16(&mut fixed[8..10], self.disk_entries);
        LittleEndian::write_u16(&mut fixed[10..12], self.total_entries);
        LittleEndian::write_u32(&mut fixed[12..16], self.cd_size);
        LittleEndian::write_u32(&mut fixed[16..20], self.cd_offset);
        LittleEndian::write_u16(&mut fixed[20..22], self.comment_len);
        buf.extend_from_slice(&fixed);
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
}

impl ZipFileEntry {
    /// Parse one Central Directory File Header, leaving the cursor after it.
    pub fn read_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CentralDirectoryHeader::SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

        // Skip the extra field and comment; ZIP64 records are not produced here
        cursor.set_position(
            cursor.position() + extra_field_length as u64 + file_comment_length as u64,
        );

        Ok(ZipFileEntry {
            file_name,
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_header_layout() {
        let header = LocalFileHeader {
            crc32: 0xCBF4_3926,
            size: 9,
            file_name: b"a.txt",
        };
        let bytes = header.to_bytes();

        assert_eq!(bytes.len(), 35);
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
        assert_eq!(&bytes[4..6], &[20, 0]);
        assert_eq!(&bytes[6..8], &[0x00, 0x08]);
        assert_eq!(&bytes[8..14], &[0; 6]);
        assert_eq!(&bytes[14..18], &[0x26, 0x39, 0xF4, 0xCB]);
        assert_eq!(&bytes[18..22], &[9, 0, 0, 0]);
        assert_eq!(&bytes[22..26], &[9, 0, 0, 0]);
        assert_eq!(&bytes[26..28], &[5, 0]);
        assert_eq!(&bytes[28..30], &[0, 0]);
        assert_eq!(&bytes[30..], b"a.txt");
    }

    #[test]
    fn test_central_header_roundtrip() {
        let header = CentralDirectoryHeader {
            crc32: 7,
            size: 1234,
            lfh_offset: 99,
            file_name: "ünï.png".as_bytes(),
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf);
        assert_eq!(buf.len(), header.encoded_len());

        let mut cursor = Cursor::new(buf.as_slice());
        let entry = ZipFileEntry::read_cdfh(&mut cursor).unwrap();
        assert_eq!(entry.file_name, "ünï.png");
        assert_eq!(entry.flags, FLAG_UTF8);
        assert_eq!(entry.compression_method, CompressionMethod::Stored);
        assert_eq!(entry.crc32, 7);
        assert_eq!(entry.compressed_size, 1234);
        assert_eq!(entry.uncompressed_size, 1234);
        assert_eq!(entry.lfh_offset, 99);
        assert_eq!(cursor.position() as usize, header.encoded_len());
    }

    #[test]
    fn test_eocd_roundtrip() {
        let eocd = EndOfCentralDirectory::new(3, 150, 4096);
        let mut buf = Vec::new();
        eocd.write_to(&mut buf);
        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(EndOfCentralDirectory::from_bytes(&buf).unwrap(), eocd);
    }
}
