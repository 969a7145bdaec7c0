//! ZIP archive assembly and inspection.
//!
//! This module builds classic ZIP32 archives by hand, without a compression
//! library, and can read them back for verification.
//!
//! ## Architecture
//!
//! - [`crc32`]: table-driven checksum stored with every entry
//! - [`structures`]: binary layouts of the three ZIP record kinds
//! - [`writer`]: append-only assembler producing the archive bytes
//! - [`reader`]: in-memory parser for listing and verifying archives
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Limitations
//!
//! - Entries are always STORED; media payloads are already compressed
//! - No ZIP64: fewer than 65535 entries, sizes and offsets below 4 GiB
//! - No encryption or multi-disk archives

pub mod crc32;
mod reader;
mod structures;
mod writer;

pub use reader::ZipReader;
pub use structures::*;
pub use writer::{MAX_ENTRIES, ZipArchiveWriter};
