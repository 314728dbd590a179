//! Common file header shared by every annocache file type.

use std::io::{Read, Write};

use crate::error::Error;
use crate::format::binary_io::{BinaryRead, BinaryWrite};

/// File signature: 0x89 0x43 0x4C 0x41 0x0D 0x0A 0x1A 0x0A
pub const FILE_SIGNATURE: u64 = 727_905_341_820_126_089;

/// Size of the common header in bytes.
pub const COMMON_HEADER_SIZE: u64 = 12;

/// Fixed marker written after every major section for desync detection.
pub const GUARD_INT: u32 = 4_041_327_495;

/// The kinds of files written by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FileType {
    Reference = 1,
    TranscriptCache = 2,
    SupplementaryAnnotation = 3,
    SupplementaryIndex = 4,
}

impl FileType {
    /// Current on-disk format version for this file type.
    #[must_use]
    pub fn format_version(self) -> u16 {
        match self {
            Self::Reference => 2,
            Self::TranscriptCache => 1,
            Self::SupplementaryAnnotation | Self::SupplementaryIndex => 1,
        }
    }
}

/// Writes the common header (signature + file type + format version).
pub fn write_common_header<W: Write>(writer: &mut W, file_type: FileType) -> Result<(), Error> {
    writer.write_u64(FILE_SIGNATURE)?;
    writer.write_u16(file_type as u16)?;
    writer.write_u16(file_type.format_version())?;
    Ok(())
}

/// Reads the common header and verifies that both the file type and its
/// format version match what the caller expects.
pub fn read_common_header<R: Read>(reader: &mut R, expected: FileType) -> Result<(), Error> {
    let signature = reader.read_u64()?;
    if signature != FILE_SIGNATURE {
        return Err(Error::Format(format!(
            "invalid file signature: expected {FILE_SIGNATURE}, got {signature}"
        )));
    }

    let file_type = reader.read_u16()?;
    if file_type != expected as u16 {
        return Err(Error::Format(format!(
            "unexpected file type: expected {}, got {file_type}",
            expected as u16
        )));
    }

    let format_version = reader.read_u16()?;
    if format_version != expected.format_version() {
        return Err(Error::Format(format!(
            "unexpected format version for {expected:?}: expected {}, got {format_version}",
            expected.format_version()
        )));
    }

    Ok(())
}

/// Writes the section guard.
pub fn write_guard<W: Write>(writer: &mut W) -> Result<(), Error> {
    writer.write_u32(GUARD_INT)
}

/// Reads the section guard; a mismatch means the stream has desynchronized.
pub fn check_guard<R: Read>(reader: &mut R, section: &str) -> Result<(), Error> {
    let observed = reader.read_u32()?;
    if observed != GUARD_INT {
        return Err(Error::Format(format!(
            "guard mismatch after {section}: expected {GUARD_INT}, observed {observed}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn signature_bytes() {
        let bytes = FILE_SIGNATURE.to_le_bytes();
        assert_eq!(bytes, [0x89, 0x43, 0x4C, 0x41, 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn header_is_twelve_bytes() {
        let mut buf = Vec::new();
        write_common_header(&mut buf, FileType::TranscriptCache).unwrap();
        assert_eq!(buf.len() as u64, COMMON_HEADER_SIZE);

        let mut cursor = Cursor::new(buf);
        read_common_header(&mut cursor, FileType::TranscriptCache).unwrap();
    }

    #[test]
    fn invalid_signature() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());

        let mut cursor = Cursor::new(buf);
        let err = read_common_header(&mut cursor, FileType::Reference).unwrap_err();
        assert!(err.to_string().contains("invalid file signature"));
    }

    #[test]
    fn wrong_file_type() {
        let mut buf = Vec::new();
        write_common_header(&mut buf, FileType::SupplementaryIndex).unwrap();
        let mut cursor = Cursor::new(buf);
        let err =
            read_common_header(&mut cursor, FileType::SupplementaryAnnotation).unwrap_err();
        assert!(err.to_string().contains("unexpected file type"));
    }

    #[test]
    fn guard_mismatch_is_format_error() {
        let mut cursor = Cursor::new(7u32.to_le_bytes().to_vec());
        let err = check_guard(&mut cursor, "genes").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("genes"));
    }

    #[test]
    fn guard_round_trip() {
        let mut buf = Vec::new();
        write_guard(&mut buf).unwrap();
        assert_eq!(buf, 4_041_327_495u32.to_le_bytes());
        check_guard(&mut Cursor::new(buf), "genes").unwrap();
    }
}
