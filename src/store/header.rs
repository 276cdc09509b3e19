//! Table file header.
//!
//! The header is a fixed-size (32 bytes) structure at the start of a table
//! file describing the row layout that follows.

use crate::error::{Error, Result};
use crate::store::{FORMAT_VERSION, HEADER_SIZE, TABLE_MAGIC};
use std::io::{Read, Write};

/// Header of a record table file.
///
/// Format:
/// ```text
/// [magic: 8 bytes]
/// [version: 4 bytes]
/// [row_width: 4 bytes]
/// [num_columns: 4 bytes]
/// [fingerprint: 4 bytes]
/// [padding: 8 bytes]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    /// Encoded width of one row in bytes
    pub row_width: u32,
    /// Number of flat columns including DOMAIN_ID
    pub num_columns: u32,
    /// CRC32 fingerprint of the flat layout
    pub fingerprint: u32,
}

impl TableHeader {
    /// Create a new TableHeader
    pub fn new(row_width: u32, num_columns: u32, fingerprint: u32) -> Self {
        Self { row_width, num_columns, fingerprint }
    }

    /// Encode the header to bytes (32 bytes)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&TABLE_MAGIC.to_le_bytes());
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.row_width.to_le_bytes());
        buf.extend_from_slice(&self.num_columns.to_le_bytes());
        buf.extend_from_slice(&self.fingerprint.to_le_bytes());

        // Padding (8 bytes) - reserved for future use
        buf.extend_from_slice(&[0u8; 8]);

        debug_assert_eq!(buf.len(), HEADER_SIZE);
        buf
    }

    /// Decode a header from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != HEADER_SIZE {
            return Err(Error::corruption(format!(
                "Header size mismatch: expected {}, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        let magic = u64::from_le_bytes(read_array(&data[0..8]));
        if magic != TABLE_MAGIC {
            return Err(Error::corruption(format!(
                "Invalid table magic number: expected {:#x}, got {:#x}",
                TABLE_MAGIC, magic
            )));
        }

        let version = u32::from_le_bytes(read_array(&data[8..12]));
        if version != FORMAT_VERSION {
            return Err(Error::corruption(format!(
                "Unsupported table format version {}",
                version
            )));
        }

        let row_width = u32::from_le_bytes(read_array(&data[12..16]));
        let num_columns = u32::from_le_bytes(read_array(&data[16..20]));
        let fingerprint = u32::from_le_bytes(read_array(&data[20..24]));

        if row_width == 0 {
            return Err(Error::corruption("Table header declares zero row width"));
        }

        Ok(Self { row_width, num_columns, fingerprint })
    }

    /// Write the header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Read the header from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}

/// Copy a slice of known length into an array.
pub(crate) fn read_array<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_encode_decode() {
        let header = TableHeader::new(40, 5, 0xdeadbeef);
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);

        let decoded = TableHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_invalid_magic() {
        let mut data = TableHeader::new(8, 1, 0).encode();
        data[0..8].copy_from_slice(&0x1234567890abcdefu64.to_le_bytes());

        let result = TableHeader::decode(&data);
        assert!(matches!(result.unwrap_err(), Error::Corruption(_)));
    }

    #[test]
    fn test_header_invalid_version() {
        let mut data = TableHeader::new(8, 1, 0).encode();
        data[8..12].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(TableHeader::decode(&data), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_header_write_read() {
        let header = TableHeader::new(16, 2, 7);

        let mut buffer = Vec::new();
        header.write_to(&mut buffer).unwrap();

        let mut cursor = Cursor::new(buffer);
        assert_eq!(TableHeader::read_from(&mut cursor).unwrap(), header);
    }
}
