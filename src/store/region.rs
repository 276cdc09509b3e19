//! Index region files.
//!
//! The domain range index and both private index regions are stored as flat
//! arrays of little-endian `i64` values followed by a trailer:
//!
//! ```text
//! [value 1: i64]
//! ...
//! [value N: i64]
//! [count: u64]
//! [crc32 of values: u32]
//! [reserved: u32]
//! [magic: u64]
//! ```

use crate::error::{Error, Result};
use crate::store::header::read_array;
use crate::store::{REGION_MAGIC, REGION_TRAILER_SIZE};
use bytes::{Buf, BufMut, BytesMut};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Write `values` as a region file, replacing any existing file.
pub fn write_region(path: &Path, values: &[i64], sync: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut payload = BytesMut::with_capacity(values.len() * 8);
    for value in values {
        payload.put_i64_le(*value);
    }
    let checksum = crc32fast::hash(&payload);

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&payload)?;
    writer.write_all(&(values.len() as u64).to_le_bytes())?;
    writer.write_all(&checksum.to_le_bytes())?;
    writer.write_all(&[0u8; 4])?;
    writer.write_all(&REGION_MAGIC.to_le_bytes())?;
    writer.flush()?;

    if sync {
        writer.get_ref().sync_all()?;
    }
    Ok(())
}

/// Read a region file written by [`write_region`].
pub fn read_region(path: &Path) -> Result<Vec<i64>> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    if data.len() < REGION_TRAILER_SIZE {
        return Err(Error::corruption(format!("region file {:?} too small", path)));
    }

    let trailer = &data[data.len() - REGION_TRAILER_SIZE..];
    let count = u64::from_le_bytes(read_array(&trailer[0..8])) as usize;
    let stored_checksum = u32::from_le_bytes(read_array(&trailer[8..12]));
    let magic = u64::from_le_bytes(read_array(&trailer[16..24]));

    if magic != REGION_MAGIC {
        return Err(Error::corruption(format!(
            "Invalid region magic number in {:?}: got {:#x}",
            path, magic
        )));
    }

    let payload = &data[..data.len() - REGION_TRAILER_SIZE];
    if count.checked_mul(8) != Some(payload.len()) {
        return Err(Error::corruption(format!(
            "region {:?} declares {} values but holds {} bytes",
            path,
            count,
            payload.len()
        )));
    }

    let computed_checksum = crc32fast::hash(payload);
    if computed_checksum != stored_checksum {
        return Err(Error::ChecksumMismatch { expected: stored_checksum, actual: computed_checksum });
    }

    let mut cursor = payload;
    let mut values = Vec::with_capacity(count);
    while cursor.has_remaining() {
        values.push(cursor.get_i64_le());
    }
    Ok(values)
}
