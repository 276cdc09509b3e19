//! Record store and on-disk layout.
//!
//! Each table keeps four regions under the database root directory:
//!
//! ```text
//! <group>/<table_id>.tbl                          // header + fixed-width rows
//! <group>/<table_id>.schema.json                  // flat layout sidecar
//! INDEX/<group>/<table_id>.idx                    // (domain_id, start, length)*
//! PRIVATE/INDEX/<group>/<table_id>/IDENTITY       // (location, length, offset)*
//! PRIVATE/INDEX/<group>/<table_id>/DATA           // id, count, pos.., id, count, ..
//! ```
//!
//! ## Table File Format
//!
//! ```text
//! [Header: 32B]
//! [Row 0: row_width bytes]
//! [Row 1: row_width bytes]
//! ...
//! ```
//!
//! Rows are only ever appended; the row count is derived from the file size.

pub mod codec;
pub mod header;
pub mod record_store;
pub mod region;

pub use codec::RowCodec;
pub use header::TableHeader;
pub use record_store::RecordStore;

use std::path::{Path, PathBuf};

/// Table file header size in bytes (fixed)
pub const HEADER_SIZE: usize = 32;

/// Magic number for table files
pub const TABLE_MAGIC: u64 = 0x454c424154534552; // "RESTABLE" in little-endian

/// Current table file format version
pub const FORMAT_VERSION: u32 = 1;

/// Region file trailer size in bytes (fixed)
pub const REGION_TRAILER_SIZE: usize = 24;

/// Magic number for index region files
pub const REGION_MAGIC: u64 = 0x5845444e49534552; // "RESINDEX" in little-endian

/// Locations of every file belonging to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFiles {
    /// Record table file.
    pub data: PathBuf,
    /// Flat layout sidecar.
    pub schema: PathBuf,
    /// Domain range index region.
    pub domain_index: PathBuf,
    /// Private index identity region.
    pub identity: PathBuf,
    /// Private index block storage region.
    pub block_data: PathBuf,
}

impl TableFiles {
    /// Resolve the files of `<group>/<table_id>` under `root`.
    pub fn new(root: &Path, group: &str, table_id: &str) -> Self {
        let group_dir: PathBuf = group.split('/').filter(|part| !part.is_empty()).collect();
        let private_dir = root.join("PRIVATE").join("INDEX").join(&group_dir).join(table_id);

        Self {
            data: root.join(&group_dir).join(format!("{}.tbl", table_id)),
            schema: root.join(&group_dir).join(format!("{}.schema.json", table_id)),
            domain_index: root.join("INDEX").join(&group_dir).join(format!("{}.idx", table_id)),
            identity: private_dir.join("IDENTITY"),
            block_data: private_dir.join("DATA"),
        }
    }

    /// True once every index region has been written by a finalize.
    pub fn is_sealed(&self) -> bool {
        self.domain_index.exists() && self.identity.exists() && self.block_data.exists()
    }
}
