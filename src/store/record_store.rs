//! Append-only record store.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::schema::{Column, Row, Value};
use crate::store::codec::RowCodec;
use crate::store::header::TableHeader;
use crate::store::HEADER_SIZE;
use bytes::BytesMut;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only, randomly readable table of fixed-width rows.
///
/// Usage:
/// ```no_run
/// use resultstore::schema::{FieldDef, ScalarType, Schema, Value};
/// use resultstore::store::RecordStore;
/// use resultstore::Options;
///
/// let flat = Schema::new(vec![FieldDef::scalar("ID", ScalarType::Int64)]).flatten().unwrap();
/// let mut store =
///     RecordStore::open("table.tbl", flat.columns(), flat.fingerprint(), &Options::default())
///         .unwrap();
/// store.append(&[vec![Value::Int(10), Value::Int(1)]]).unwrap();
/// let rows = store.read_by_offsets(&[0]).unwrap();
/// ```
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    file: File,
    codec: RowCodec,
    num_rows: u64,
    read_only: bool,
    sync_on_write: bool,
    read_coalesce_rows: usize,
}

impl RecordStore {
    /// Open or create a table file.
    ///
    /// An existing file must carry a header matching `columns` and
    /// `fingerprint`, and a whole number of rows.
    pub fn open<P: AsRef<Path>>(
        path: P,
        columns: &[Column],
        fingerprint: u32,
        options: &Options,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let codec = RowCodec::new(columns);
        let read_only = options.is_read_only();

        let file = if path.exists() {
            if options.error_if_exists && !read_only {
                return Err(Error::AlreadyExists(format!("Table already exists: {:?}", path)));
            }
            let mut file = OpenOptions::new().read(true).write(!read_only).open(&path)?;
            let file_size = file.metadata()?.len();
            if file_size < HEADER_SIZE as u64 {
                return Err(Error::corruption(format!(
                    "table {:?} is {} bytes, shorter than its header",
                    path, file_size
                )));
            }
            let header = TableHeader::read_from(&mut file)?;
            if header.fingerprint != fingerprint
                || header.row_width as usize != codec.row_width()
                || header.num_columns as usize != codec.num_columns()
            {
                return Err(Error::schema(format!(
                    "table {:?} was written with a different layout (fingerprint {:#x}, expected {:#x})",
                    path, header.fingerprint, fingerprint
                )));
            }
            file
        } else {
            if read_only || !options.create_if_missing {
                return Err(Error::not_found(format!("Table file does not exist: {:?}", path)));
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file =
                OpenOptions::new().read(true).write(true).create_new(true).open(&path)?;
            let header =
                TableHeader::new(codec.row_width() as u32, codec.num_columns() as u32, fingerprint);
            header.write_to(&mut file)?;
            file.sync_all()?;
            file
        };

        let file_size = file.metadata()?.len();
        let body = file_size.saturating_sub(HEADER_SIZE as u64);
        let row_width = codec.row_width() as u64;
        if body % row_width != 0 {
            return Err(Error::corruption(format!(
                "table {:?} ends with a partial row ({} trailing bytes)",
                path,
                body % row_width
            )));
        }

        Ok(Self {
            path,
            file,
            codec,
            num_rows: body / row_width,
            read_only,
            sync_on_write: options.sync_on_write,
            read_coalesce_rows: options.read_coalesce_rows.max(1),
        })
    }

    /// Append rows in order. Each row must already carry its DOMAIN_ID.
    ///
    /// The data is written (and synced when `sync_on_write` is set) before
    /// this returns.
    pub fn append(&mut self, rows: &[Row]) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(format!("{:?}", self.path)));
        }
        if rows.is_empty() {
            return Ok(());
        }

        let mut buf = BytesMut::with_capacity(rows.len() * self.codec.row_width());
        for row in rows {
            self.codec.encode_into(row, &mut buf)?;
        }

        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&buf)?;
        if self.sync_on_write {
            self.file.sync_data()?;
        }

        self.num_rows += rows.len() as u64;
        Ok(())
    }

    /// Read rows by offset, returned in the order requested.
    ///
    /// Offsets are sorted internally and contiguous runs are fetched with a
    /// single read. Duplicates are allowed.
    pub fn read_by_offsets(&mut self, offsets: &[u64]) -> Result<Vec<Row>> {
        if let Some(bad) = offsets.iter().find(|&&offset| offset >= self.num_rows) {
            return Err(Error::invalid_argument(format!(
                "row offset {} out of range (table has {} rows)",
                bad, self.num_rows
            )));
        }

        let mut order: Vec<usize> = (0..offsets.len()).collect();
        order.sort_by_key(|&i| offsets[i]);

        let mut rows: Vec<Row> = vec![Vec::new(); offsets.len()];
        let width = self.codec.row_width();
        let max_run = self.read_coalesce_rows as u64;

        let mut i = 0;
        while i < order.len() {
            let start = offsets[order[i]];
            let mut end = start + 1;
            let mut j = i + 1;
            while j < order.len() {
                let next = offsets[order[j]];
                if next < end || (next == end && end - start < max_run) {
                    end = next + 1;
                    j += 1;
                } else {
                    break;
                }
            }

            let data = self.read_raw(start, end - start)?;
            for &slot in &order[i..j] {
                let at = (offsets[slot] - start) as usize * width;
                rows[slot] = self.codec.decode(&data[at..at + width])?;
            }
            i = j;
        }

        Ok(rows)
    }

    /// Read `len` consecutive rows starting at `start`.
    pub fn read_range(&mut self, start: u64, len: u64) -> Result<Vec<Row>> {
        if start.checked_add(len).map_or(true, |end| end > self.num_rows) {
            return Err(Error::invalid_argument(format!(
                "row range {}+{} out of range (table has {} rows)",
                start, len, self.num_rows
            )));
        }
        let width = self.codec.row_width();
        let data = self.read_raw(start, len)?;
        data.chunks_exact(width).map(|chunk| self.codec.decode(chunk)).collect()
    }

    /// Scan one column of every row.
    pub fn read_column(&mut self, index: usize) -> Result<Vec<Value>> {
        let width = self.codec.row_width();
        let chunk_rows = self.read_coalesce_rows as u64;
        let mut values = Vec::with_capacity(self.num_rows as usize);

        let mut start = 0;
        while start < self.num_rows {
            let count = chunk_rows.min(self.num_rows - start);
            let data = self.read_raw(start, count)?;
            for row in data.chunks_exact(width) {
                values.push(self.codec.decode_column(row, index)?);
            }
            start += count;
        }
        Ok(values)
    }

    fn read_raw(&mut self, start: u64, count: u64) -> Result<Vec<u8>> {
        let width = self.codec.row_width() as u64;
        self.file.seek(SeekFrom::Start(HEADER_SIZE as u64 + start * width))?;
        let mut buffer = vec![0u8; (count * width) as usize];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Number of rows stored.
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Encoded row width.
    pub fn row_width(&self) -> usize {
        self.codec.row_width()
    }

    /// Path of the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if appends are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Sync all written rows to disk.
    pub fn sync(&mut self) -> Result<()> {
        if !self.read_only {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Close the store, syncing pending data.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;
    use tempfile::TempDir;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("ID".into(), ScalarType::Int64, 1),
            Column::new("V".into(), ScalarType::Float64, 1),
            Column::new("DOMAIN_ID".into(), ScalarType::Int64, 1),
        ]
    }

    fn row(id: i64, v: f64, domain: i64) -> Row {
        vec![Value::Int(id), Value::Float(v), Value::Int(domain)]
    }

    fn open(dir: &TempDir, options: &Options) -> Result<RecordStore> {
        RecordStore::open(dir.path().join("t.tbl"), &columns(), 7, options)
    }

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir, &Options::default()).unwrap();
        assert_eq!(store.num_rows(), 0);

        store.append(&[row(10, 1.0, 1), row(20, 2.0, 1)]).unwrap();
        store.append(&[row(10, 3.0, 2)]).unwrap();
        assert_eq!(store.num_rows(), 3);

        let rows = store.read_by_offsets(&[2, 0]).unwrap();
        assert_eq!(rows, vec![row(10, 3.0, 2), row(10, 1.0, 1)]);

        let rows = store.read_range(0, 3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], row(20, 2.0, 1));
    }

    #[test]
    fn test_read_by_offsets_preserves_request_order() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir, &Options::default().read_coalesce_rows(2)).unwrap();
        let rows: Vec<Row> = (0..10).map(|i| row(i, i as f64, 1)).collect();
        store.append(&rows).unwrap();

        let offsets = [7, 1, 2, 3, 9, 2, 0];
        let read = store.read_by_offsets(&offsets).unwrap();
        let ids: Vec<i64> = read.iter().map(|r| r[0].as_int().unwrap()).collect();
        assert_eq!(ids, vec![7, 1, 2, 3, 9, 2, 0]);
    }

    #[test]
    fn test_out_of_range_offset() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir, &Options::default()).unwrap();
        store.append(&[row(1, 0.0, 1)]).unwrap();

        assert!(matches!(store.read_by_offsets(&[1]), Err(Error::InvalidArgument(_))));
        assert!(store.read_range(0, 2).is_err());
    }

    #[test]
    fn test_read_column() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir, &Options::default().read_coalesce_rows(3)).unwrap();
        let rows: Vec<Row> = (0..8).map(|i| row(i, 0.0, 1 + i / 4)).collect();
        store.append(&rows).unwrap();

        let domains = store.read_column(2).unwrap();
        let domains: Vec<i64> = domains.iter().map(|v| v.as_int().unwrap()).collect();
        assert_eq!(domains, vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir, &Options::default()).unwrap();
            store.append(&[row(1, 0.5, 1), row(2, 1.5, 1)]).unwrap();
            store.close().unwrap();
        }

        let mut store = open(&dir, &Options::read_only()).unwrap();
        assert_eq!(store.num_rows(), 2);
        assert_eq!(store.read_by_offsets(&[1]).unwrap()[0], row(2, 1.5, 1));
    }

    #[test]
    fn test_read_only_rejects_append() {
        let dir = TempDir::new().unwrap();
        open(&dir, &Options::default()).unwrap();

        let mut store = open(&dir, &Options::read_only()).unwrap();
        let err = store.append(&[row(1, 0.0, 1)]).unwrap_err();
        assert!(matches!(err, Error::ReadOnly(_)));
    }

    #[test]
    fn test_read_only_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(open(&dir, &Options::read_only()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_fingerprint_mismatch() {
        let dir = TempDir::new().unwrap();
        open(&dir, &Options::default()).unwrap();

        let result = RecordStore::open(dir.path().join("t.tbl"), &columns(), 8, &Options::default());
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_partial_row_detected() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir, &Options::default()).unwrap();
            store.append(&[row(1, 0.0, 1)]).unwrap();
        }

        let mut file = OpenOptions::new().append(true).open(dir.path().join("t.tbl")).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        drop(file);

        assert!(matches!(open(&dir, &Options::default()), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_short_header_detected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.tbl"), [0u8; 5]).unwrap();

        assert!(matches!(open(&dir, &Options::default()), Err(Error::Corruption(_))));
        assert!(matches!(open(&dir, &Options::read_only()), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_error_if_exists() {
        let dir = TempDir::new().unwrap();
        open(&dir, &Options::default()).unwrap();
        let result = open(&dir, &Options::default().error_if_exists(true));
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }
}
