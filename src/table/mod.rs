//! Result tables.
//!
//! A [`ResultTable`] ties one [`TableDef`] to its files under a root
//! directory and drives the table lifecycle:
//!
//! 1. `write` appends one domain batch per call, assigning domain ids
//!    1, 2, 3, ... and recording the batch's entity ids.
//! 2. `finalize` builds and persists the domain range index and the
//!    deduplicated private index, sealing the table.
//! 3. `search`, `read` and `read_domain` serve lookups from then on.
//!
//! Reopening an unsealed table read-write resumes writing: the domain
//! counter continues from the last stored domain and the pending index
//! batches are rebuilt from the stored rows.

pub mod def;
pub mod meta;
pub mod validator;

pub use def::TableDef;
pub use meta::TableMeta;
pub use validator::{Identity, RowValidator};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::index::{DomainRangeIndex, PrivateIndex, PrivateIndexBuilder};
use crate::schema::{FlatSchema, RawRecord, Row, Value};
use crate::search::{self, Filter};
use crate::store::{RecordStore, TableFiles};
use crate::DomainId;
use std::path::Path;
use std::sync::Arc;

/// One result table: record store plus its indexes.
#[derive(Debug)]
pub struct ResultTable {
    def: TableDef,
    files: TableFiles,
    options: Options,
    store: RecordStore,
    domain_count: u64,
    builder: PrivateIndexBuilder,
    domain_index: Option<DomainRangeIndex>,
    private_index: Option<PrivateIndex>,
}

impl ResultTable {
    /// Open (or create) the table described by `def` under `root`.
    pub fn open<P: AsRef<Path>>(root: P, def: TableDef, options: &Options) -> Result<Self> {
        options.validate()?;

        let files = TableFiles::new(root.as_ref(), def.group(), def.table_id());
        let schema = Arc::clone(def.schema());
        let store = RecordStore::open(&files.data, schema.columns(), schema.fingerprint(), options)?;

        let meta = TableMeta::from_def(&def);
        if files.schema.exists() {
            TableMeta::load(&files.schema)?.check_compatible(&meta)?;
        } else if !options.is_read_only() {
            meta.save(&files.schema)?;
        }

        let mut table = Self {
            builder: PrivateIndexBuilder::new(store.num_rows()),
            def,
            files,
            options: options.clone(),
            store,
            domain_count: 0,
            domain_index: None,
            private_index: None,
        };

        if table.files.is_sealed() {
            table.load_indexes()?;
        } else if table.store.num_rows() > 0 {
            table.recover_batches()?;
        }

        log::info!(
            "Opened table {} ({} rows, {} domains, sealed: {})",
            table.def.path(),
            table.store.num_rows(),
            table.domain_count,
            table.is_sealed()
        );
        Ok(table)
    }

    fn load_indexes(&mut self) -> Result<()> {
        let domain_index = DomainRangeIndex::load(&self.files.domain_index)?;
        let private_index = PrivateIndex::load(
            &self.files.identity,
            &self.files.block_data,
            self.options.block_cache_entries,
        )?;

        if domain_index.total_rows() != self.store.num_rows() {
            return Err(Error::corruption(format!(
                "{}: domain index covers {} rows, table holds {}",
                self.def.path(),
                domain_index.total_rows(),
                self.store.num_rows()
            )));
        }
        if private_index.num_batches() != domain_index.len() {
            return Err(Error::corruption(format!(
                "{}: private index has {} batches for {} domains",
                self.def.path(),
                private_index.num_batches(),
                domain_index.len()
            )));
        }

        self.domain_count = domain_index.len() as u64;
        self.domain_index = Some(domain_index);
        self.private_index = Some(private_index);
        Ok(())
    }

    fn recover_batches(&mut self) -> Result<()> {
        let schema = Arc::clone(self.def.schema());
        let domains = int_column(self.store.read_column(schema.domain_column())?, "DOMAIN_ID")?;
        let ranges = DomainRangeIndex::build(&domains)?;
        self.domain_count = ranges.len() as u64;

        if self.store.is_read_only() {
            return Ok(());
        }

        let ids = int_column(self.store.read_column(schema.index_column())?, "entity id")?;
        self.builder = PrivateIndexBuilder::new(0);
        for range in ranges.iter() {
            self.builder.record_batch(&ids[range.start as usize..range.end() as usize]);
        }

        log::warn!(
            "Table {} was not finalized, recovered {} pending batches",
            self.def.path(),
            self.builder.num_batches()
        );
        Ok(())
    }

    /// Append one domain batch.
    ///
    /// Returns the domain id assigned to the batch, or `None` for an empty
    /// batch, which is ignored and consumes no id.
    pub fn write(&mut self, records: &[RawRecord]) -> Result<Option<DomainId>> {
        if self.store.is_read_only() {
            return Err(Error::ReadOnly(self.def.path()));
        }
        if self.is_sealed() {
            return Err(Error::invalid_state(format!(
                "{} is finalized and no longer accepts writes",
                self.def.path()
            )));
        }
        if records.is_empty() {
            return Ok(None);
        }

        let domain = self.domain_count + 1;
        let schema = Arc::clone(self.def.schema());
        let index_column = schema.index_column();

        let mut rows = Vec::with_capacity(records.len());
        let mut ids = Vec::with_capacity(records.len());
        for raw in records {
            let row = schema.extract(raw)?;
            let arity = row.len();
            let mut row = self.def.validator().validate(row);
            if row.len() != arity {
                return Err(Error::invalid_argument(format!(
                    "validator changed row arity from {} to {}",
                    arity,
                    row.len()
                )));
            }

            let id = row[index_column].as_int().ok_or_else(|| {
                Error::invalid_argument(format!("entity id {} is not an integer", row[index_column]))
            })?;
            ids.push(id);

            row.push(Value::Int(domain as i64));
            rows.push(row);
        }

        self.store.append(&rows)?;
        self.builder.record_batch(&ids);
        self.domain_count = domain;

        log::debug!("{}: wrote domain {} with {} rows", self.def.path(), domain, rows.len());
        Ok(Some(domain))
    }

    /// Build and persist both indexes, sealing the table.
    ///
    /// Finalizing a sealed table is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if self.is_sealed() {
            return Ok(());
        }
        if self.store.is_read_only() {
            return Err(Error::ReadOnly(self.def.path()));
        }

        self.store.sync()?;
        let domains = int_column(
            self.store.read_column(self.def.schema().domain_column())?,
            "DOMAIN_ID",
        )?;
        let domain_index = DomainRangeIndex::build(&domains)?;

        if domain_index.len() as u64 != self.domain_count
            || self.builder.num_batches() as u64 != self.domain_count
        {
            return Err(Error::integrity(format!(
                "{}: {} domains written, {} stored, {} batches indexed",
                self.def.path(),
                self.domain_count,
                domain_index.len(),
                self.builder.num_batches()
            )));
        }

        let finished = self.builder.finish();
        for (entry, range) in finished.identity.iter().zip(domain_index.iter()) {
            if entry.offset != range.start {
                return Err(Error::integrity(format!(
                    "{}: batch of domain {} starts at {}, stored at {}",
                    self.def.path(),
                    range.domain_id,
                    entry.offset,
                    range.start
                )));
            }
        }

        let sync = self.options.sync_on_write;
        domain_index.write(&self.files.domain_index, sync)?;
        finished.write(&self.files.identity, &self.files.block_data, sync)?;

        log::info!(
            "Finalized {}: {} domains, {} rows, {} distinct index blocks",
            self.def.path(),
            domain_index.len(),
            self.store.num_rows(),
            finished.stored_blocks
        );

        self.private_index =
            Some(PrivateIndex::from_finished(finished, self.options.block_cache_entries));
        self.domain_index = Some(domain_index);
        Ok(())
    }

    /// Read rows by offset, in the order requested.
    pub fn read(&mut self, offsets: &[u64]) -> Result<Vec<Row>> {
        self.store.read_by_offsets(offsets)
    }

    /// Read every row of one domain. Unknown domains yield no rows.
    pub fn read_domain(&mut self, domain: DomainId) -> Result<Vec<Row>> {
        let range = match self.sealed_domain_index()?.get(domain) {
            Some(range) => *range,
            None => return Ok(Vec::new()),
        };
        self.store.read_range(range.start, range.length)
    }

    /// Domain range index; `None` until finalized.
    pub fn domain_ranges(&self) -> Option<&DomainRangeIndex> {
        self.domain_index.as_ref()
    }

    /// Rows of `ids` within `domains`, optionally filtered, ascending by
    /// row offset.
    pub fn search(
        &mut self,
        domains: &[DomainId],
        ids: &[i64],
        filter: Option<&Filter>,
    ) -> Result<Vec<Row>> {
        let path = self.def.path();
        let index = self.private_index.as_mut().ok_or_else(|| not_finalized(&path))?;
        search::search(&mut self.store, index, self.def.schema(), domains, ids, filter)
    }

    /// Offsets a search would read, ascending and deduplicated.
    pub fn search_offsets(&mut self, domains: &[DomainId], ids: &[i64]) -> Result<Vec<u64>> {
        let path = self.def.path();
        let index = self.private_index.as_mut().ok_or_else(|| not_finalized(&path))?;
        search::resolve_offsets(index, domains, ids)
    }

    fn sealed_domain_index(&self) -> Result<&DomainRangeIndex> {
        self.domain_index.as_ref().ok_or_else(|| not_finalized(&self.def.path()))
    }

    /// Table definition.
    pub fn def(&self) -> &TableDef {
        &self.def
    }

    /// Flat layout.
    pub fn schema(&self) -> &FlatSchema {
        self.def.schema()
    }

    /// `<group>/<table_id>`.
    pub fn path(&self) -> String {
        self.def.path()
    }

    /// Files of this table.
    pub fn files(&self) -> &TableFiles {
        &self.files
    }

    /// Number of stored rows.
    pub fn num_rows(&self) -> u64 {
        self.store.num_rows()
    }

    /// Number of domains written.
    pub fn domain_count(&self) -> u64 {
        self.domain_count
    }

    /// Batches waiting for finalize.
    pub fn pending_batches(&self) -> usize {
        self.builder.num_batches()
    }

    /// True once finalized.
    pub fn is_sealed(&self) -> bool {
        self.private_index.is_some()
    }

    /// Sync and close the table.
    pub fn close(self) -> Result<()> {
        let path = self.def.path();
        if !self.builder.is_empty() {
            log::warn!(
                "Closing {} with {} batches not finalized",
                path,
                self.builder.num_batches()
            );
        }
        self.store.close()?;
        log::info!("Closed table {}", path);
        Ok(())
    }
}

fn not_finalized(path: &str) -> Error {
    Error::invalid_state(format!("{} has not been finalized", path))
}

fn int_column(values: Vec<Value>, what: &str) -> Result<Vec<i64>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.as_int().ok_or_else(|| {
                Error::corruption(format!("{} at row {} is not an integer: {}", what, row, value))
            })
        })
        .collect()
}
