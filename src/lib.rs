//! # resultstore - Append-Only Storage for Analysis Results
//!
//! resultstore persists large volumes of fixed-schema result records
//! (per-entity numeric rows tagged with a domain id, one domain per load
//! case or subcase) and looks up subsets of rows by (domain, entity id)
//! without scanning the table.
//!
//! ## Architecture
//!
//! - **Schema Flattener**: turns a nested declared schema into a flat
//!   column layout plus an extraction map from raw input records
//! - **Record Store**: append-only file of fixed-width rows with random
//!   reads by row offset
//! - **Domain Range Index**: contiguous row range of every domain
//! - **Private Index**: per-batch inverted index from entity id to row
//!   positions, with identical blocks stored once
//! - **Search**: resolves domains × ids to rows, with an optional
//!   column-value filter
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use resultstore::schema::{FieldDef, ScalarType, Schema, Value};
//! use resultstore::{Database, Filter, Options, TableDef};
//!
//! # fn main() -> Result<(), resultstore::Error> {
//! let schema = Schema::new(vec![
//!     FieldDef::scalar("ID", ScalarType::Int64),
//!     FieldDef::scalar("STATUS", ScalarType::Text(8)),
//! ]);
//! let def = TableDef::new("/RESULT/NODAL", "STATUS", &schema)?;
//!
//! let mut db = Database::open("./results", Options::default())?;
//! let table = db.table(def)?;
//!
//! // One call per domain; raw position 1 is reserved and skipped.
//! table.write(&[vec![Value::Int(10), Value::Int(0), Value::from("OK")]])?;
//! table.finalize()?;
//!
//! let filter = Filter::new().accept("STATUS", ["OK"]);
//! let rows = table.search(&[1], &[10], Some(&filter))?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod index;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;

// Re-exports
pub use config::{AccessMode, Options};
pub use error::{Error, Result};
pub use schema::{FieldDef, ScalarType, Schema, Value};
pub use search::Filter;
pub use table::{Identity, ResultTable, RowValidator, TableDef};

use table::TableMeta;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Domain identifier, assigned 1, 2, 3, ... per written batch.
pub type DomainId = u64;

/// A root directory holding any number of result tables.
///
/// Each table path (`<group>/<table_id>`) is opened at most once; asking
/// for it again returns the same instance.
#[derive(Debug)]
pub struct Database {
    /// Root directory
    root: PathBuf,

    /// Options used for every table
    options: Options,

    /// Open tables by path
    tables: BTreeMap<String, ResultTable>,
}

impl Database {
    /// Opens a database rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The options are invalid
    /// - The root does not exist and may not be created
    /// - The root exists and `error_if_exists` is set
    pub fn open<P: AsRef<Path>>(root: P, options: Options) -> Result<Self> {
        options.validate()?;
        let root = root.as_ref().to_path_buf();

        if root.exists() {
            if options.error_if_exists && !options.is_read_only() {
                return Err(Error::AlreadyExists(format!("Database already exists: {:?}", root)));
            }
        } else {
            if options.is_read_only() || !options.create_if_missing {
                return Err(Error::not_found(format!("Database does not exist: {:?}", root)));
            }
            std::fs::create_dir_all(&root)?;
        }

        log::info!("Opened database at {:?} ({:?})", root, options.access_mode);

        // error_if_exists applies to the root, not to the tables inside it
        let options = options.error_if_exists(false);
        Ok(Self { root, options, tables: BTreeMap::new() })
    }

    /// Open or return the table described by `def`.
    ///
    /// A table that is already open must have the same layout, entity id
    /// column and results type. Its validator stays the one it was opened
    /// with; the validator of a later `def` is ignored.
    pub fn table(&mut self, def: TableDef) -> Result<&mut ResultTable> {
        match self.tables.entry(def.path()) {
            Entry::Occupied(entry) => {
                let table = entry.into_mut();
                TableMeta::from_def(table.def()).check_compatible(&TableMeta::from_def(&def))?;
                if table.def().results_type() != def.results_type() {
                    return Err(Error::schema(format!(
                        "{} is already open as '{}', not '{}'",
                        table.path(),
                        table.def().results_type(),
                        def.results_type()
                    )));
                }
                Ok(table)
            }
            Entry::Vacant(entry) => {
                let table = ResultTable::open(&self.root, def, &self.options)?;
                Ok(entry.insert(table))
            }
        }
    }

    /// An open table by path.
    pub fn get(&mut self, path: &str) -> Option<&mut ResultTable> {
        self.tables.get_mut(path)
    }

    /// Paths of all open tables, sorted.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Finalize every open table that is not sealed yet.
    pub fn finalize(&mut self) -> Result<()> {
        for table in self.tables.values_mut() {
            table.finalize()?;
        }
        log::info!("Finalized {} tables", self.tables.len());
        Ok(())
    }

    /// Root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Options used for tables.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Close every table.
    pub fn close(self) -> Result<()> {
        for (_, table) in self.tables {
            table.close()?;
        }
        log::info!("Database closed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn def(table_id: &str) -> TableDef {
        let schema = Schema::new(vec![FieldDef::scalar("ID", ScalarType::Int64)]);
        TableDef::new("/RESULT", table_id, &schema).unwrap()
    }

    #[test]
    fn test_open_creates_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("db");
        let db = Database::open(&root, Options::default()).unwrap();
        assert!(root.is_dir());
        assert_eq!(db.path(), root);
    }

    #[test]
    fn test_open_missing_read_only() {
        let dir = TempDir::new().unwrap();
        let result = Database::open(dir.path().join("missing"), Options::read_only());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_error_if_exists() {
        let dir = TempDir::new().unwrap();
        let result = Database::open(dir.path(), Options::default().error_if_exists(true));
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_one_instance_per_path() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path(), Options::default()).unwrap();

        db.table(def("A")).unwrap().write(&[vec![Value::Int(1)]]).unwrap();
        assert_eq!(db.table(def("A")).unwrap().num_rows(), 1);
        db.table(def("B")).unwrap();

        let paths: Vec<&str> = db.tables().collect();
        assert_eq!(paths, vec!["/RESULT/A", "/RESULT/B"]);
        assert!(db.get("/RESULT/C").is_none());
    }

    #[test]
    fn test_same_path_different_layout() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path(), Options::default()).unwrap();
        db.table(def("A")).unwrap();

        let other = Schema::new(vec![FieldDef::scalar("ID", ScalarType::Int32)]);
        let other = TableDef::new("/RESULT", "A", &other).unwrap();
        assert!(matches!(db.table(other), Err(Error::Schema(_))));
    }

    #[test]
    fn test_same_path_different_index_column() {
        let dir = TempDir::new().unwrap();
        let schema = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::scalar("GRID", ScalarType::Int64),
        ]);
        let mut db = Database::open(dir.path(), Options::default()).unwrap();
        db.table(TableDef::new("/RESULT", "A", &schema).unwrap()).unwrap();

        let by_grid = schema.clone().with_index_column("GRID");
        let other = TableDef::new("/RESULT", "A", &by_grid).unwrap();
        assert!(matches!(db.table(other), Err(Error::Schema(_))));

        let relabeled = TableDef::new("/RESULT", "A", &schema).unwrap().with_results_type("STRESS");
        assert!(matches!(db.table(relabeled), Err(Error::Schema(_))));

        assert!(db.table(TableDef::new("/RESULT", "A", &schema).unwrap()).is_ok());
    }

    #[test]
    fn test_finalize_all() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path(), Options::default()).unwrap();
        db.table(def("A")).unwrap().write(&[vec![Value::Int(1)]]).unwrap();
        db.table(def("B")).unwrap();

        db.finalize().unwrap();
        assert!(db.get("/RESULT/A").unwrap().is_sealed());
        assert!(db.get("/RESULT/B").unwrap().is_sealed());
        db.close().unwrap();
    }
}
