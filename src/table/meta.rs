//! Flat layout sidecar, `<table_id>.schema.json`.

use crate::error::{Error, Result};
use crate::schema::Column;
use crate::store::FORMAT_VERSION;
use crate::table::TableDef;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Self-describing layout stored next to the table file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// `<group>/<table_id>`
    pub path: String,
    /// Results type label
    pub results_type: String,
    /// On-disk format version
    pub format_version: u32,
    /// Flat columns, `DOMAIN_ID` last
    pub columns: Vec<Column>,
    /// Position of the entity id column
    pub index_column: usize,
    /// Layout fingerprint
    pub fingerprint: u32,
}

impl TableMeta {
    /// Describe a table definition.
    pub fn from_def(def: &TableDef) -> Self {
        let schema = def.schema();
        Self {
            path: def.path(),
            results_type: def.results_type().to_string(),
            format_version: FORMAT_VERSION,
            columns: schema.columns().to_vec(),
            index_column: schema.index_column(),
            fingerprint: schema.fingerprint(),
        }
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a sidecar.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::corruption(format!("Failed to parse {:?}: {}", path, e)))
    }

    /// Fail unless `other` describes the same stored layout.
    pub fn check_compatible(&self, other: &TableMeta) -> Result<()> {
        if self.fingerprint != other.fingerprint
            || self.columns != other.columns
            || self.index_column != other.index_column
        {
            return Err(Error::schema(format!(
                "{} was created with a different layout ({} columns, fingerprint {:#x})",
                self.path,
                self.columns.len(),
                self.fingerprint
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, ScalarType, Schema};
    use tempfile::TempDir;

    fn def(ty: ScalarType) -> TableDef {
        let schema = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::scalar("X", ty),
        ]);
        TableDef::new("/RESULT/NODAL", "DISP", &schema).unwrap().with_results_type("DISPLACEMENTS")
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("RESULT/NODAL/DISP.schema.json");

        let meta = TableMeta::from_def(&def(ScalarType::Float64));
        meta.save(&path).unwrap();

        let loaded = TableMeta::load(&path).unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(loaded.columns.last().unwrap().name, "DOMAIN_ID");
        loaded.check_compatible(&meta).unwrap();
    }

    #[test]
    fn test_incompatible_layout() {
        let a = TableMeta::from_def(&def(ScalarType::Float64));
        let b = TableMeta::from_def(&def(ScalarType::Float32));
        assert!(matches!(a.check_compatible(&b), Err(Error::Schema(_))));
    }

    #[test]
    fn test_garbage_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.schema.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(TableMeta::load(&path), Err(Error::Corruption(_))));
    }
}
