//! Table definitions.

use crate::error::{Error, Result};
use crate::schema::{FlatSchema, Schema};
use crate::table::validator::{Identity, RowValidator};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity, layout and validation hook of one result table.
///
/// The flat layout is computed once here and shared by every instance
/// opened from this definition.
#[derive(Clone)]
pub struct TableDef {
    group: String,
    table_id: String,
    results_type: String,
    schema: Arc<FlatSchema>,
    validator: Arc<dyn RowValidator>,
    len_id: Option<String>,
    pos_id: Option<String>,
    renames: HashMap<String, String>,
}

impl TableDef {
    /// Create a definition for `<group>/<table_id>`, flattening `schema`.
    pub fn new(group: impl Into<String>, table_id: impl Into<String>, schema: &Schema) -> Result<Self> {
        let group = group.into();
        let table_id = table_id.into();
        if table_id.is_empty() || table_id.contains('/') {
            return Err(Error::invalid_argument(format!("invalid table id '{}'", table_id)));
        }

        Ok(Self {
            group,
            table_id,
            results_type: String::new(),
            schema: Arc::new(schema.flatten()?),
            validator: Arc::new(Identity),
            len_id: None,
            pos_id: None,
            renames: HashMap::new(),
        })
    }

    /// Set the human readable results type, e.g. "DISPLACEMENTS".
    pub fn with_results_type(mut self, results_type: impl Into<String>) -> Self {
        self.results_type = results_type.into();
        self
    }

    /// Install a row validator.
    pub fn with_validator<V: RowValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Override the subtable length column name.
    pub fn with_len_id(mut self, name: impl Into<String>) -> Self {
        self.len_id = Some(name.into());
        self
    }

    /// Override the subtable position column name.
    pub fn with_pos_id(mut self, name: impl Into<String>) -> Self {
        self.pos_id = Some(name.into());
        self
    }

    /// Rename an identifier; applied to `len_id` and `pos_id` lookups.
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    /// Group path, e.g. "/RESULT/NODAL".
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Table id within the group.
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// Results type label.
    pub fn results_type(&self) -> &str {
        &self.results_type
    }

    /// Flat layout.
    pub fn schema(&self) -> &Arc<FlatSchema> {
        &self.schema
    }

    /// Row validator.
    pub fn validator(&self) -> &Arc<dyn RowValidator> {
        &self.validator
    }

    /// `<group>/<table_id>`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.group.trim_end_matches('/'), self.table_id)
    }

    /// Column holding the row count of this table in its parent.
    pub fn len_id(&self) -> String {
        self.renamed(self.len_id.clone().unwrap_or_else(|| self.default_id("LEN")))
    }

    /// Column holding the first row of this table in its parent.
    pub fn pos_id(&self) -> String {
        self.renamed(self.pos_id.clone().unwrap_or_else(|| self.default_id("POS")))
    }

    /// Check that this table's flat layout links to `subtable` through its
    /// length and position columns.
    pub fn check_subtable_link(&self, subtable: &TableDef) -> Result<()> {
        for column in [subtable.len_id(), subtable.pos_id()] {
            if self.schema.column_index(&column).is_none() {
                return Err(Error::integrity(format!(
                    "{} has no column '{}' linking subtable {}",
                    self.path(),
                    column,
                    subtable.path()
                )));
            }
        }
        Ok(())
    }

    fn default_id(&self, suffix: &str) -> String {
        format!("{}_{}", self.table_id.replace('_', ""), suffix)
    }

    fn renamed(&self, name: String) -> String {
        match self.renames.get(&name) {
            Some(to) => to.clone(),
            None => name,
        }
    }
}

impl fmt::Debug for TableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDef")
            .field("path", &self.path())
            .field("results_type", &self.results_type)
            .field("columns", &self.schema.num_columns())
            .finish_non_exhaustive()
    }
}
