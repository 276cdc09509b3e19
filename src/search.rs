//! Search over a finalized table.
//!
//! A search resolves every requested (domain, entity id) pair through the
//! private index to absolute record store offsets, reads those rows and
//! optionally post-filters them on column values.
//!
//! Results are ordered by ascending row offset, not by the order in which
//! domains or ids were requested. Unknown domains and ids, and rows
//! rejected by the filter, simply do not appear.

use crate::error::{Error, Result};
use crate::index::PrivateIndex;
use crate::schema::{FlatSchema, Row, Value};
use crate::store::RecordStore;
use crate::DomainId;
use std::collections::{BTreeMap, BTreeSet};

/// Accepted values per column.
///
/// A row passes when, for every column in the filter, its value matches one
/// of the accepted values.
///
/// ```
/// use resultstore::Filter;
///
/// let filter = Filter::new().accept("STATUS", ["OK"]).accept("LAYER", [1i64, 2]);
/// assert_eq!(filter.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    columns: BTreeMap<String, Vec<Value>>,
}

impl Filter {
    /// Create an empty filter, which accepts every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add accepted values for a column, builder style.
    pub fn accept<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.insert(column, values);
        self
    }

    /// Add accepted values for a column.
    pub fn insert<I, V>(&mut self, column: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.columns.entry(column.into()).or_default().extend(values.into_iter().map(Into::into));
    }

    /// Number of filtered columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if the filter has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate (column, accepted values).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Resolve column names against a layout.
    pub fn bind<'a>(&'a self, schema: &FlatSchema) -> Result<BoundFilter<'a>> {
        let checks = self
            .columns
            .iter()
            .map(|(name, accepted)| {
                schema
                    .column_index(name)
                    .map(|index| (index, accepted.as_slice()))
                    .ok_or_else(|| {
                        Error::invalid_argument(format!("filter column '{}' is not in the table", name))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundFilter { checks })
    }
}

/// A filter whose columns have been resolved to positions.
#[derive(Debug)]
pub struct BoundFilter<'a> {
    checks: Vec<(usize, &'a [Value])>,
}

impl BoundFilter<'_> {
    /// True if the row satisfies every column.
    pub fn matches(&self, row: &[Value]) -> bool {
        self.checks.iter().all(|(index, accepted)| {
            row.get(*index).is_some_and(|value| accepted.iter().any(|a| a.matches(value)))
        })
    }

    /// Keep the rows that match, preserving order.
    pub fn apply(&self, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

/// Resolve domains × ids to deduplicated absolute offsets, ascending.
pub fn resolve_offsets(
    index: &mut PrivateIndex,
    domains: &[DomainId],
    ids: &[i64],
) -> Result<Vec<u64>> {
    let mut offsets = BTreeSet::new();
    for &domain in domains {
        offsets.extend(index.lookup(domain, ids)?);
    }
    Ok(offsets.into_iter().collect())
}

/// Run a search against a store and its private index.
pub fn search(
    store: &mut RecordStore,
    index: &mut PrivateIndex,
    schema: &FlatSchema,
    domains: &[DomainId],
    ids: &[i64],
    filter: Option<&Filter>,
) -> Result<Vec<Row>> {
    let bound = filter.map(|f| f.bind(schema)).transpose()?;

    let offsets = resolve_offsets(index, domains, ids)?;
    let rows = store.read_by_offsets(&offsets)?;

    log::debug!(
        "search over {} domains and {} ids matched {} rows",
        domains.len(),
        ids.len(),
        rows.len()
    );

    Ok(match bound {
        Some(bound) => bound.apply(rows),
        None => rows,
    })
}
