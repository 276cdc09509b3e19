//! Domain range index.
//!
//! Maps every domain id to the contiguous row range it occupies in the
//! record store. Built once at finalize from the DOMAIN_ID column.

use crate::error::{Error, Result};
use crate::store::region::{read_region, write_region};
use crate::DomainId;
use std::path::Path;

/// Row range of one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainRange {
    /// Domain id (1-based)
    pub domain_id: DomainId,
    /// First row of the domain
    pub start: u64,
    /// Number of rows
    pub length: u64,
}

impl DomainRange {
    /// One past the last row of the domain.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// Ordered (domain_id, start, length) entries, ascending by domain id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainRangeIndex {
    ranges: Vec<DomainRange>,
}

impl DomainRangeIndex {
    /// Build from the DOMAIN_ID column by counting contiguous runs.
    ///
    /// Domain ids must appear as 1, 2, 3, ... with no gaps and no
    /// interleaving; anything else is an integrity error.
    pub fn build(domain_column: &[i64]) -> Result<Self> {
        let mut ranges: Vec<DomainRange> = Vec::new();

        for (row, &value) in domain_column.iter().enumerate() {
            if let Some(last) = ranges.last_mut() {
                if value == last.domain_id as i64 {
                    last.length += 1;
                    continue;
                }
            }

            let expected = ranges.len() as i64 + 1;
            if value != expected {
                return Err(Error::integrity(format!(
                    "domain id {} at row {} breaks the append order (expected {})",
                    value, row, expected
                )));
            }
            ranges.push(DomainRange { domain_id: value as DomainId, start: row as u64, length: 1 });
        }

        Ok(Self { ranges })
    }

    /// Range of one domain; `None` for unknown domains.
    pub fn get(&self, domain: DomainId) -> Option<&DomainRange> {
        let index = usize::try_from(domain).ok()?.checked_sub(1)?;
        self.ranges.get(index)
    }

    /// Number of domains.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True if no domain was written.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterate ranges in domain order.
    pub fn iter(&self) -> impl Iterator<Item = &DomainRange> {
        self.ranges.iter()
    }

    /// Total rows covered by all ranges.
    pub fn total_rows(&self) -> u64 {
        self.ranges.last().map_or(0, DomainRange::end)
    }

    /// Persist as a region file of triples.
    pub fn write(&self, path: &Path, sync: bool) -> Result<()> {
        let mut values = Vec::with_capacity(self.ranges.len() * 3);
        for range in &self.ranges {
            values.extend_from_slice(&[
                range.domain_id as i64,
                range.start as i64,
                range.length as i64,
            ]);
        }
        write_region(path, &values, sync)
    }

    /// Load a persisted index, checking that it is well formed.
    pub fn load(path: &Path) -> Result<Self> {
        let values = read_region(path)?;
        if values.len() % 3 != 0 {
            return Err(Error::corruption(format!(
                "domain index {:?} holds {} values, not a multiple of 3",
                path,
                values.len()
            )));
        }

        let mut ranges = Vec::with_capacity(values.len() / 3);
        let mut next_start = 0i64;
        for (i, triple) in values.chunks_exact(3).enumerate() {
            let (domain_id, start, length) = (triple[0], triple[1], triple[2]);
            if domain_id != i as i64 + 1 || start != next_start || length <= 0 {
                return Err(Error::corruption(format!(
                    "domain index entry {} is out of sequence: ({}, {}, {})",
                    i, domain_id, start, length
                )));
            }
            next_start = start.checked_add(length).ok_or_else(|| {
                Error::corruption(format!(
                    "domain index entry {} overflows: ({}, {}, {})",
                    i, domain_id, start, length
                ))
            })?;
            ranges.push(DomainRange {
                domain_id: domain_id as DomainId,
                start: start as u64,
                length: length as u64,
            });
        }

        Ok(Self { ranges })
    }
}
