//! Private (secondary) index.
//!
//! For every domain batch the entity ids of the batch are turned into an
//! inverted block:
//!
//! ```text
//! [id][count][pos 1]..[pos count][id][count][pos 1].. ...
//! ```
//!
//! Ids appear in order of first occurrence and positions are relative to the
//! start of the batch, so the block only depends on how ids are arranged
//! inside the batch. Batches with the same arrangement (same mesh, different
//! load case) share one stored block; each batch records an identity triple
//! `(location, length, offset)` pointing into the block storage, where
//! `offset` is the batch's first row in the record store.

use crate::error::{Error, Result};
use crate::store::region::{read_region, write_region};
use crate::DomainId;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

/// Decoded block: entity id to batch-relative row positions.
pub type DecodedBlock = HashMap<i64, Vec<u64>>;

/// Where a batch's block lives and where the batch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityEntry {
    /// Start of the block in the block storage, in values
    pub location: u64,
    /// Length of the block, in values
    pub length: u64,
    /// Record store offset of the batch's first row
    pub offset: u64,
}

/// Serialize the ids of one batch into a block.
pub fn serialize_block(ids: &[i64]) -> Vec<i64> {
    let mut slots: HashMap<i64, usize> = HashMap::new();
    let mut groups: Vec<(i64, Vec<i64>)> = Vec::new();

    for (pos, &id) in ids.iter().enumerate() {
        let slot = *slots.entry(id).or_insert_with(|| {
            groups.push((id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(pos as i64);
    }

    let mut block = Vec::with_capacity(ids.len() + groups.len() * 2);
    for (id, positions) in groups {
        block.push(id);
        block.push(positions.len() as i64);
        block.extend(positions);
    }
    block
}

/// Parse a serialized block.
pub fn decode_block(block: &[i64]) -> Result<DecodedBlock> {
    let mut decoded = DecodedBlock::new();
    let mut i = 0;

    while i < block.len() {
        if i + 1 >= block.len() {
            return Err(Error::corruption(format!("index block truncated at value {}", i)));
        }
        let id = block[i];
        let count = block[i + 1];
        let end = usize::try_from(count)
            .ok()
            .and_then(|count| (i + 2).checked_add(count))
            .filter(|&end| end <= block.len())
            .ok_or_else(|| {
                Error::corruption(format!("index block group for id {} has bad count {}", id, count))
            })?;

        let positions = block[i + 2..end]
            .iter()
            .map(|&pos| {
                u64::try_from(pos).map_err(|_| {
                    Error::corruption(format!("negative position {} for id {}", pos, id))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if decoded.insert(id, positions).is_some() {
            return Err(Error::corruption(format!("id {} appears twice in one block", id)));
        }
        i = end;
    }

    Ok(decoded)
}

#[derive(Debug)]
struct PendingBatch {
    block: Vec<i64>,
    base_offset: u64,
}

/// Output of [`PrivateIndexBuilder::finish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishedIndex {
    /// One entry per batch, in batch order.
    pub identity: Vec<IdentityEntry>,
    /// Concatenated distinct blocks.
    pub data: Vec<i64>,
    /// Number of distinct blocks stored.
    pub stored_blocks: usize,
}

impl FinishedIndex {
    /// Persist both regions.
    pub fn write(&self, identity_path: &Path, data_path: &Path, sync: bool) -> Result<()> {
        let mut identity = Vec::with_capacity(self.identity.len() * 3);
        for entry in &self.identity {
            identity.extend_from_slice(&[
                entry.location as i64,
                entry.length as i64,
                entry.offset as i64,
            ]);
        }
        write_region(data_path, &self.data, sync)?;
        write_region(identity_path, &identity, sync)
    }
}

/// Accumulates one block per written batch until finalize.
#[derive(Debug)]
pub struct PrivateIndexBuilder {
    batches: Vec<PendingBatch>,
    next_offset: u64,
}

impl PrivateIndexBuilder {
    /// Create a builder whose first batch starts at `start_offset`.
    pub fn new(start_offset: u64) -> Self {
        Self { batches: Vec::new(), next_offset: start_offset }
    }

    /// Record the entity ids of one appended batch.
    pub fn record_batch(&mut self, ids: &[i64]) {
        self.batches.push(PendingBatch { block: serialize_block(ids), base_offset: self.next_offset });
        self.next_offset += ids.len() as u64;
    }

    /// Number of batches recorded since the last finish.
    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    /// True if no batch is pending.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Record store offset the next batch will start at.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Deduplicate and lay out all pending blocks, clearing the builder.
    ///
    /// Each block is compared against the blocks already stored in this
    /// call; an exact match reuses the stored location.
    pub fn finish(&mut self) -> FinishedIndex {
        let mut stored: Vec<(usize, usize)> = Vec::new();
        let mut finished = FinishedIndex::default();

        for batch in self.batches.drain(..) {
            let block = &batch.block;
            let existing = stored.iter().copied().find(|&(location, length)| {
                length == block.len() && finished.data[location..location + length] == block[..]
            });

            let location = match existing {
                Some((location, _)) => location,
                None => {
                    let location = finished.data.len();
                    finished.data.extend_from_slice(block);
                    stored.push((location, block.len()));
                    location
                }
            };

            finished.identity.push(IdentityEntry {
                location: location as u64,
                length: block.len() as u64,
                offset: batch.base_offset,
            });
        }

        finished.stored_blocks = stored.len();
        finished
    }
}

/// Persisted private index with a per-instance decoded block cache.
#[derive(Debug)]
pub struct PrivateIndex {
    identity: Vec<IdentityEntry>,
    data: Vec<i64>,
    cache: HashMap<u64, Arc<DecodedBlock>>,
    lru_queue: VecDeque<u64>,
    cache_capacity: usize,
}

impl PrivateIndex {
    /// Build directly from a finished index.
    pub fn from_finished(finished: FinishedIndex, cache_capacity: usize) -> Self {
        Self {
            identity: finished.identity,
            data: finished.data,
            cache: HashMap::new(),
            lru_queue: VecDeque::new(),
            cache_capacity,
        }
    }

    /// Load both regions.
    pub fn load(identity_path: &Path, data_path: &Path, cache_capacity: usize) -> Result<Self> {
        let data = read_region(data_path)?;
        let raw = read_region(identity_path)?;
        if raw.len() % 3 != 0 {
            return Err(Error::corruption(format!(
                "private index identity {:?} holds {} values, not a multiple of 3",
                identity_path,
                raw.len()
            )));
        }

        let mut identity = Vec::with_capacity(raw.len() / 3);
        for triple in raw.chunks_exact(3) {
            let (location, length, offset) = (triple[0], triple[1], triple[2]);
            let in_bounds = location >= 0
                && length >= 0
                && offset >= 0
                && (location as u64).saturating_add(length as u64) <= data.len() as u64;
            if !in_bounds {
                return Err(Error::corruption(format!(
                    "identity entry ({}, {}, {}) outside block storage of {} values",
                    location,
                    length,
                    offset,
                    data.len()
                )));
            }
            identity.push(IdentityEntry {
                location: location as u64,
                length: length as u64,
                offset: offset as u64,
            });
        }

        Ok(Self {
            identity,
            data,
            cache: HashMap::new(),
            lru_queue: VecDeque::new(),
            cache_capacity,
        })
    }

    /// Identity entry of a domain; `None` for unknown domains.
    pub fn identity(&self, domain: DomainId) -> Option<IdentityEntry> {
        let index = usize::try_from(domain).ok()?.checked_sub(1)?;
        self.identity.get(index).copied()
    }

    /// Decoded block of an identity entry, cached by location.
    ///
    /// When the cache is full the least recently used block is evicted.
    pub fn block(&mut self, entry: &IdentityEntry) -> Result<Arc<DecodedBlock>> {
        if let Some(block) = self.cache.get(&entry.location) {
            let block = Arc::clone(block);
            self.touch(entry.location);
            return Ok(block);
        }

        let start = entry.location as usize;
        let end = start + entry.length as usize;
        let block = Arc::new(decode_block(&self.data[start..end])?);

        if self.cache_capacity > 0 {
            while self.cache.len() >= self.cache_capacity {
                match self.lru_queue.pop_front() {
                    Some(oldest) => {
                        self.cache.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.cache.insert(entry.location, Arc::clone(&block));
            self.lru_queue.push_back(entry.location);
        }
        Ok(block)
    }

    // O(n) in the number of cached blocks.
    fn touch(&mut self, location: u64) {
        if let Some(pos) = self.lru_queue.iter().position(|&l| l == location) {
            self.lru_queue.remove(pos);
        }
        self.lru_queue.push_back(location);
    }

    /// True if the block at `location` is cached.
    pub fn is_cached(&self, location: u64) -> bool {
        self.cache.contains_key(&location)
    }

    /// Absolute record store offsets of `ids` within one domain, in block
    /// order. Unknown domains and ids contribute nothing.
    pub fn lookup(&mut self, domain: DomainId, ids: &[i64]) -> Result<Vec<u64>> {
        let entry = match self.identity(domain) {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };
        let block = self.block(&entry)?;

        let mut offsets = Vec::new();
        for id in ids {
            if let Some(positions) = block.get(id) {
                offsets.extend(positions.iter().map(|pos| pos + entry.offset));
            }
        }
        Ok(offsets)
    }

    /// Number of batches (domains) indexed.
    pub fn num_batches(&self) -> usize {
        self.identity.len()
    }

    /// Number of values in the block storage.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Number of decoded blocks currently cached.
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached block.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.lru_queue.clear();
    }
}
