//! Indexes built at finalize.
//!
//! - [`DomainRangeIndex`]: domain id to contiguous row range.
//! - [`PrivateIndex`]: per-batch inverted index from entity id to row
//!   positions, with identical blocks stored once.

pub mod domain;
pub mod private;

pub use domain::{DomainRange, DomainRangeIndex};
pub use private::{
    decode_block, serialize_block, DecodedBlock, FinishedIndex, IdentityEntry, PrivateIndex,
    PrivateIndexBuilder,
};
