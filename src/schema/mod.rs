//! Record schemas and their flattening.
//!
//! A schema is declared as an ordered list of [`FieldDef`]s, possibly
//! containing one level of repeated sub-blocks. Flattening produces:
//!
//! - the flat column layout stored on disk, always ending with an implicit
//!   `DOMAIN_ID` column,
//! - one [`Extraction`] per stored column (except `DOMAIN_ID`) describing
//!   where its value comes from in a raw input record.
//!
//! ## Source positions
//!
//! Fields consume raw record positions left to right. Position 1 of a raw
//! record is reserved in the common input format and skipped, so a schema
//! `ID, X, Y` reads positions `0, 2, 3`. A repeated sub-block occupies the
//! span of one repetition `k` times, each copy shifted by that span.

pub mod extract;
pub mod flatten;
pub mod types;

pub use extract::Extraction;
pub use flatten::{Column, FlatSchema, Schema};
pub use types::{FieldDef, RawRecord, Row, ScalarType, Value};

/// Name of the implicit trailing domain id column.
pub const DOMAIN_ID: &str = "DOMAIN_ID";

/// Raw record position skipped by default while flattening.
pub const DEFAULT_RESERVED_POSITION: usize = 1;
