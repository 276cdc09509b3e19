//! Extraction maps: how a flat column value is pulled out of a raw record.

use crate::error::{Error, Result};
use crate::schema::types::Value;

/// A node of an extraction map.
///
/// Leaves either point at a position in the raw record or carry a constant;
/// `Nested` groups children and resolves to [`Value::Array`].
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Copy the raw record value at this position.
    Source(usize),
    /// Emit this value regardless of input.
    Constant(Value),
    /// Resolve each child in order.
    Nested(Vec<Extraction>),
}

impl Extraction {
    /// Resolve against a raw record.
    pub fn resolve(&self, raw: &[Value]) -> Result<Value> {
        match self {
            Extraction::Source(pos) => raw.get(*pos).cloned().ok_or_else(|| {
                Error::invalid_argument(format!(
                    "raw record has {} fields, position {} requested",
                    raw.len(),
                    pos
                ))
            }),
            Extraction::Constant(value) => Ok(value.clone()),
            Extraction::Nested(children) => children
                .iter()
                .map(|child| child.resolve(raw))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
        }
    }

    /// Copy of this map with every source position moved by `by`.
    /// Constants are left in place.
    pub fn shifted(&self, by: usize) -> Self {
        match self {
            Extraction::Source(pos) => Extraction::Source(pos + by),
            Extraction::Constant(value) => Extraction::Constant(value.clone()),
            Extraction::Nested(children) => {
                Extraction::Nested(children.iter().map(|c| c.shifted(by)).collect())
            }
        }
    }

    /// Number of `Source` leaves.
    pub fn source_count(&self) -> usize {
        match self {
            Extraction::Source(_) => 1,
            Extraction::Constant(_) => 0,
            Extraction::Nested(children) => children.iter().map(Extraction::source_count).sum(),
        }
    }

    /// Largest source position referenced, if any.
    pub fn max_source(&self) -> Option<usize> {
        match self {
            Extraction::Source(pos) => Some(*pos),
            Extraction::Constant(_) => None,
            Extraction::Nested(children) => children.iter().filter_map(Extraction::max_source).max(),
        }
    }

    /// Nesting depth; leaves have depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Extraction::Nested(children) => {
                1 + children.iter().map(Extraction::depth).max().unwrap_or(0)
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Vec<Value> {
        vec![Value::Int(10), Value::from("X"), Value::Float(1.5), Value::Float(2.5)]
    }

    #[test]
    fn test_resolve_leaves() {
        assert_eq!(Extraction::Source(0).resolve(&raw()).unwrap(), Value::Int(10));
        assert_eq!(
            Extraction::Constant(Value::from("OK")).resolve(&raw()).unwrap(),
            Value::from("OK")
        );
    }

    #[test]
    fn test_resolve_nested() {
        let map = Extraction::Nested(vec![Extraction::Source(2), Extraction::Source(3)]);
        assert_eq!(map.resolve(&raw()).unwrap(), Value::from(vec![1.5f64, 2.5]));
        assert_eq!(map.depth(), 1);
        assert_eq!(map.source_count(), 2);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let err = Extraction::Source(9).resolve(&raw()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_shift_keeps_constants() {
        let map = Extraction::Nested(vec![
            Extraction::Source(2),
            Extraction::Constant(Value::Int(0)),
        ]);
        let shifted = map.shifted(3);
        assert_eq!(
            shifted,
            Extraction::Nested(vec![Extraction::Source(5), Extraction::Constant(Value::Int(0))])
        );
        assert_eq!(shifted.max_source(), Some(5));
    }
}
