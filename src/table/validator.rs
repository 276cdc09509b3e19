//! Row validation hook.

use crate::schema::Row;

/// Transforms or checks a flat row before it is stored.
///
/// Implementations must preserve the number of values and their types;
/// a row whose arity changes is rejected at write time.
pub trait RowValidator: Send + Sync {
    /// Validate one row (without `DOMAIN_ID`).
    fn validate(&self, row: Row) -> Row;
}

impl<F> RowValidator for F
where
    F: Fn(Row) -> Row + Send + Sync,
{
    fn validate(&self, row: Row) -> Row {
        self(row)
    }
}

/// Validator that passes rows through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl RowValidator for Identity {
    fn validate(&self, row: Row) -> Row {
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Value;

    #[test]
    fn test_identity() {
        let row = vec![Value::Int(1), Value::Float(2.0)];
        assert_eq!(Identity.validate(row.clone()), row);
    }

    #[test]
    fn test_closure() {
        let clamp = |mut row: Row| {
            if let Some(Value::Float(v)) = row.get_mut(1) {
                *v = v.max(0.0);
            }
            row
        };
        let out = clamp.validate(vec![Value::Int(1), Value::Float(-3.0)]);
        assert_eq!(out, vec![Value::Int(1), Value::Float(0.0)]);
    }
}
