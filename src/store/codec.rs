//! Fixed-width row codec.
//!
//! Every row of a table encodes to exactly `row_width` bytes: columns in
//! layout order, integers and floats little-endian, text zero padded to its
//! declared width, array columns element by element.

use crate::error::{Error, Result};
use crate::schema::{Column, ScalarType, Value};
use bytes::{Buf, BufMut, BytesMut};

/// Encodes and decodes rows of one flat layout.
#[derive(Debug, Clone)]
pub struct RowCodec {
    columns: Vec<Column>,
    offsets: Vec<usize>,
    row_width: usize,
}

impl RowCodec {
    /// Create a codec for the given columns.
    pub fn new(columns: &[Column]) -> Self {
        let mut offsets = Vec::with_capacity(columns.len());
        let mut offset = 0;
        for column in columns {
            offsets.push(offset);
            offset += column.width();
        }
        Self { columns: columns.to_vec(), offsets, row_width: offset }
    }

    /// Encoded width of one row.
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Append the encoding of `row` to `buf`.
    pub fn encode_into(&self, row: &[Value], buf: &mut BytesMut) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::invalid_argument(format!(
                "row has {} values, layout has {} columns",
                row.len(),
                self.columns.len()
            )));
        }

        for (column, value) in self.columns.iter().zip(row) {
            if column.len == 1 {
                encode_scalar(column, value, buf)?;
                continue;
            }
            match value {
                Value::Array(items) if items.len() == column.len => {
                    for item in items {
                        encode_scalar(column, item, buf)?;
                    }
                }
                other => {
                    return Err(Error::invalid_argument(format!(
                        "column '{}' expects an array of {} values, got {}",
                        column.name, column.len, other
                    )));
                }
            }
        }
        Ok(())
    }

    /// Decode one row from exactly `row_width` bytes.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Value>> {
        if data.len() != self.row_width {
            return Err(Error::corruption(format!(
                "row data is {} bytes, expected {}",
                data.len(),
                self.row_width
            )));
        }
        let mut cursor = data;
        self.columns.iter().map(|column| decode_column(column, &mut cursor)).collect()
    }

    /// Decode a single column from one row's bytes.
    pub fn decode_column(&self, data: &[u8], index: usize) -> Result<Value> {
        let column = self
            .columns
            .get(index)
            .ok_or_else(|| Error::invalid_argument(format!("no column at position {}", index)))?;
        let start = self.offsets[index];
        let end = start + column.width();
        if data.len() < end {
            return Err(Error::corruption("row data too short for column"));
        }
        let mut cursor = &data[start..end];
        decode_column(column, &mut cursor)
    }
}

fn encode_scalar(column: &Column, value: &Value, buf: &mut BytesMut) -> Result<()> {
    if !column.ty.accepts(value) {
        return Err(Error::invalid_argument(format!(
            "value {} does not fit column '{}' of type {:?}",
            value, column.name, column.ty
        )));
    }
    match (column.ty, value) {
        (ScalarType::Int32, Value::Int(v)) => buf.put_i32_le(*v as i32),
        (ScalarType::Int64, Value::Int(v)) => buf.put_i64_le(*v),
        (ScalarType::Float32, v) => buf.put_f32_le(v.as_float().unwrap_or_default() as f32),
        (ScalarType::Float64, v) => buf.put_f64_le(v.as_float().unwrap_or_default()),
        (ScalarType::Text(n), Value::Text(s)) => {
            buf.put_slice(s.as_bytes());
            buf.put_bytes(0, n - s.len());
        }
        (ty, value) => {
            return Err(Error::invalid_argument(format!(
                "cannot encode {} as {:?} in column '{}'",
                value, ty, column.name
            )));
        }
    }
    Ok(())
}

fn decode_scalar(ty: ScalarType, cursor: &mut &[u8]) -> Result<Value> {
    if cursor.remaining() < ty.width() {
        return Err(Error::corruption("row data truncated"));
    }
    let value = match ty {
        ScalarType::Int32 => Value::Int(cursor.get_i32_le() as i64),
        ScalarType::Int64 => Value::Int(cursor.get_i64_le()),
        ScalarType::Float32 => Value::Float(cursor.get_f32_le() as f64),
        ScalarType::Float64 => Value::Float(cursor.get_f64_le()),
        ScalarType::Text(n) => {
            let data: &[u8] = *cursor;
            let raw = &data[..n];
            let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            let text = std::str::from_utf8(&raw[..end])
                .map_err(|e| Error::corruption(format!("invalid text column: {}", e)))?
                .to_string();
            cursor.advance(n);
            Value::Text(text)
        }
    };
    Ok(value)
}

fn decode_column(column: &Column, cursor: &mut &[u8]) -> Result<Value> {
    if column.len == 1 {
        return decode_scalar(column.ty, cursor);
    }
    (0..column.len)
        .map(|_| decode_scalar(column.ty, cursor))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}
