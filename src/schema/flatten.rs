//! Schema flattening.
//!
//! Turns a declared schema (scalars, constants and one level of repeated
//! sub-blocks) into the flat column layout stored on disk, together with the
//! extraction maps that pull each flat value out of a raw record.

use crate::error::{Error, Result};
use crate::schema::extract::Extraction;
use crate::schema::types::{FieldDef, Row, ScalarType, Value};
use crate::schema::{DEFAULT_RESERVED_POSITION, DOMAIN_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A declared record schema.
///
/// The trailing `DOMAIN_ID` column is implicit and must not be declared.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDef>,
    reserved_position: Option<usize>,
    index_column: Option<String>,
}

impl Schema {
    /// Create a schema from its declared fields.
    ///
    /// Raw record position 1 is reserved by default; see
    /// [`Schema::with_reserved_position`].
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields, reserved_position: Some(DEFAULT_RESERVED_POSITION), index_column: None }
    }

    /// Set the raw record position that is skipped while assigning source
    /// positions, or `None` to consume every position.
    pub fn with_reserved_position(mut self, position: Option<usize>) -> Self {
        self.reserved_position = position;
        self
    }

    /// Name the column used as the entity id for the secondary index.
    /// Defaults to the first flat column.
    pub fn with_index_column(mut self, name: impl Into<String>) -> Self {
        self.index_column = Some(name.into());
        self
    }

    /// Declared fields.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Flatten into the stored layout.
    pub fn flatten(&self) -> Result<FlatSchema> {
        if self.fields.is_empty() {
            return Err(Error::schema("schema declares no fields"));
        }

        let mut cursor = SourceCursor { pos: 0, reserved: self.reserved_position };
        let mut columns: Vec<Column> = Vec::new();
        let mut extractions = Vec::new();
        let mut nested_map = Vec::new();
        let mut groups = Vec::new();

        for field in &self.fields {
            match field {
                FieldDef::Scalar { name, ty, len } => {
                    check_scalar(name, ty, *len)?;
                    let ex = cursor.take(*len);
                    groups.push(FieldGroup::Column(columns.len()));
                    columns.push(Column::new(name.clone(), *ty, *len));
                    extractions.push(ex.clone());
                    nested_map.push(ex);
                }
                FieldDef::Constant { name, ty, value } => {
                    check_constant(name, ty, value)?;
                    let ex = Extraction::Constant(value.clone());
                    groups.push(FieldGroup::Column(columns.len()));
                    columns.push(Column::new(name.clone(), *ty, 1));
                    extractions.push(ex.clone());
                    nested_map.push(ex);
                }
                FieldDef::Block { name, fields, repeat } => {
                    let (ex, group) = flatten_block(
                        name,
                        fields,
                        *repeat,
                        &mut cursor,
                        &mut columns,
                        &mut extractions,
                    )?;
                    groups.push(group);
                    nested_map.push(ex);
                }
            }
        }

        columns.push(Column::new(DOMAIN_ID.to_string(), ScalarType::Int64, 1));

        let mut seen = HashSet::new();
        for (i, column) in columns.iter().enumerate() {
            if column.name == DOMAIN_ID && i + 1 != columns.len() {
                return Err(Error::schema("DOMAIN_ID is implicit and cannot be declared"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::schema(format!("duplicate flat column '{}'", column.name)));
            }
        }

        if extractions.len() != columns.len() - 1 {
            return Err(Error::schema(format!(
                "{} extraction indices for {} columns (expected columns - 1)",
                extractions.len(),
                columns.len()
            )));
        }

        let index_column = resolve_index_column(&columns, self.index_column.as_deref())?;
        let fingerprint = fingerprint(&columns);

        Ok(FlatSchema { columns, extractions, nested_map, groups, index_column, fingerprint })
    }
}

/// A flat stored column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Unique column name.
    pub name: String,
    /// Element type.
    pub ty: ScalarType,
    /// Number of elements; values of columns with `len > 1` are arrays.
    pub len: usize,
}

impl Column {
    /// Create a column.
    pub fn new(name: String, ty: ScalarType, len: usize) -> Self {
        Self { name, ty, len }
    }

    /// Encoded width in bytes.
    pub fn width(&self) -> usize {
        self.ty.width() * self.len
    }
}

/// Maps a declared field back onto flat column indices.
#[derive(Debug, Clone, PartialEq)]
enum FieldGroup {
    Column(usize),
    Block(Vec<Vec<usize>>),
}

/// The flattened layout of a schema.
///
/// Built once and shared read-only between table instances.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSchema {
    columns: Vec<Column>,
    extractions: Vec<Extraction>,
    nested_map: Vec<Extraction>,
    groups: Vec<FieldGroup>,
    index_column: usize,
    fingerprint: u32,
}

impl FlatSchema {
    /// All stored columns, `DOMAIN_ID` last.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// One extraction per column except `DOMAIN_ID`.
    pub fn extractions(&self) -> &[Extraction] {
        &self.extractions
    }

    /// Extraction map per declared field. Repeated blocks resolve to an
    /// array with one entry per repetition.
    pub fn nested_map(&self) -> &[Extraction] {
        &self.nested_map
    }

    /// Number of stored columns including `DOMAIN_ID`.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Position of the entity id column.
    pub fn index_column(&self) -> usize {
        self.index_column
    }

    /// Position of the `DOMAIN_ID` column.
    pub fn domain_column(&self) -> usize {
        self.columns.len() - 1
    }

    /// Encoded row width in bytes.
    pub fn row_width(&self) -> usize {
        self.columns.iter().map(Column::width).sum()
    }

    /// CRC32 over names, types and lengths of the layout.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    /// Resolve a raw record into a flat row without `DOMAIN_ID`.
    pub fn extract(&self, raw: &[Value]) -> Result<Row> {
        self.extractions.iter().map(|ex| ex.resolve(raw)).collect()
    }

    /// Rebuild the per-declared-field values from a flat row, the inverse of
    /// [`FlatSchema::extract`] on the nested map.
    pub fn regroup(&self, row: &[Value]) -> Result<Vec<Value>> {
        if row.len() < self.extractions.len() {
            return Err(Error::invalid_argument(format!(
                "row has {} values, layout needs {}",
                row.len(),
                self.extractions.len()
            )));
        }
        Ok(self
            .groups
            .iter()
            .map(|group| match group {
                FieldGroup::Column(i) => row[*i].clone(),
                FieldGroup::Block(reps) => Value::Array(
                    reps.iter()
                        .map(|rep| Value::Array(rep.iter().map(|i| row[*i].clone()).collect()))
                        .collect(),
                ),
            })
            .collect())
    }
}

struct SourceCursor {
    pos: usize,
    reserved: Option<usize>,
}

impl SourceCursor {
    fn skip_reserved(&mut self) {
        if Some(self.pos) == self.reserved {
            self.pos += 1;
        }
    }

    fn take(&mut self, len: usize) -> Extraction {
        self.skip_reserved();
        let start = self.pos;
        self.pos += len;
        if len == 1 {
            Extraction::Source(start)
        } else {
            Extraction::Nested((start..start + len).map(Extraction::Source).collect())
        }
    }
}

fn flatten_block(
    name: &str,
    fields: &[FieldDef],
    repeat: usize,
    cursor: &mut SourceCursor,
    columns: &mut Vec<Column>,
    extractions: &mut Vec<Extraction>,
) -> Result<(Extraction, FieldGroup)> {
    if repeat == 0 {
        return Err(Error::schema(format!("block '{}' has a repeat count of 0", name)));
    }
    if fields.is_empty() {
        return Err(Error::schema(format!("block '{}' declares no fields", name)));
    }

    cursor.skip_reserved();
    let block_start = cursor.pos;

    let mut first = Vec::with_capacity(fields.len());
    let mut inner = Vec::with_capacity(fields.len());
    for field in fields {
        match field {
            FieldDef::Scalar { name: field_name, ty, len } => {
                check_scalar(field_name, ty, *len)?;
                first.push(cursor.take(*len));
                inner.push((field_name.as_str(), *ty, *len));
            }
            FieldDef::Constant { name: field_name, ty, value } => {
                check_constant(field_name, ty, value)?;
                first.push(Extraction::Constant(value.clone()));
                inner.push((field_name.as_str(), *ty, 1));
            }
            FieldDef::Block { name: nested, .. } => {
                return Err(Error::schema(format!(
                    "block '{}' nests block '{}': only one level of sub-blocks is supported",
                    name, nested
                )));
            }
        }
    }

    let span = cursor.pos - block_start;
    cursor.pos = block_start + span * repeat;

    let mut reps = Vec::with_capacity(repeat);
    let mut group = Vec::with_capacity(repeat);
    for r in 0..repeat {
        let rep: Vec<Extraction> = first.iter().map(|ex| ex.shifted(r * span)).collect();
        let mut indices = Vec::with_capacity(rep.len());
        for ((field_name, ty, len), ex) in inner.iter().zip(&rep) {
            let column_name = if repeat == 1 {
                field_name.to_string()
            } else {
                format!("{}_{}", field_name, r + 1)
            };
            indices.push(columns.len());
            columns.push(Column::new(column_name, *ty, *len));
            extractions.push(ex.clone());
        }
        group.push(indices);
        reps.push(Extraction::Nested(rep));
    }

    Ok((Extraction::Nested(reps), FieldGroup::Block(group)))
}

fn check_scalar(name: &str, ty: &ScalarType, len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::schema(format!("column '{}' has length 0", name)));
    }
    if ty.width() == 0 {
        return Err(Error::schema(format!("column '{}' has a zero-width type", name)));
    }
    Ok(())
}

fn check_constant(name: &str, ty: &ScalarType, value: &Value) -> Result<()> {
    check_scalar(name, ty, 1)?;
    if !ty.accepts(value) {
        return Err(Error::schema(format!(
            "constant '{}' value {} does not fit type {:?}",
            name, value, ty
        )));
    }
    Ok(())
}

fn resolve_index_column(columns: &[Column], name: Option<&str>) -> Result<usize> {
    let index = match name {
        Some(name) => columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::schema(format!("index column '{}' is not in the schema", name)))?,
        None => 0,
    };
    let column = &columns[index];
    if column.name == DOMAIN_ID || !column.ty.is_integer() || column.len != 1 {
        return Err(Error::schema(format!(
            "index column '{}' must be a single integer column",
            column.name
        )));
    }
    Ok(index)
}

fn fingerprint(columns: &[Column]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(&[0, column.ty.tag()]);
        hasher.update(&(column.ty.width() as u32).to_le_bytes());
        hasher.update(&(column.len as u32).to_le_bytes());
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn displacement() -> Schema {
        Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::scalar("X", ScalarType::Float64),
            FieldDef::scalar("Y", ScalarType::Float64),
        ])
    }

    #[test]
    fn test_flat_schema_skips_reserved_position() {
        let flat = displacement().flatten().unwrap();
        let names: Vec<_> = flat.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["ID", "X", "Y", "DOMAIN_ID"]);
        assert_eq!(
            flat.extractions(),
            &[Extraction::Source(0), Extraction::Source(2), Extraction::Source(3)]
        );
        assert_eq!(flat.extractions().len(), flat.num_columns() - 1);
        assert_eq!(flat.domain_column(), 3);
        assert_eq!(flat.row_width(), 32);
    }

    #[test]
    fn test_no_reserved_position() {
        let flat = displacement().with_reserved_position(None).flatten().unwrap();
        assert_eq!(
            flat.extractions(),
            &[Extraction::Source(0), Extraction::Source(1), Extraction::Source(2)]
        );
    }

    #[test]
    fn test_repeated_block() {
        let schema = Schema::new(vec![
            FieldDef::scalar("EID", ScalarType::Int64),
            FieldDef::block(
                "POINT",
                vec![
                    FieldDef::scalar("SX", ScalarType::Float64),
                    FieldDef::scalar("SY", ScalarType::Float64),
                ],
                3,
            ),
        ]);
        let flat = schema.flatten().unwrap();
        let names: Vec<_> = flat.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["EID", "SX_1", "SY_1", "SX_2", "SY_2", "SX_3", "SY_3", "DOMAIN_ID"]);
        assert_eq!(flat.extractions()[1], Extraction::Source(2));
        assert_eq!(flat.extractions()[3], Extraction::Source(4));
        assert_eq!(flat.extractions()[6], Extraction::Source(7));

        match &flat.nested_map()[1] {
            Extraction::Nested(reps) => assert_eq!(reps.len(), 3),
            other => panic!("unexpected map {:?}", other),
        }
    }

    #[test]
    fn test_single_repetition_keeps_names() {
        let schema = Schema::new(vec![
            FieldDef::scalar("EID", ScalarType::Int64),
            FieldDef::block("B", vec![FieldDef::scalar("S", ScalarType::Float64)], 1),
        ]);
        let flat = schema.flatten().unwrap();
        assert_eq!(flat.column_index("S"), Some(1));
    }

    #[test]
    fn test_constant_not_sourced() {
        let schema = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::constant("STATUS", ScalarType::Text(4), "OK"),
            FieldDef::scalar("V", ScalarType::Float32),
        ]);
        let flat = schema.flatten().unwrap();
        let raw = vec![Value::Int(5), Value::from("skip"), Value::Float(0.25)];
        let row = flat.extract(&raw).unwrap();
        assert_eq!(row, vec![Value::Int(5), Value::from("OK"), Value::Float(0.25)]);
    }

    #[test]
    fn test_array_column_consumes_positions() {
        let schema = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::array("T", ScalarType::Float64, 3),
            FieldDef::scalar("Z", ScalarType::Int32),
        ]);
        let flat = schema.flatten().unwrap();
        let raw: Vec<Value> = vec![
            Value::Int(1),
            Value::Int(0),
            Value::Float(1.0),
            Value::Float(2.0),
            Value::Float(3.0),
            Value::Int(9),
        ];
        let row = flat.extract(&raw).unwrap();
        assert_eq!(row[1], Value::from(vec![1.0f64, 2.0, 3.0]));
        assert_eq!(row[2], Value::Int(9));
    }

    #[test]
    fn test_nested_block_rejected() {
        let schema = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::block(
                "OUTER",
                vec![FieldDef::block("INNER", vec![FieldDef::scalar("V", ScalarType::Int64)], 2)],
                2,
            ),
        ]);
        assert!(matches!(schema.flatten(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_invalid_schemas() {
        assert!(Schema::new(vec![]).flatten().is_err());

        let dup = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::scalar("ID", ScalarType::Int64),
        ]);
        assert!(matches!(dup.flatten(), Err(Error::Schema(_))));

        let domain = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::scalar(DOMAIN_ID, ScalarType::Int64),
        ]);
        assert!(matches!(domain.flatten(), Err(Error::Schema(_))));

        let float_index = Schema::new(vec![FieldDef::scalar("V", ScalarType::Float64)]);
        assert!(matches!(float_index.flatten(), Err(Error::Schema(_))));

        let bad_constant = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::constant("C", ScalarType::Int64, "text"),
        ]);
        assert!(matches!(bad_constant.flatten(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_named_index_column() {
        let schema = Schema::new(vec![
            FieldDef::scalar("V", ScalarType::Float64),
            FieldDef::scalar("GRID", ScalarType::Int32),
        ])
        .with_index_column("GRID");
        assert_eq!(schema.flatten().unwrap().index_column(), 1);
    }

    #[test]
    fn test_regroup_inverts_extract() {
        let schema = Schema::new(vec![
            FieldDef::scalar("EID", ScalarType::Int64),
            FieldDef::block(
                "P",
                vec![
                    FieldDef::scalar("A", ScalarType::Float64),
                    FieldDef::constant("K", ScalarType::Int32, 7),
                ],
                2,
            ),
        ]);
        let flat = schema.flatten().unwrap();
        let raw: Vec<Value> =
            vec![Value::Int(3), Value::Int(0), Value::Float(1.0), Value::Float(2.0)];
        let row = flat.extract(&raw).unwrap();
        let expected: Vec<Value> =
            flat.nested_map().iter().map(|ex| ex.resolve(&raw).unwrap()).collect();
        assert_eq!(flat.regroup(&row).unwrap(), expected);
    }

    #[test]
    fn test_fingerprint_depends_on_layout() {
        let a = displacement().flatten().unwrap();
        let b = Schema::new(vec![
            FieldDef::scalar("ID", ScalarType::Int64),
            FieldDef::scalar("X", ScalarType::Float32),
            FieldDef::scalar("Y", ScalarType::Float64),
        ])
        .flatten()
        .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), displacement().flatten().unwrap().fingerprint());
    }
}
