use std::collections::HashMap;

use serde_json::Value;

use crate::data_types::{Column, ColumnType, JsonObject, TableData};

use super::IngestError;

/// Accumulates loosely-shaped JSON rows into a rectangular table. Columns are
/// laid out in the order they're first seen, unless a fixed column list was
/// given up front, in which case anything else is dropped.
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    fixed: bool,
    rows: Vec<Vec<Value>>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: Vec<String>) -> Self {
        let mut builder = Self::default();
        for column in columns {
            builder.position_of(&column);
        }
        builder.fixed = true;
        builder
    }

    fn position_of(&mut self, name: &str) -> usize {
        if let Some(position) = self.positions.get(name) {
            return *position;
        }

        self.columns.push(name.to_string());
        self.positions.insert(name.to_string(), self.columns.len() - 1);
        self.columns.len() - 1
    }

    fn lookup(&mut self, name: &str) -> Option<usize> {
        if self.fixed {
            self.positions.get(name).copied()
        } else {
            Some(self.position_of(name))
        }
    }

    pub fn push_object(&mut self, object: JsonObject) {
        let mut row = vec![Value::Null; self.columns.len()];

        for (key, value) in object {
            if let Some(position) = self.lookup(&key) {
                if position >= row.len() {
                    row.resize(position + 1, Value::Null);
                }
                row[position] = value;
            }
        }

        self.rows.push(row);
    }

    /// Add a positional row. Without a fixed column list, the n-th value goes
    /// into a column named after n.
    pub fn push_array(&mut self, values: Vec<Value>) -> Result<(), IngestError> {
        if self.fixed {
            if values.len() != self.columns.len() {
                return Err(IngestError::ColumnCountMismatch {
                    row: self.rows.len(),
                    expected: self.columns.len(),
                    got: values.len(),
                });
            }
            self.rows.push(values);
            return Ok(());
        }

        let mut row = vec![Value::Null; self.columns.len()];
        for (index, value) in values.into_iter().enumerate() {
            let position = self.position_of(&index.to_string());
            if position >= row.len() {
                row.resize(position + 1, Value::Null);
            }
            row[position] = value;
        }

        self.rows.push(row);
        Ok(())
    }

    pub fn finish(self) -> TableData {
        let width = self.columns.len();
        let rows: Vec<Vec<Value>> = self
            .rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();

        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(index, name)| Column {
                name,
                column_type: infer_column_type(rows.iter().map(|row| &row[index])),
            })
            .collect();

        TableData { columns, rows }
    }
}

/// Narrowest column type that holds every non-null value. Columns with no
/// values at all, or with mixed kinds of values, are stored as text.
pub fn infer_column_type<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnType {
    let mut inferred: Option<ColumnType> = None;

    for value in values {
        let current = match value {
            Value::Null => continue,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Number(n) if n.is_i64() => ColumnType::BigInt,
            Value::Number(_) => ColumnType::Double,
            Value::String(_) | Value::Array(_) | Value::Object(_) => {
                return ColumnType::Text
            }
        };

        inferred = Some(match (inferred, current) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(ColumnType::BigInt), ColumnType::Double)
            | (Some(ColumnType::Double), ColumnType::BigInt) => ColumnType::Double,
            _ => return ColumnType::Text,
        });
    }

    inferred.unwrap_or(ColumnType::Text)
}
