//! Column oriented score and metadata tables.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ErrorInfo, WluError};

/// Rectangular table with named columns and JSON scalar cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given header.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; its width must match the header.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), WluError> {
        if row.len() != self.columns.len() {
            return Err(WluError::Serde(
                ErrorInfo::new("table_width", "row width does not match header")
                    .with_context("columns", self.columns.len().to_string())
                    .with_context("cells", row.len().to_string()),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Sets every row's value of each key in `meta`, adding missing columns.
    pub fn assign(&mut self, meta: &BTreeMap<String, Value>) {
        for (key, value) in meta {
            match self.column_index(key) {
                Some(idx) => {
                    for row in &mut self.rows {
                        row[idx] = value.clone();
                    }
                }
                None => {
                    self.columns.push(key.clone());
                    for row in &mut self.rows {
                        row.push(value.clone());
                    }
                }
            }
        }
    }

    /// Header names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column in the header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Rows keyed by column name.
    pub fn records(&self) -> Vec<BTreeMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Appends the rows of `other`, aligning columns by name.
    pub fn extend_from(&mut self, other: &Table) {
        for column in other.columns() {
            if self.column_index(column).is_none() {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
            }
        }
        for record in other.records() {
            let row = self
                .columns
                .iter()
                .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                .collect();
            self.rows.push(row);
        }
    }

    /// Writes the table as CSV with a header line.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), WluError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(&self.columns)
            .map_err(|err| WluError::serde("csv_header", err))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(cell_text))
                .map_err(|err| WluError::serde("csv_row", err))?;
        }
        writer
            .flush()
            .map_err(|err| WluError::serde("csv_flush", err))
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
