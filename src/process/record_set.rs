// src/process/record_set.rs

use std::collections::HashMap;
use tracing::warn;

/// One cell of a record set. `None` is a null.
pub type Cell = Option<String>;

/// An in-memory table: named columns and rows of raw string cells.
///
/// Every row holds exactly `columns.len()` cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from columns and rows; rows are padded with nulls or truncated
    /// to the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, None);
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in column `name`, flattening nulls and unknown columns to `None`.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Keep only the rows for which `keep` returns true, preserving order.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|r| keep(r));
    }

    /// Set column `name` to the values produced by `f`, appending it if it
    /// does not exist yet.
    pub fn set_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&[Cell]) -> Cell,
    {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    let v = f(row);
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    let v = f(row);
                    row.push(v);
                }
            }
        }
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }
}

/// Stack record sets row-wise, aligning columns by name.
///
/// Output columns are the first set's columns followed by any new names in
/// order of first appearance; cells a set does not provide are null. Row order
/// is input order, then each set's own row order. Returns `None` for an empty
/// input.
pub fn concat(sets: Vec<RecordSet>) -> Option<RecordSet> {
    let mut iter = sets.into_iter();
    let mut out = iter.next()?;

    for set in iter {
        if set.columns == out.columns {
            out.rows.extend(set.rows);
            continue;
        }

        warn!(
            expected = ?out.columns,
            found = ?set.columns,
            "column sets differ between source files; aligning by name"
        );
        for col in &set.columns {
            if out.column_index(col).is_none() {
                out.columns.push(col.clone());
                for row in &mut out.rows {
                    row.push(None);
                }
            }
        }
        let positions: HashMap<&str, usize> = set
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let mapping: Vec<Option<usize>> = out
            .columns
            .iter()
            .map(|c| positions.get(c.as_str()).copied())
            .collect();
        for row in set.rows {
            let aligned = mapping
                .iter()
                .map(|src| src.and_then(|i| row.get(i).cloned().flatten()))
                .collect();
            out.rows.push(aligned);
        }
    }

    Some(out)
}
