//! Catalog data model
//!
//! A [`WorkbookSnapshot`] is the outcome of one fetch+parse cycle: an ordered
//! list of [`CategorySheet`]s, each holding loosely-typed rows. Snapshots are
//! immutable; a refresh replaces the whole snapshot.

mod normalize;

pub use normalize::normalize;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell as read from the workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Absent,
}

impl CellValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }
}

impl fmt::Display for CellValue {
    /// Absent cells render as the empty string; integral numbers drop `.0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Absent => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

static ABSENT: CellValue = CellValue::Absent;

/// One data row: column name to cell, in column order
pub type Row = IndexMap<String, CellValue>;

/// One named tab of the workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl CategorySheet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells of one column, top to bottom; rows missing the column yield `Absent`
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a CellValue> {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&ABSENT))
    }
}

/// Result of one successful fetch+parse cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbookSnapshot {
    pub fetched_at: DateTime<Utc>,
    /// Same order as the sheets in the source workbook
    pub categories: Vec<CategorySheet>,
}

impl WorkbookSnapshot {
    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    pub fn category(&self, name: &str) -> Option<&CategorySheet> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn total_rows(&self) -> usize {
        self.categories.iter().map(CategorySheet::row_count).sum()
    }
}
