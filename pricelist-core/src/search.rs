//! Row search and cross-category aggregation
//!
//! Search is a pure filter: a row matches when any of its cells, in display
//! form, contains the query case-insensitively. Row order is preserved and an
//! empty query matches everything.

use serde::{Deserialize, Serialize};

use crate::workbook::{CellValue, Row, WorkbookSnapshot};

/// Field added to every row of an all-categories view
pub const CATEGORY_FIELD: &str = "Category";

/// Where a query looks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    SingleCategory(String),
    AllCategories,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub scope: SearchScope,
}

impl SearchQuery {
    pub fn in_category(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: SearchScope::SingleCategory(category.into()),
        }
    }

    pub fn everywhere(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: SearchScope::AllCategories,
        }
    }
}

/// Matching rows plus the column order to render them in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub query: SearchQuery,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl SearchResult {
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Filter `rows` to those with a cell in `columns` containing `query`
pub fn search<'a>(rows: &'a [Row], columns: &[String], query: &str) -> Vec<&'a Row> {
    if query.is_empty() {
        return rows.iter().collect();
    }

    let query_lower = query.to_lowercase();
    rows.iter()
        .filter(|row| row_matches(row, columns, &query_lower))
        .collect()
}

fn row_matches(row: &Row, columns: &[String], query_lower: &str) -> bool {
    columns.iter().any(|column| {
        row.get(column)
            .is_some_and(|cell| cell_matches(cell, query_lower))
    })
}

fn cell_matches(cell: &CellValue, query_lower: &str) -> bool {
    match cell {
        CellValue::Absent => false,
        other => other.to_string().to_lowercase().contains(query_lower),
    }
}

/// Rows of every category, each tagged with its category name
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedView {
    /// `Category` first, then every sheet column in first-seen order
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Concatenate all categories in snapshot order, tagging each row.
///
/// A sheet's own `Category` column is kept under `Category.1` so the tag
/// always wins the `Category` key.
pub fn aggregate_all(snapshot: &WorkbookSnapshot) -> AggregatedView {
    let mut columns = vec![CATEGORY_FIELD.to_string()];
    let mut rows = Vec::with_capacity(snapshot.total_rows());
    let displaced = format!("{CATEGORY_FIELD}.1");

    for sheet in &snapshot.categories {
        for column in &sheet.columns {
            let column = if column == CATEGORY_FIELD {
                &displaced
            } else {
                column
            };
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        for row in &sheet.rows {
            let mut tagged = Row::with_capacity(row.len() + 1);
            tagged.insert(
                CATEGORY_FIELD.to_string(),
                CellValue::Text(sheet.name.clone()),
            );
            for (column, cell) in row {
                let key = if column == CATEGORY_FIELD {
                    displaced.clone()
                } else {
                    column.clone()
                };
                tagged.insert(key, cell.clone());
            }
            rows.push(tagged);
        }
    }

    AggregatedView { columns, rows }
}
