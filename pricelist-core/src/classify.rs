//! Column role classification
//!
//! Advisory rendering hints derived from column names and a small sample of
//! non-empty cells. Classification never touches row data.
//!
//! Rules, first match wins:
//! 1. name `Image` → [`ColumnRole::ImagePreview`]
//! 2. name `Title` or `ASIN` → [`ColumnRole::Identifier`] when the sample looks
//!    like short single-line values, else [`ColumnRole::Text`]
//! 3. name containing `drive`, `link` or `gallery`, or a sampled cell holding a
//!    URL or cloud-storage host → [`ColumnRole::Hyperlink`]
//! 4. everything else → [`ColumnRole::Generic`]
//!
//! Names compare case-insensitively. A column with no non-empty cells is
//! [`ColumnRole::Generic`] unless its name alone decides rule 1 or 3.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::workbook::CategorySheet;

/// Non-empty cells inspected per column
const SAMPLE_SIZE: usize = 5;

/// Longest value still treated as an identifier
const IDENTIFIER_MAX_CHARS: usize = 64;

const LINK_NAME_HINTS: [&str; 3] = ["drive", "link", "gallery"];

const LINK_VALUE_HINTS: [&str; 9] = [
    "http",
    "drive.google.com",
    "docs.google.com",
    "dropbox.com",
    "onedrive.live.com",
    "1drv.ms",
    "sharepoint.com",
    "amazonaws.com",
    "app.box.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Identifier,
    Text,
    ImagePreview,
    Hyperlink,
    Generic,
}

/// Classify every column of `sheet`, in column order
pub fn classify(sheet: &CategorySheet) -> IndexMap<String, ColumnRole> {
    sheet
        .columns
        .iter()
        .map(|column| {
            let sample: Vec<String> = sheet
                .column_values(column)
                .filter(|cell| !cell.is_absent())
                .map(|cell| cell.to_string())
                .filter(|s| !s.trim().is_empty())
                .take(SAMPLE_SIZE)
                .collect();
            (column.clone(), classify_column(column, &sample))
        })
        .collect()
}

fn classify_column(name: &str, sample: &[String]) -> ColumnRole {
    let name = name.trim().to_lowercase();

    if name == "image" {
        return ColumnRole::ImagePreview;
    }

    if name == "title" || name == "asin" {
        if sample.is_empty() {
            return ColumnRole::Generic;
        }
        return if sample.iter().all(|v| looks_like_identifier(v)) {
            ColumnRole::Identifier
        } else {
            ColumnRole::Text
        };
    }

    let link_by_name = LINK_NAME_HINTS.iter().any(|hint| name.contains(hint));
    let link_by_value = sample.iter().any(|v| {
        let v = v.to_lowercase();
        LINK_VALUE_HINTS.iter().any(|hint| v.contains(hint))
    });
    if link_by_name || link_by_value {
        return ColumnRole::Hyperlink;
    }

    ColumnRole::Generic
}

fn looks_like_identifier(value: &str) -> bool {
    let value = value.trim();
    value.chars().count() <= IDENTIFIER_MAX_CHARS && !value.contains('\n')
}
