//! Workbook normalization
//!
//! Turns raw workbook bytes into a [`WorkbookSnapshot`]:
//! - sheet order follows the workbook
//! - the first `banner_rows` rows of each sheet are dropped, and the next
//!   non-blank row becomes the header
//! - sheets left without columns or data rows are dropped
//!
//! Schemas are not unified across sheets.

use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Range, Reader};
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{debug, info, warn};

use super::{CategorySheet, CellValue, Row, WorkbookSnapshot};
use crate::error::{CatalogError, Result};

/// Parse workbook bytes into a snapshot stamped with `fetched_at`
pub fn normalize(
    bytes: &[u8],
    fetched_at: DateTime<Utc>,
    banner_rows: usize,
) -> Result<WorkbookSnapshot> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| CatalogError::Format(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_owned();
    let mut categories = Vec::with_capacity(sheet_names.len());

    for sheet_name in sheet_names {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                warn!("Skipping unreadable sheet '{}': {}", sheet_name, e);
                continue;
            }
        };

        match normalize_sheet(&sheet_name, &range, banner_rows) {
            Some(sheet) => {
                debug!(
                    "Sheet '{}': {} columns, {} rows",
                    sheet.name,
                    sheet.columns.len(),
                    sheet.rows.len()
                );
                categories.push(sheet);
            }
            None => debug!("Dropping sheet '{}': no columns or no data rows", sheet_name),
        }
    }

    if categories.is_empty() {
        return Err(CatalogError::EmptyWorkbook);
    }

    info!("Normalized workbook into {} categories", categories.len());
    Ok(WorkbookSnapshot {
        fetched_at,
        categories,
    })
}

fn normalize_sheet(name: &str, range: &Range<Data>, banner_rows: usize) -> Option<CategorySheet> {
    // calamine ranges start at the first used cell, not at A1
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows = range
        .rows()
        .enumerate()
        .filter(|(i, _)| start_row + i >= banner_rows)
        .map(|(_, cells)| cells.iter().map(cell_value).collect::<Vec<_>>())
        .skip_while(|cells| cells.iter().all(CellValue::is_absent));

    let header = rows.next()?;
    let data: Vec<Vec<CellValue>> = rows
        .filter(|cells| !cells.iter().all(CellValue::is_absent))
        .collect();

    let columns = header_columns(&header, &data, start_col);
    if columns.is_empty() || data.is_empty() {
        return None;
    }

    let rows = data
        .into_iter()
        .map(|mut cells| {
            columns
                .iter()
                .map(|(idx, column)| {
                    let cell = cells
                        .get_mut(*idx)
                        .map(|c| std::mem::replace(c, CellValue::Absent))
                        .unwrap_or(CellValue::Absent);
                    (column.clone(), cell)
                })
                .collect::<Row>()
        })
        .collect();

    Some(CategorySheet {
        name: name.to_string(),
        columns: columns.into_iter().map(|(_, column)| column).collect(),
        rows,
    })
}

/// Pick the columns to keep as `(cell index, unique name)` pairs.
///
/// Blank headers over empty columns are dropped; blank headers over populated
/// columns become `Unnamed: <n>`. Repeated names get `.1`, `.2`, ... suffixes.
fn header_columns(
    header: &[CellValue],
    data: &[Vec<CellValue>],
    start_col: usize,
) -> Vec<(usize, String)> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();

    for (idx, cell) in header.iter().enumerate() {
        let label = cell.to_string().trim().to_string();
        let base = if label.is_empty() {
            let populated = data
                .iter()
                .any(|row| row.get(idx).is_some_and(|c| !c.is_absent()));
            if !populated {
                continue;
            }
            format!("Unnamed: {}", start_col + idx)
        } else {
            label
        };

        let mut column = base.clone();
        let mut suffix = 0;
        while !seen.insert(column.clone()) {
            suffix += 1;
            column = format!("{base}.{suffix}");
        }
        columns.push((idx, column));
    }

    columns
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Absent,
        Data::String(s) if s.is_empty() => CellValue::Absent,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::DateTime(dt) => CellValue::Text(excel_datetime_text(dt)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Bool(_) | Data::Error(_) => CellValue::Text(cell.to_string()),
    }
}

/// Displayed form of a date, datetime or duration cell.
///
/// Dates at midnight print as `%Y-%m-%d`; durations print as `h:mm:ss` with
/// unbounded hours, like Excel's `[h]:mm:ss`.
fn excel_datetime_text(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        if let Some(duration) = dt.as_duration() {
            let total = duration.num_seconds();
            let sign = if total < 0 { "-" } else { "" };
            let total = total.abs();
            return format!(
                "{sign}{}:{:02}:{:02}",
                total / 3600,
                total % 3600 / 60,
                total % 60
            );
        }
    } else if let Some(datetime) = dt.as_datetime() {
        return if datetime.num_seconds_from_midnight() == 0 {
            datetime.format("%Y-%m-%d").to_string()
        } else {
            datetime.format("%Y-%m-%d %H:%M:%S").to_string()
        };
    }
    dt.as_f64().to_string()
}
