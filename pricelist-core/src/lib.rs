//! Pricelist core - cached multi-category product catalog
//!
//! Fetches a published spreadsheet workbook, normalizes each sheet into a
//! category, and answers category lookups and substring searches.

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod search;
pub mod workbook;

pub use catalog::Catalog;
pub use classify::ColumnRole;
pub use config::{CatalogConfig, FetchConfig};
pub use error::{CatalogError, Result};
pub use search::{SearchQuery, SearchResult, SearchScope};
pub use workbook::{CategorySheet, CellValue, Row, WorkbookSnapshot};
