//! Error taxonomy for the catalog core
//!
//! Every failure the core can surface maps onto one variant here. The type is
//! `Clone` because a single in-flight fetch may hand its outcome to many
//! waiters at once.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// Network failure, timeout or non-success status.
    ///
    /// `transient` marks failures the fetcher is allowed to retry.
    #[error("Transport error fetching {url}: {message}")]
    Transport {
        url: String,
        message: String,
        status: Option<u16>,
        transient: bool,
    },

    /// The host answered but refused the request (401/403/407).
    #[error("Authorization error fetching {url}: HTTP {status}")]
    Authorization { url: String, status: u16 },

    /// The downloaded bytes are not a readable workbook.
    #[error("Workbook format error: {0}")]
    Format(String),

    /// Every sheet was dropped during normalization.
    #[error("Workbook contains no usable sheets")]
    EmptyWorkbook,

    /// A query named a category the current snapshot does not have.
    #[error("Category '{0}' not found")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A background computation panicked or was cancelled by the runtime.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub(crate) fn transport(url: &str, message: impl Into<String>, transient: bool) -> Self {
        CatalogError::Transport {
            url: url.to_string(),
            message: message.into(),
            status: None,
            transient,
        }
    }

    pub(crate) fn status(url: &str, status: u16, transient: bool) -> Self {
        CatalogError::Transport {
            url: url.to_string(),
            message: format!("HTTP {status}"),
            status: Some(status),
            transient,
        }
    }

    /// Whether the fetcher may retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Transport { transient: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
