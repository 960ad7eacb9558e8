use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HlsError {
    #[error("invalid tile id: {0}")]
    InvalidTile(String),

    #[error("invalid band: {0}")]
    InvalidBand(String),

    #[error("invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("incomplete request: {0}")]
    #[diagnostic(help("pass it on the command line or set it in hls-fetch.json"))]
    MissingParameter(String),

    #[error("Earthdata credentials not available: {0}")]
    #[diagnostic(help(
        "set EARTHDATA_USERNAME and EARTHDATA_PASSWORD, or run without --non-interactive to be prompted"
    ))]
    MissingCredentials(String),

    #[error("failed to read credentials from terminal: {0}")]
    CredentialPrompt(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    #[diagnostic(help("the catalog may be down; re-run later, files already fetched are kept"))]
    CatalogStatus { status: u16, message: String },

    #[error("failed to parse catalog response: {0}")]
    CatalogParse(String),

    #[error("download failed: {0}")]
    TransferHttp(String),

    #[error("download returned status {status}: {message}")]
    TransferStatus { status: u16, message: String },

    #[error("incomplete transfer: expected {expected} bytes, received {received}")]
    IncompleteTransfer { expected: u64, received: u64 },

    #[error("download cancelled")]
    Cancelled,

    #[error("cannot derive a filename from url: {0}")]
    InvalidFilename(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl HlsError {
    /// Errors that mean the catalog could not be searched at all.
    pub fn is_catalog_unavailable(&self) -> bool {
        matches!(
            self,
            HlsError::CatalogHttp(_) | HlsError::CatalogStatus { .. } | HlsError::CatalogParse(_)
        )
    }
}
