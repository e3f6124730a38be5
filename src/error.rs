use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while downloading sites or building their Markdown
#[derive(Error, Debug)]
pub enum SlurpError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Fetching {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("No pages were downloaded for {0}")]
    EmptyResult(String),
    #[error("Failed to convert {url} to Markdown: {reason}")]
    Conversion { url: String, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SlurpError {
    pub(crate) fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        SlurpError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SlurpError>;
