//! Shared error type for the crawler. Each variant belongs to one [ErrorKind] so callers
//! can tell a dead socket from upstream markup drift without matching every variant.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [CrawlerError].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket, timeout, TLS or body decoding failure. Never retried by the crawler.
    Transport,
    /// The site answered, but not with a 200 or not with the expected JSON shape.
    Protocol,
    /// An embedded-data marker was not found in a page; the markup changed upstream.
    Extraction,
    /// Writing or inspecting the dump directory failed.
    Filesystem,
    /// The crawler was used before it was ready (e.g. settings not loaded).
    State,
}

#[derive(Debug, Error)]
pub enum CrawlerError {
    // Transport
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("Could not decode {encoding} body from {url}: {source}")]
    Decode {
        url: String,
        encoding: String,
        source: std::io::Error,
    },

    // Protocol
    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Response body as lossy text, empty when the server sent none.
        body: String,
    },

    #[error("Unexpected JSON from {url}: {source}")]
    Payload {
        url: String,
        source: serde_json::Error,
    },

    // Extraction
    #[error("Could not locate {what} in page: marker {marker:?} not found. The page layout may have changed.")]
    Extraction { what: &'static str, marker: String },

    #[error("Could not parse embedded {what}: {source}")]
    ExtractionJson {
        what: &'static str,
        source: serde_json::Error,
    },

    // Filesystem
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    // State
    #[error("Site settings are not loaded. Call initialize() before resolving image links.")]
    SettingsNotLoaded,

    #[error("No image host known for bucket '{bucket}'.")]
    UnknownBucket { bucket: String },
}

impl CrawlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlerError::InvalidUrl { .. }
            | CrawlerError::Network { .. }
            | CrawlerError::Decode { .. } => ErrorKind::Transport,
            CrawlerError::HttpStatus { .. } | CrawlerError::Payload { .. } => ErrorKind::Protocol,
            CrawlerError::Extraction { .. } | CrawlerError::ExtractionJson { .. } => {
                ErrorKind::Extraction
            }
            CrawlerError::Filesystem { .. } => ErrorKind::Filesystem,
            CrawlerError::SettingsNotLoaded | CrawlerError::UnknownBucket { .. } => {
                ErrorKind::State
            }
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlerError::Filesystem {
            path: path.into(),
            source,
        }
    }
}
