//! Error taxonomy for every stage of a query: local validation, catalog
//! fetches, agency-reported failures and transport problems.
//!
//! Agency-originated variants keep the body the Census API sent back in their
//! `detail` field, untouched. The API has no structured error codes, so that
//! sentence is usually the only actionable information.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CensusError>;

#[derive(Debug, Error)]
pub enum CensusError {
    /// The query broke a local rule and was never sent.
    #[error("invalid query: {0}")]
    Validation(String),

    /// The bulk `variables.json` download for a dataset/year failed.
    #[error("failed to fetch variable catalog for {dataset} {year}")]
    MetadataFetch {
        dataset: String,
        year: i32,
        #[source]
        source: Box<CensusError>,
    },

    #[error("unknown variable: {detail}")]
    UnknownVariable { detail: String },

    #[error("unsupported geography: {detail}")]
    UnsupportedGeography { detail: String },

    #[error("authentication failed: {detail}")]
    Authentication { detail: String },

    /// Network-level failure: DNS, connection reset, timeout.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        timed_out: bool,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A non-200 answer the classifier could not attribute to a narrower kind.
    #[error("census api returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("unexpected response payload: {0}")]
    Decode(String),

    #[error("cache i/o error: {0}")]
    Cache(#[from] std::io::Error),
}

impl CensusError {
    /// The agency's diagnostic text, when this error carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            CensusError::UnknownVariable { detail }
            | CensusError::UnsupportedGeography { detail }
            | CensusError::Authentication { detail }
            | CensusError::Api { detail, .. } => Some(detail),
            CensusError::MetadataFetch { source, .. } => source.detail(),
            _ => None,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CensusError::Validation(msg.into())
    }
}
