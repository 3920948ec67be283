//! # Error Taxonomy
//!
//! Library operations return [`DiscoveryError`]. The variants follow how each
//! failure is treated by the pipeline:
//!
//! - [`DiscoveryError::Data`]: the persisted corpus is missing or malformed.
//!   Fatal at startup.
//! - [`DiscoveryError::UnknownGenre`] / [`DiscoveryError::UnknownArtist`]: the
//!   request cannot be served ("no recommendations possible"), the process
//!   keeps running.
//! - [`DiscoveryError::InsufficientData`]: a genre too small for percentile
//!   math. The threshold calculator absorbs it with a widened band.
//! - [`DiscoveryError::ExternalLookup`]: wraps a [`LookupFailure`]. The
//!   resolver turns these into empty results before they reach a caller.
//! - [`DiscoveryError::InvalidParameter`]: rejected before any work starts.
//!
//! The binary wraps these in `anyhow::Error` with extra context.

use thiserror::Error;

/// Result alias used across the library modules.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Corpus input is empty, malformed or contains invalid values.
    #[error("corpus data error: {0}")]
    Data(String),

    #[error("genre '{0}' is not present in the artist corpus")]
    UnknownGenre(String),

    /// The seed artist is neither in the corpus nor known to the metadata source.
    #[error("artist '{0}' is unknown, no recommendations possible")]
    UnknownArtist(String),

    #[error("not enough data for genre '{0}'")]
    InsufficientData(String),

    #[error("external lookup failed: {0}")]
    ExternalLookup(#[from] LookupFailure),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl DiscoveryError {
    /// Errors a caller can reasonably show as "try another artist" rather than abort.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownGenre(_) | Self::UnknownArtist(_) | Self::InsufficientData(_) | Self::ExternalLookup(_)
        )
    }
}

/// Failure reported by a [`crate::source::MetadataSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    #[error("lookup timed out after {0} ms")]
    Timeout(u64),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}
