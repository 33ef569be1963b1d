//! Error types for portal access, usage decoding and caching.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Errors raised by the portal session, the usage decoder and the month cache.
///
/// Nothing in the crate retries on any of these; they propagate to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Network or HTTP failure talking to the portal.
    Transport { message: String },
    /// Markup or CSV could not be interpreted.
    Format { message: String },
    /// Records were decoded but could not be written to the cache directory.
    CachePersist { path: PathBuf, message: String },
    /// The portal rejected the supplied credentials.
    InvalidCredentials,
    /// A data call was made on a session that never authenticated.
    NotAuthenticated,
    /// Caller-supplied value was rejected before any I/O.
    InvalidInput { message: String },
}

impl Error {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { message } => write!(f, "transport error: {}", message),
            Self::Format { message } => write!(f, "format error: {}", message),
            Self::CachePersist { path, message } => {
                write!(
                    f,
                    "failed to persist cache file {}: {}",
                    path.display(),
                    message
                )
            }
            Self::InvalidCredentials => write!(f, "portal rejected the supplied credentials"),
            Self::NotAuthenticated => write!(f, "session is not authenticated"),
            Self::InvalidInput { message } => write!(f, "invalid input: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Self::Transport {
            message: e.to_string(),
        }
    }
}

/// Result type for portal, decoder and cache operations.
pub type Result<T> = std::result::Result<T, Error>;
