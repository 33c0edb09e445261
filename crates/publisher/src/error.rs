//! Publish error taxonomy.

use thiserror::Error;

/// Result of a provider call.
pub type PublishResult<T> = Result<T, PublishError>;

/// Why a publish attempt did not produce a post.
///
/// Only [`PublishError::Transient`] is eligible for retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The request was rejected and resending it will not help.
    #[error("{message}")]
    Permanent {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Provider or local message.
        message: String,
    },

    /// Throttling, provider outage or network trouble.
    #[error("{message}")]
    Transient {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Provider or local message.
        message: String,
    },

    /// The content cannot be published on this provider.
    #[error("Invalid content: {0}")]
    InvalidContent(String),
}

impl PublishError {
    /// Permanent failure without an HTTP status.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            message: message.into(),
        }
    }

    /// Transient failure without an HTTP status.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            status: None,
            message: message.into(),
        }
    }

    /// Whether a retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// HTTP status of the failed response, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Permanent { status, .. } | Self::Transient { status, .. } => *status,
            Self::InvalidContent(_) => None,
        }
    }
}
