//! Error types for registry access and reconciliation

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a [`crate::Registry`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The manifest or blob does not exist
    #[error("{reference} not found")]
    NotFound { reference: String },

    /// The registry answered with an unexpected status
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Token exchange or credential lookup failed
    #[error("authentication with {registry} failed: {message}")]
    Auth { registry: String, message: String },

    /// The request never produced a response
    #[error("request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        timed_out: bool,
    },

    /// The request deadline elapsed
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The response could not be understood
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    /// A digest string was not `sha256:` followed by 64 hex characters
    #[error("invalid digest '{value}'")]
    InvalidDigest { value: String },
}

impl RegistryError {
    /// HTTP status carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RegistryError::Status { status, .. } => Some(*status),
            RegistryError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether repeating the call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Status { status, .. } => {
                matches!(status, 408 | 425 | 429) || *status >= 500
            }
            RegistryError::Transport { .. } | RegistryError::Timeout { .. } => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    pub(crate) fn transport(url: &str, err: reqwest::Error) -> Self {
        RegistryError::Transport {
            url: url.to_string(),
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

/// Failure kinds of a reconciliation pass
///
/// The first three abort the image being processed and mark the run as
/// failed. The rest are logged and the pass moves on to the next registry,
/// except that a [`ReconcileError::RegistryUnavailable`] while resolving or
/// confirming the source also abandons the image.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileError {
    /// More than one digest in the base repository starts with the prefix
    #[error("{prefix} is not a unique digest prefix in {repository} ({matches} matches)")]
    AmbiguousPrefix {
        repository: String,
        prefix: String,
        matches: usize,
    },

    /// No digest in the base repository starts with the prefix
    #[error("{prefix} is not a valid digest prefix in {repository}")]
    PrefixNotFound { repository: String, prefix: String },

    /// The resolved digest is gone from the base repository
    #[error("could not retrieve {image}")]
    SourceDigestMissing { image: String },

    /// The source image could not be pulled when tagging
    #[error("unable to tag {destination}: source {source_image} can't be retrieved: {reason}")]
    SourceNotFound {
        source_image: String,
        destination: String,
        reason: String,
    },

    /// The destination registry refused the push
    #[error("push of {source_image} to {destination} rejected: {reason}")]
    PushRejected {
        source_image: String,
        destination: String,
        reason: String,
    },

    /// A read against a registry failed
    #[error("{registry} unavailable while {operation}: {reason}")]
    RegistryUnavailable {
        registry: String,
        operation: String,
        reason: String,
    },
}

impl ReconcileError {
    /// Configuration-level failures that must fail the run
    pub fn is_abort_class(&self) -> bool {
        matches!(
            self,
            ReconcileError::AmbiguousPrefix { .. }
                | ReconcileError::PrefixNotFound { .. }
                | ReconcileError::SourceDigestMissing { .. }
        )
    }

    /// Stable identifier used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::AmbiguousPrefix { .. } => "ambiguous_prefix",
            ReconcileError::PrefixNotFound { .. } => "prefix_not_found",
            ReconcileError::SourceDigestMissing { .. } => "source_digest_missing",
            ReconcileError::SourceNotFound { .. } => "source_not_found",
            ReconcileError::PushRejected { .. } => "push_rejected",
            ReconcileError::RegistryUnavailable { .. } => "registry_unavailable",
        }
    }
}
