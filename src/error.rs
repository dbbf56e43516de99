// src/error.rs

//! Error types for seed writing
//!
//! Errors fall into three classes, see [`ErrorClass`]:
//!
//! - **Protocol**: the driving program misused the writer (wrong call order,
//!   required fields left unset). Messages start with `internal error:`.
//! - **Validation**: the inputs cannot make a valid seed (bad channels,
//!   duplicate snaps, missing bases or providers, untrusted publishers).
//! - **Collaborator**: a fetcher, database, tree or copy failure, passed
//!   through with the phase it happened in.

use thiserror::Error;

use crate::channel::ChannelError;
use crate::model::ModelError;
use crate::snap::SnapType;

/// Broad classification of [`Error`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Protocol,
    Validation,
    Collaborator,
}

/// Seed writer errors
#[derive(Debug, Error)]
pub enum Error {
    /// A writer method was called out of sequence, or after a failed step
    #[error("internal error: {0}")]
    Protocol(String),

    /// The driving program broke a contract, or state is inconsistent
    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    InvalidOption(String),

    #[error("cannot use {what}: {source}")]
    InvalidChannel {
        what: String,
        #[source]
        source: ChannelError,
    },

    #[error(
        "option channel {channel:?} for {snap} has a track incompatible with the pinned track from model assertion: {track}"
    )]
    PinnedTrackMismatch {
        channel: String,
        snap: String,
        track: String,
    },

    #[error("snap {0:?} is repeated in the seed")]
    DuplicateSnap(String),

    #[error("{snap} has unexpected type: {actual}")]
    UnexpectedType { snap: String, actual: SnapType },

    #[error("{0}")]
    Confinement(String),

    #[error("cannot add snap {snap:?} without also adding its base {base:?} explicitly")]
    MissingBase { snap: String, base: String },

    #[error(
        "cannot use snap {snap:?} without its default content provider {provider:?} being added explicitly"
    )]
    MissingDefaultProvider { snap: String, provider: String },

    #[error("cannot use {kind} {snap:?} published by {publisher:?} for model by {brand:?}")]
    PublisherMismatch {
        kind: SnapType,
        snap: String,
        publisher: String,
        brand: String,
    },

    /// A rule of the image generation's policy was broken
    #[error("{0}")]
    Policy(String),

    #[error("{0}")]
    Unsupported(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to parse seed configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{phase}: {source:#}")]
    Collaborator {
        phase: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Wrap a collaborator failure with the phase it happened in
    pub fn collaborator(phase: &'static str, source: anyhow::Error) -> Self {
        Error::Collaborator { phase, source }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Protocol(_) | Error::Internal(_) => ErrorClass::Protocol,
            Error::Collaborator { .. } | Error::IoError(_) => ErrorClass::Collaborator,
            Error::InvalidOption(_)
            | Error::InvalidChannel { .. }
            | Error::PinnedTrackMismatch { .. }
            | Error::DuplicateSnap(_)
            | Error::UnexpectedType { .. }
            | Error::Confinement(_)
            | Error::MissingBase { .. }
            | Error::MissingDefaultProvider { .. }
            | Error::PublisherMismatch { .. }
            | Error::Policy(_)
            | Error::Unsupported(_)
            | Error::Model(_)
            | Error::Config(_) => ErrorClass::Validation,
        }
    }
}

/// Result type for seed operations
pub type Result<T> = std::result::Result<T, Error>;
