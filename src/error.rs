//! Errors surfaced to the user at the session boundary.
//!
//! Everything below this boundary uses `anyhow::Result`. Per-frame inference
//! failures and transient reads never become a `SessionError`; the worker
//! absorbs them.

use thiserror::Error;

/// A detector profile could not be loaded.
#[derive(Debug, Error)]
#[error("failed to load detector '{label}' from {resource}: {error:#}")]
pub struct ModelLoadError {
    pub label: String,
    pub resource: String,
    #[source]
    pub error: anyhow::Error,
}

/// A capture source could not be opened for reading.
#[derive(Debug, Error)]
#[error("failed to open source {source_label}: {error:#}")]
pub struct SourceOpenError {
    pub source_label: String,
    #[source]
    pub error: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no source selected")]
    NoSourceSelected,
    #[error("unknown detector profile '{0}'")]
    UnknownProfile(String),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    SourceOpen(#[from] SourceOpenError),
    #[error("failed to spawn capture worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}
