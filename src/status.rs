//! Status-callback trait for loader and processing events.
//!
//! Inject an [`Arc<dyn StatusCallback>`] via
//! [`crate::config::LoaderConfigBuilder::status_callback`] to receive
//! human-readable status updates, user alerts, per-source failures and engine
//! download progress. The CLI renders them with `indicatif`; a GUI could
//! forward them to a status label.
//!
//! Every status update is also logged through `tracing`, so a session without
//! a callback still leaves a readable trail at INFO level.
//!
//! # Example
//!
//! ```rust
//! use vidtrim::{StatusCallback, StatusKind, LoaderConfig};
//! use std::sync::{Arc, Mutex};
//!
//! struct Collect(Mutex<Vec<String>>);
//!
//! impl StatusCallback for Collect {
//!     fn on_status(&self, message: &str, kind: StatusKind) {
//!         self.0.lock().unwrap().push(format!("[{kind}] {message}"));
//!     }
//! }
//!
//! let config = LoaderConfig::builder()
//!     .status_callback(Arc::new(Collect(Mutex::new(Vec::new()))))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::LoadError;
use crate::source::CandidateSource;

/// Severity of a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    #[default]
    Info,
    Warning,
    Success,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusKind::Info => "info",
            StatusKind::Warning => "warning",
            StatusKind::Success => "success",
            StatusKind::Error => "error",
        })
    }
}

/// Receives session events.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait StatusCallback: Send + Sync {
    /// The status line changed. Replaces any previous status.
    fn on_status(&self, message: &str, kind: StatusKind) {
        let _ = (message, kind);
    }

    /// A blocking, user-facing alert. Unlike [`Self::on_status`] it leaves
    /// the status line as it was.
    fn on_alert(&self, message: &str) {
        let _ = message;
    }

    /// A candidate source was skipped (probe) or failed to initialise.
    ///
    /// # Arguments
    /// * `index`: 0-based position in the candidate list
    /// * `source`: the candidate
    /// * `error`: [`LoadError::ProbeFailure`] or [`LoadError::InitializationFailure`]
    fn on_source_failed(&self, index: usize, source: &CandidateSource, error: &LoadError) {
        let _ = (index, source, error);
    }

    /// Loading gave up; `steps` is the remediation checklist.
    fn on_remediation(&self, steps: &[String]) {
        let _ = steps;
    }

    /// Bytes received while downloading the engine payload.
    fn on_download_progress(&self, downloaded: u64, total: Option<u64>) {
        let _ = (downloaded, total);
    }
}

/// A no-op implementation for callers that don't need status events.
pub struct NoopStatusCallback;

impl StatusCallback for NoopStatusCallback {}

/// Convenience alias matching the type stored in [`crate::config::LoaderConfig`].
pub type StatusHandle = Arc<dyn StatusCallback>;

/// Log a status update and forward it to the callback, if any.
pub(crate) fn emit(callback: Option<&StatusHandle>, message: &str, kind: StatusKind) {
    info!("[{}] {}", kind, message);
    if let Some(cb) = callback {
        cb.on_status(message, kind);
    }
}
