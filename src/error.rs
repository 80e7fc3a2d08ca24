//! Error types for the vidtrim library.
//!
//! Three error types follow the three phases of a session:
//!
//! * [`LoadError`]: resolving and initialising the engine. Probe and
//!   initialisation failures are **non-fatal** inside the loader (it falls
//!   back to the next candidate). Only the final outcome, the last
//!   initialisation failure or [`LoadError::NoSourceAvailable`], escapes
//!   [`crate::loader::load_engine`].
//!
//! * [`ProcessingError`]: running the trim operation on a loaded engine.
//!   The guard variants ([`ProcessingError::NotReady`],
//!   [`ProcessingError::NoInputSelected`]) are raised before any engine call.
//!
//! * [`EngineError`]: low-level failures reported by an engine backend
//!   such as a failed download or a missing virtual file.
//!   They are wrapped by the two types above.

use std::path::PathBuf;
use thiserror::Error;

use crate::source::{CandidateSource, Location};

/// Failures raised by an engine backend.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The module definition could not be parsed or describes another engine.
    #[error("Invalid engine manifest at '{location}': {reason}")]
    Manifest { location: String, reason: String },

    /// A module or payload location could not be read.
    #[error("Failed to fetch '{location}': {reason}")]
    Fetch { location: String, reason: String },

    /// The downloaded payload could not be written to the cache.
    #[error("Failed to install engine: {0}")]
    Install(String),

    /// The engine executable could not be started.
    #[error("Failed to start engine '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The executable started but did not identify itself as the engine.
    #[error("Engine at '{path}' failed its self-check: {detail}")]
    Verify { path: PathBuf, detail: String },

    /// The engine ran the command and exited unsuccessfully.
    #[error("Engine command failed ({status}): {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// A virtual filesystem lookup missed.
    #[error("File '{name}' not found in the engine's virtual filesystem")]
    FileNotFound { name: String },

    /// Staging files for a run failed.
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the engine loading phase.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A candidate's existence check failed or errored.
    #[error("Source not available: '{location}' ({reason})")]
    ProbeFailure { location: String, reason: String },

    /// The candidate was reachable but the engine could not be initialised.
    #[error("Failed to load the engine from '{location}': {source}")]
    InitializationFailure {
        location: String,
        #[source]
        source: EngineError,
    },

    /// Every candidate was skipped and no initialisation error was recorded.
    #[error("No engine source available ({tried} candidates tried)")]
    NoSourceAvailable { tried: usize },

    /// A previous load attempt failed; the session stays disabled.
    #[error("Engine loading failed earlier: {reason}\nRestart vidtrim to try again.")]
    Disabled { reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LoadError {
    /// `true` for per-candidate failures the loader recovers from by moving
    /// on to the next candidate.
    ///
    /// An initialisation failure still escapes the loader when it was the
    /// last one recorded before the list ran out.
    pub fn is_candidate_failure(&self) -> bool {
        matches!(
            self,
            LoadError::ProbeFailure { .. } | LoadError::InitializationFailure { .. }
        )
    }
}

/// Errors from the processing phase.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Triggered before the engine finished loading.
    #[error("The engine is not loaded. Wait for initialization to finish.")]
    NotReady,

    /// Triggered with no input file.
    #[error("Please select a video first!")]
    NoInputSelected,

    /// The selected input file could not be read.
    #[error("Failed to read input '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fixed trim operation failed inside the engine.
    #[error("Video processing failed: {0}")]
    ProcessingFailure(#[source] EngineError),

    /// The trimmed clip could not be saved.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build the user-facing checklist shown after the loader gives up.
///
/// Download links point at the first remote candidate so the user can fetch
/// the exact pinned engine by hand.
pub fn remediation_steps(candidates: &[CandidateSource]) -> Vec<String> {
    let mut steps = vec![
        "Check that this machine can reach the engine mirrors \
         (proxy, firewall or offline network)."
            .to_string(),
    ];

    let remote = candidates
        .iter()
        .find(|c| matches!(c.module, Location::Remote(_)));

    match remote {
        Some(c) => steps.push(format!(
            "Download the engine files manually:\n    • {}\n    • {}\n  \
             and place them in `{}/` (relative to --assets-dir).",
            c.module,
            c.payload,
            ffmpeg_auto::LOCAL_ASSETS_DIR
        )),
        None => steps.push(format!(
            "Place `{}` and the ffmpeg executable in `{}/` (relative to --assets-dir).",
            ffmpeg_auto::MANIFEST_FILE,
            ffmpeg_auto::LOCAL_ASSETS_DIR
        )),
    }

    steps.push("Update vidtrim to the latest version.".to_string());
    steps
}
