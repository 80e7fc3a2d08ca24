//! Engine abstraction and the ffmpeg backend.
//!
//! The library never talks to ffmpeg directly; it goes through three seams:
//!
//! | Trait              | Role                                                  |
//! |--------------------|-------------------------------------------------------|
//! | [`SourceProbe`]    | cheap existence check for a [`Location`]              |
//! | [`EngineFactory`]  | build a ready [`Engine`] from a [`CandidateSource`]   |
//! | [`Engine`]         | virtual filesystem + one command runner               |
//!
//! Production code uses [`HttpProbe`] and [`FfmpegFactory`]; tests plug in
//! recording fakes to observe exactly which calls were made.

pub mod ffmpeg;
pub mod probe;
pub mod vfs;

#[cfg(test)]
pub(crate) mod test_server;

use std::future::Future;

use serde::Serialize;

use crate::error::{EngineError, LoadError};
use crate::source::{CandidateSource, Location};

pub use ffmpeg::{EngineInfo, FfmpegEngine, FfmpegFactory};
pub use probe::HttpProbe;
pub use vfs::MemFs;

/// Options passed to [`EngineFactory::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineOptions {
    /// Allow the engine to use worker threads. The loader always sets this to
    /// `false`.
    pub multithreading: bool,

    /// Forward the engine's own log output to `tracing` at DEBUG level.
    pub log: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            multithreading: false,
            log: true,
        }
    }
}

/// A loaded media engine.
///
/// Files live in an in-memory virtual filesystem owned by the engine; the
/// command runner only sees names from that filesystem.
pub trait Engine: Send {
    /// Store `data` under `name`, replacing any previous entry.
    fn write_file(&mut self, name: &str, data: Vec<u8>) -> Result<(), EngineError>;

    /// Copy out the entry stored under `name`.
    fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Run one command. `args` excludes the program name.
    fn run(&mut self, args: &[String]) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// Builds engines from candidate sources.
pub trait EngineFactory: Send + Sync {
    type Engine: Engine;

    /// Load the engine described by `source`. Any error makes the loader move
    /// on to the next candidate.
    fn initialize(
        &self,
        source: &CandidateSource,
        options: &EngineOptions,
    ) -> impl Future<Output = Result<Self::Engine, EngineError>> + Send;
}

/// Existence check for a single location.
pub trait SourceProbe: Send + Sync {
    /// `Ok(())` when the location looks available. Failures are reported as
    /// [`LoadError::ProbeFailure`].
    fn probe(&self, location: &Location) -> impl Future<Output = Result<(), LoadError>> + Send;
}
