//! # vidtrim
//!
//! Trim the first ten seconds of a video with an ffmpeg engine that is
//! fetched at runtime from an ordered list of fallback sources.
//!
//! ## Why load the engine at runtime?
//!
//! Shipping ffmpeg inside every build is heavy and ties the tool to one
//! platform binary. Instead each candidate source names a module definition
//! (the `package.json` of an `@ffmpeg-installer/<platform>` npm package) and
//! a binary payload (the `ffmpeg` executable in that package). The loader
//! tries two CDN mirrors, then a local `./assets/ffmpeg/` copy, and keeps the
//! first one that actually works. Downloads are cached on disk.
//!
//! ## Flow Overview
//!
//! ```text
//! Session::on_ready
//!  │
//!  ├─ 1. Check   warn about sources not served over HTTPS
//!  ├─ 2. Load    probe → initialise, candidate by candidate (sequential)
//!  └─ 3. Arm     keep the EngineHandle for the rest of the session
//!
//! Session::on_triggered(file)
//!  │
//!  ├─ 1. Guard   engine ready? file selected?
//!  ├─ 2. Stage   write input.mp4 into the engine's virtual filesystem
//!  ├─ 3. Run     -i input.mp4 -t 10 -c copy output.mp4
//!  └─ 4. Read    output.mp4 → TrimmedVideo
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vidtrim::{InputFile, LoaderConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoaderConfig::builder().build()?;
//!     let mut session = Session::with_defaults(config)?;
//!     session.on_ready().await?;
//!
//!     let clip = session
//!         .on_triggered(Some(InputFile::Path("holiday.mp4".into())))
//!         .await?;
//!     clip.save_to("holiday-first-10s.mp4").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vidtrim` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! vidtrim = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod output;
pub mod process;
pub mod session;
pub mod source;
pub mod status;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LoaderConfig, LoaderConfigBuilder};
pub use engine::{
    Engine, EngineFactory, EngineInfo, EngineOptions, FfmpegEngine, FfmpegFactory, HttpProbe,
    MemFs, SourceProbe,
};
pub use error::{remediation_steps, EngineError, LoadError, ProcessingError};
pub use loader::{load_engine, AttemptOutcome, EngineHandle, LoadReport, SourceAttempt};
pub use output::{TrimmedVideo, DOWNLOAD_NAME, OUTPUT_MIME};
pub use process::{process, trim_args, InputFile, INPUT_NAME, OUTPUT_NAME, TRIM_SECONDS};
pub use session::{Session, SessionState};
pub use source::{default_candidates, is_secure_origin, CandidateSource, Location};
pub use status::{NoopStatusCallback, StatusCallback, StatusHandle, StatusKind};
