//! The processing trigger: one fixed trim operation against a loaded engine.
//!
//! ```text
//! bytes ─▶ write input.mp4 ─▶ run -i input.mp4 -t 10 -c copy output.mp4
//!                                    ─▶ read output.mp4 ─▶ TrimmedVideo
//! ```
//!
//! Codecs are stream-copied, so the cut lands on the nearest keyframe and no
//! quality is lost. A clip shorter than the window comes back whole; the
//! duration check is left to the engine.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::ProcessingError;
use crate::loader::EngineHandle;
use crate::output::TrimmedVideo;

/// Name of the input in the engine's virtual filesystem.
pub const INPUT_NAME: &str = "input.mp4";

/// Name the engine writes the trimmed clip to.
pub const OUTPUT_NAME: &str = "output.mp4";

/// Length of the kept window, in seconds, as passed to `-t`.
pub const TRIM_SECONDS: &str = "10";

/// The exact argument list of the trim command.
pub fn trim_args() -> Vec<String> {
    ["-i", INPUT_NAME, "-t", TRIM_SECONDS, "-c", "copy", OUTPUT_NAME]
        .into_iter()
        .map(String::from)
        .collect()
}

/// The file the user selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFile {
    /// Read from disk when the trigger fires.
    Path(PathBuf),
    /// Already in memory.
    Bytes { name: String, data: Vec<u8> },
}

impl InputFile {
    /// Display name for logs.
    pub fn name(&self) -> String {
        match self {
            InputFile::Path(p) => p.display().to_string(),
            InputFile::Bytes { name, .. } => name.clone(),
        }
    }

    pub async fn into_bytes(self) -> Result<Vec<u8>, ProcessingError> {
        match self {
            InputFile::Path(path) => tokio::fs::read(&path)
                .await
                .map_err(|source| ProcessingError::ReadInput { path, source }),
            InputFile::Bytes { data, .. } => Ok(data),
        }
    }
}

impl From<PathBuf> for InputFile {
    fn from(path: PathBuf) -> Self {
        InputFile::Path(path)
    }
}

/// Trim `input` to its first ten seconds using the loaded engine.
///
/// Exactly one write, one run and one read are issued against the engine.
///
/// # Errors
/// [`ProcessingError::ProcessingFailure`] wrapping whatever the engine
/// reported. Nothing is returned on failure.
pub async fn process<E: Engine>(
    handle: &mut EngineHandle<E>,
    input: Vec<u8>,
) -> Result<TrimmedVideo, ProcessingError> {
    let engine = handle.engine_mut();
    debug!("Staging {} bytes as {}", input.len(), INPUT_NAME);

    engine
        .write_file(INPUT_NAME, input)
        .map_err(ProcessingError::ProcessingFailure)?;
    engine
        .run(&trim_args())
        .await
        .map_err(ProcessingError::ProcessingFailure)?;
    let bytes = engine
        .read_file(OUTPUT_NAME)
        .map_err(ProcessingError::ProcessingFailure)?;

    info!("Trimmed clip ready ({} bytes)", bytes.len());
    Ok(TrimmedVideo::new(bytes))
}
