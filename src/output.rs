//! The trimmed clip handed back to the caller.

use std::path::Path;

use base64::Engine as _;
use serde::Serialize;

use crate::error::ProcessingError;

/// MIME type of every trimmed clip.
pub const OUTPUT_MIME: &str = "video/mp4";

/// Suggested file name when the caller has none.
pub const DOWNLOAD_NAME: &str = "trimmed.mp4";

/// Output of one processing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrimmedVideo {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: &'static str,
}

impl TrimmedVideo {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: OUTPUT_MIME,
            file_name: DOWNLOAD_NAME,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:video/mp4;base64,…`, ready to drop into a `<video src>`.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Write the clip to `path`.
    ///
    /// Uses atomic write (temp file + rename) so an interrupted save never
    /// leaves a truncated video behind.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ProcessingError> {
        let path = path.as_ref();
        let write_err = |source: std::io::Error| ProcessingError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("mp4.tmp");
        tokio::fs::write(&tmp_path, &self.bytes)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
    }
}
