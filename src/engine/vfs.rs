//! In-memory virtual filesystem used to stage engine input and output.
//!
//! Native ffmpeg needs real paths, so a run materialises the store into a
//! scratch directory ([`MemFs::materialize`]) and absorbs whatever the command
//! produced afterwards ([`MemFs::absorb`]). Callers only ever see names.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::EngineError;

/// Flat name → bytes store. Names are single path segments.
#[derive(Debug, Default, Clone)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, name: &str, data: Vec<u8>) -> Result<(), EngineError> {
        validate_name(name)?;
        self.files.insert(name.to_string(), data);
        Ok(())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Write every entry into `dir`.
    pub async fn materialize(&self, dir: &Path) -> Result<(), EngineError> {
        for (name, data) in &self.files {
            tokio::fs::write(dir.join(name), data).await?;
        }
        Ok(())
    }

    /// Replace the store with the regular files found directly in `dir`.
    ///
    /// Entries deleted by the command disappear from the store too.
    pub async fn absorb(&mut self, dir: &Path) -> Result<(), EngineError> {
        let mut files = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let data = tokio::fs::read(entry.path()).await?;
            debug!("vfs: absorbed '{}' ({} bytes)", name, data.len());
            files.insert(name, data);
        }
        self.files = files;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), EngineError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(EngineError::Internal(format!(
            "invalid virtual file name '{name}'"
        )));
    }
    Ok(())
}
