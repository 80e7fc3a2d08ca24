//! The native ffmpeg backend.
//!
//! A candidate's module definition is the `package.json` of an
//! `@ffmpeg-installer/<platform>` npm package; its payload is the `ffmpeg`
//! executable shipped inside that package.
//!
//! ## Why a scratch directory per run?
//!
//! The engine API works on a flat in-memory filesystem so callers never deal
//! with paths. Native ffmpeg needs real files, so [`FfmpegEngine::run`]
//! materialises the store into a fresh temporary directory, runs ffmpeg with
//! that directory as its working directory, and absorbs the results. Nothing
//! outlives the call except what ends up in the store.
//!
//! ## Why `spawn_blocking` for downloads?
//!
//! The payload download reuses `ffmpeg_auto::download_bytes`, which is built
//! on `reqwest::blocking`. Blocking clients must not run on Tokio worker
//! threads, so the download and install happen on the blocking pool.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::engine::{Engine, EngineFactory, EngineOptions, MemFs};
use crate::error::{EngineError, LoadError};
use crate::source::{CandidateSource, Location};
use crate::status::StatusHandle;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^ffmpeg version (\S+)").unwrap());

/// Lines of ffmpeg stderr kept in [`EngineError::CommandFailed`].
const STDERR_TAIL_LINES: usize = 12;

// ── Manifest ─────────────────────────────────────────────────────────────────

/// The fields of `package.json` the loader relies on.
#[derive(Debug, Clone, Deserialize)]
struct EngineManifest {
    name: String,
    version: String,
}

fn parse_manifest(bytes: &[u8], location: &Location) -> Result<EngineManifest, EngineError> {
    let invalid = |reason: String| EngineError::Manifest {
        location: location.to_string(),
        reason,
    };

    let manifest: EngineManifest =
        serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;

    if !manifest.name.contains("ffmpeg") {
        return Err(invalid(format!(
            "package '{}' does not provide ffmpeg",
            manifest.name
        )));
    }
    if manifest.version.trim().is_empty() {
        return Err(invalid("missing package version".into()));
    }
    Ok(manifest)
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// What was actually loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    /// Path of the executable that passed the self-check.
    pub executable: PathBuf,
    /// Version reported by `ffmpeg -version`.
    pub version: String,
    /// npm package named by the module definition.
    pub package: String,
    /// Version of that package.
    pub package_version: String,
}

/// Loads [`FfmpegEngine`]s from npm-style candidate sources.
#[derive(Clone)]
pub struct FfmpegFactory {
    client: reqwest::Client,
    cache_root: PathBuf,
    status: Option<StatusHandle>,
}

impl FfmpegFactory {
    /// `cache_root = None` uses [`ffmpeg_auto::default_cache_root`].
    pub fn new(cache_root: Option<PathBuf>, status: Option<StatusHandle>) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vidtrim/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| LoadError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            cache_root: cache_root.unwrap_or_else(ffmpeg_auto::default_cache_root),
            status,
        })
    }

    pub fn from_config(config: &LoaderConfig) -> Result<Self, LoadError> {
        Self::new(config.cache_dir.clone(), config.status_callback.clone())
    }

    async fn fetch_module(&self, location: &Location) -> Result<Vec<u8>, EngineError> {
        let fetch_err = |reason: String| EngineError::Fetch {
            location: location.to_string(),
            reason,
        };
        match location {
            Location::Remote(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| fetch_err(e.to_string()))?;
                let body = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
                Ok(body.to_vec())
            }
            Location::Local(path) => tokio::fs::read(path)
                .await
                .map_err(|e| fetch_err(e.to_string())),
        }
    }

    /// Download `url` into `dest` on the blocking pool.
    async fn download_payload(&self, url: &reqwest::Url, dest: &Path) -> Result<(), EngineError> {
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let status = self.status.clone();

        info!("Downloading engine payload from {}", url);
        tokio::task::spawn_blocking(move || {
            let progress: &dyn Fn(u64, Option<u64>) = &|done: u64, total: Option<u64>| {
                if let Some(cb) = &status {
                    cb.on_download_progress(done, total);
                }
            };
            let bytes = ffmpeg_auto::download_bytes(&url, Some(progress)).map_err(|e| {
                EngineError::Fetch {
                    location: url.clone(),
                    reason: e.to_string(),
                }
            })?;
            ffmpeg_auto::install_executable(&bytes, &dest)
                .map_err(|e| EngineError::Install(e.to_string()))
        })
        .await
        .map_err(|e| EngineError::Internal(format!("Download task panicked: {}", e)))?
    }

    /// Cached path for a remote payload, downloading it if needed.
    ///
    /// The cache is keyed on the manifest's package name and version.
    ///
    /// Returns the path and whether it came from the cache.
    async fn remote_payload(
        &self,
        url: &reqwest::Url,
        payload: &Location,
        manifest: &EngineManifest,
    ) -> Result<(PathBuf, bool), EngineError> {
        let executable = payload.file_name().unwrap_or_else(|| "ffmpeg".to_string());

        if let Some(path) = ffmpeg_auto::cached_executable(
            &self.cache_root,
            &manifest.name,
            &manifest.version,
            &executable,
        ) {
            debug!("Using cached engine payload: {}", path.display());
            return Ok((path, true));
        }

        let dest = ffmpeg_auto::cache_dir_in(&self.cache_root, &manifest.name, &manifest.version)
            .join(&executable);
        self.download_payload(url, &dest).await?;
        Ok((dest, false))
    }
}

impl EngineFactory for FfmpegFactory {
    type Engine = FfmpegEngine;

    async fn initialize(
        &self,
        source: &CandidateSource,
        options: &EngineOptions,
    ) -> Result<FfmpegEngine, EngineError> {
        let bytes = self.fetch_module(&source.module).await?;
        let manifest = parse_manifest(&bytes, &source.module)?;
        debug!("Module definition: {} {}", manifest.name, manifest.version);

        let (executable, version) = match &source.payload {
            Location::Local(path) => {
                let version = verify_executable(path).await?;
                (path.clone(), version)
            }
            Location::Remote(url) => {
                let (path, cached) = self.remote_payload(url, &source.payload, &manifest).await?;
                match verify_executable(&path).await {
                    Ok(version) => (path, version),
                    Err(e) if cached => {
                        warn!("Cached engine failed its self-check ({}), re-downloading", e);
                        self.download_payload(url, &path).await?;
                        let version = verify_executable(&path).await?;
                        (path, version)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        info!("ffmpeg {} ready at {}", version, executable.display());
        let info = EngineInfo {
            executable: executable.clone(),
            version,
            package: manifest.name,
            package_version: manifest.version,
        };
        Ok(FfmpegEngine::new(executable, info, *options))
    }
}

/// Run `ffmpeg -version` and extract the reported version.
async fn verify_executable(path: &Path) -> Result<String, EngineError> {
    let output = Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| EngineError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    match VERSION_RE.captures(&stdout) {
        Some(caps) if output.status.success() => Ok(caps[1].to_string()),
        _ => Err(EngineError::Verify {
            path: path.to_path_buf(),
            detail: format!(
                "`-version` exited with {} and no version banner",
                output.status
            ),
        }),
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// A verified ffmpeg executable plus its virtual filesystem.
#[derive(Debug)]
pub struct FfmpegEngine {
    executable: PathBuf,
    info: EngineInfo,
    options: EngineOptions,
    fs: MemFs,
}

impl FfmpegEngine {
    pub fn new(executable: PathBuf, info: EngineInfo, options: EngineOptions) -> Self {
        Self {
            executable,
            info,
            options,
            fs: MemFs::new(),
        }
    }

    pub fn info(&self) -> &EngineInfo {
        &self.info
    }

    pub fn fs(&self) -> &MemFs {
        &self.fs
    }

    /// Flags prepended to every command.
    fn global_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-loglevel"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(if self.options.log { "info" } else { "error" }.to_string());
        if !self.options.multithreading {
            args.extend(["-threads".to_string(), "1".to_string()]);
        }
        args
    }
}

impl Engine for FfmpegEngine {
    fn write_file(&mut self, name: &str, data: Vec<u8>) -> Result<(), EngineError> {
        self.fs.write(name, data)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.fs.read(name)
    }

    async fn run(&mut self, args: &[String]) -> Result<(), EngineError> {
        let scratch = tempfile::tempdir()?;
        self.fs.materialize(scratch.path()).await?;

        debug!("ffmpeg {}", args.join(" "));
        let output = Command::new(&self.executable)
            .args(self.global_args())
            .args(args)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                path: self.executable.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if self.options.log {
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                debug!(target: "vidtrim::engine", "{}", line);
            }
        }

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                status: output.status.to_string(),
                stderr: stderr_tail(&stderr),
            });
        }

        self.fs.absorb(scratch.path()).await
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
