//! # ffmpeg-auto
//!
//! Locate, download and cache prebuilt ffmpeg executables at runtime, so that
//! users of `vidtrim` do not need a system-wide ffmpeg install.
//!
//! ## Where the binaries come from
//!
//! The [`@ffmpeg-installer`](https://www.npmjs.com/org/ffmpeg-installer) npm
//! scope publishes one package per platform (`linux-x64`, `darwin-arm64`, …).
//! Each package contains two files this crate cares about:
//!
//! | File           | Role                                         |
//! |----------------|----------------------------------------------|
//! | `package.json` | module definition: package name and version |
//! | `ffmpeg`       | binary payload: the static executable        |
//!
//! npm packages are mirrored by several CDNs, which gives us a natural list
//! of fallbacks for the same pinned version:
//!
//! 1. `https://cdn.jsdelivr.net/npm/@ffmpeg-installer/{pkg}@{ver}/…`
//! 2. `https://unpkg.com/@ffmpeg-installer/{pkg}@{ver}/…`
//! 3. `./assets/ffmpeg/…` (manually downloaded copy)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ffmpeg_auto::{default_sources, detect_platform, download_bytes, install_executable, ffmpeg_cache_dir};
//!
//! let platform = detect_platform().expect("unsupported platform");
//! let sources = default_sources().expect("unsupported platform");
//! let bytes = download_bytes(&sources[0].payload, None).expect("download failed");
//! let dest = ffmpeg_cache_dir(&platform.npm_name(), platform.version).join(platform.executable);
//! install_executable(&bytes, &dest).expect("install failed");
//! ```
//!
//! ## Environment variable overrides
//!
//! - `FFMPEG_AUTO_CACHE_DIR`: override the default cache directory.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// npm scope publishing the per-platform ffmpeg packages.
pub const NPM_SCOPE: &str = "@ffmpeg-installer";

/// Name of the module-definition file inside each package.
pub const MANIFEST_FILE: &str = "package.json";

/// Relative folder holding a manually downloaded copy of the engine assets.
pub const LOCAL_ASSETS_DIR: &str = "assets/ffmpeg";

const JSDELIVR_BASE: &str = "https://cdn.jsdelivr.net/npm";
const UNPKG_BASE: &str = "https://unpkg.com";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by ffmpeg-auto operations.
#[derive(Error, Debug)]
pub enum FfmpegAutoError {
    /// The current OS/architecture combination has no published package.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Could not create or navigate the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// Writing the executable to disk failed.
    #[error("Failed to install ffmpeg to '{path}': {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Platform metadata ────────────────────────────────────────────────────────

/// The npm package that ships ffmpeg for one OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Package name inside [`NPM_SCOPE`], e.g. `linux-x64`.
    pub package: &'static str,
    /// Pinned package version.
    pub version: &'static str,
    /// Executable filename inside the package.
    pub executable: &'static str,
}

impl PlatformInfo {
    /// Fully scoped npm name, e.g. `@ffmpeg-installer/linux-x64`.
    pub fn npm_name(&self) -> String {
        format!("{NPM_SCOPE}/{}", self.package)
    }
}

/// Detect the package matching the running OS and architecture.
pub fn detect_platform() -> Result<PlatformInfo, FfmpegAutoError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_for(os: &str, arch: &str) -> Result<PlatformInfo, FfmpegAutoError> {
    let (package, version, executable) = match (os, arch) {
        ("linux", "x86_64") => ("linux-x64", "4.1.0", "ffmpeg"),
        ("linux", "x86") => ("linux-ia32", "4.1.0", "ffmpeg"),
        ("linux", "aarch64") => ("linux-arm64", "4.1.4", "ffmpeg"),
        ("linux", "arm") => ("linux-arm", "4.1.3", "ffmpeg"),
        ("macos", "x86_64") => ("darwin-x64", "4.1.0", "ffmpeg"),
        ("macos", "aarch64") => ("darwin-arm64", "4.1.5", "ffmpeg"),
        ("windows", "x86_64") => ("win32-x64", "4.1.0", "ffmpeg.exe"),
        ("windows", "x86") => ("win32-ia32", "4.1.0", "ffmpeg.exe"),
        (os, arch) => {
            return Err(FfmpegAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    Ok(PlatformInfo {
        package,
        version,
        executable,
    })
}

// ── Source locations ─────────────────────────────────────────────────────────

/// A (module definition, binary payload) location pair, as plain strings.
///
/// Remote entries are absolute URLs; the local entry is a relative path that
/// callers resolve against their own base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrls {
    pub module: String,
    pub payload: String,
}

/// CDN mirrors of the pinned package, in priority order.
pub fn mirror_sources(info: &PlatformInfo) -> Vec<SourceUrls> {
    [JSDELIVR_BASE, UNPKG_BASE]
        .iter()
        .map(|base| {
            let root = format!("{base}/{}@{}", info.npm_name(), info.version);
            SourceUrls {
                module: format!("{root}/{MANIFEST_FILE}"),
                payload: format!("{root}/{}", info.executable),
            }
        })
        .collect()
}

/// The local-folder fallback.
pub fn local_source(info: &PlatformInfo) -> SourceUrls {
    SourceUrls {
        module: format!("./{LOCAL_ASSETS_DIR}/{MANIFEST_FILE}"),
        payload: format!("./{LOCAL_ASSETS_DIR}/{}", info.executable),
    }
}

/// The full default list for the running platform: both mirrors, then the
/// local folder.
pub fn default_sources() -> Result<Vec<SourceUrls>, FfmpegAutoError> {
    let info = detect_platform()?;
    let mut sources = mirror_sources(&info);
    sources.push(local_source(&info));
    Ok(sources)
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the cache root holding one directory per engine package version.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/vidtrim/`
/// - **Linux**: `~/.cache/vidtrim/`
/// - **Windows**: `%LOCALAPPDATA%\vidtrim\`
///
/// Override by setting `FFMPEG_AUTO_CACHE_DIR`.
pub fn default_cache_root() -> PathBuf {
    if let Ok(override_dir) = std::env::var("FFMPEG_AUTO_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("vidtrim")
}

/// Returns the cache directory for one package version,
/// e.g. `~/.cache/vidtrim/ffmpeg-installer-linux-x64@4.1.0/`.
pub fn ffmpeg_cache_dir(package: &str, version: &str) -> PathBuf {
    cache_dir_in(&default_cache_root(), package, version)
}

/// The per-package, per-version directory under an explicit cache `root`.
///
/// Two packages that share a version never share a directory.
pub fn cache_dir_in(root: &Path, package: &str, version: &str) -> PathBuf {
    let package = package.trim_start_matches('@').replace('/', "-");
    root.join(format!(
        "{}@{}",
        sanitize_segment(&package),
        sanitize_segment(version)
    ))
}

/// Keep names from a remote manifest safe to use as a path segment.
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Returns the cached executable for `package@version` under `root`, or
/// `None` if not cached yet.
pub fn cached_executable(
    root: &Path,
    package: &str,
    version: &str,
    executable: &str,
) -> Option<PathBuf> {
    let p = cache_dir_in(root, package, version).join(executable);
    p.is_file().then_some(p)
}

// ── Download & install ───────────────────────────────────────────────────────

/// Upper bound on what a declared `Content-Length` may reserve up front.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Bytes to reserve before the first read. The declared length is only a
/// hint and is capped; an unknown length reserves nothing.
fn initial_capacity(content_length: Option<u64>) -> usize {
    content_length.unwrap_or(0).min(MAX_PREALLOC) as usize
}

/// Streams a URL into a `Vec<u8>`, calling `on_progress` every 64 KiB.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)`.
pub fn download_bytes(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, FfmpegAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("ffmpeg-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| FfmpegAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| FfmpegAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(FfmpegAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(initial_capacity(total));

    let mut stream = response;
    let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
    let mut downloaded: u64 = 0;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(FfmpegAutoError::Download(format!("Read error: {e}")));
            }
        }
    }

    if buf.is_empty() {
        return Err(FfmpegAutoError::Download(format!("Empty body for {url}")));
    }

    Ok(buf)
}

/// Writes `bytes` to `dest` as an executable file.
///
/// The file is written next to `dest` first and renamed into place, so an
/// interrupted install never leaves a truncated executable in the cache.
pub fn install_executable(bytes: &[u8], dest: &Path) -> Result<(), FfmpegAutoError> {
    let install_err = |source: std::io::Error| FfmpegAutoError::Install {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(FfmpegAutoError::CacheDir)?;
    }

    let tmp = dest.with_extension("part");
    {
        let mut f = std::fs::File::create(&tmp).map_err(install_err)?;
        f.write_all(bytes).map_err(install_err)?;
        f.sync_all().map_err(install_err)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))
            .map_err(install_err)?;
    }

    std::fs::rename(&tmp, dest).map_err(install_err)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
