//! Configuration for loading the engine.
//!
//! All loader behaviour is controlled through [`LoaderConfig`], built via its
//! [`LoaderConfigBuilder`]. The builder resolves relative local sources
//! against [`LoaderConfig::base_dir`] at build time, so the loader itself
//! only ever sees absolute paths and URLs.

use std::fmt;
use std::path::PathBuf;

use crate::error::LoadError;
use crate::source::{default_candidates, CandidateSource};
use crate::status::StatusHandle;

/// Configuration for a [`crate::session::Session`] and
/// [`crate::loader::load_engine`].
///
/// # Example
/// ```rust
/// use vidtrim::{CandidateSource, LoaderConfig};
///
/// let config = LoaderConfig::builder()
///     .candidates(vec![CandidateSource::parse(
///         "./vendor/ffmpeg/package.json",
///         "./vendor/ffmpeg/ffmpeg",
///     ).unwrap()])
///     .probe_payload(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.candidates.len(), 1);
/// ```
#[derive(Clone)]
pub struct LoaderConfig {
    /// Candidate sources in priority order. Default: the two CDN mirrors of
    /// the pinned engine, then `./assets/ffmpeg/`.
    pub candidates: Vec<CandidateSource>,

    /// Directory relative local sources are resolved against. Default: the
    /// current working directory.
    pub base_dir: PathBuf,

    /// Cache root for downloaded engine payloads. Default:
    /// [`ffmpeg_auto::default_cache_root`].
    pub cache_dir: Option<PathBuf>,

    /// Probe the payload location as well as the module definition. Default: false.
    ///
    /// Off by default: a candidate whose payload is missing still fails, just
    /// one step later, during initialisation.
    pub probe_payload: bool,

    /// Timeout for each availability probe in seconds. Default: None (wait
    /// indefinitely).
    pub probe_timeout_secs: Option<u64>,

    /// Forward the engine's own log output to `tracing`. Default: true.
    pub engine_log: bool,

    /// Receives status updates, alerts and download progress.
    pub status_callback: Option<StatusHandle>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let candidates = default_candidates()
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.resolve_against(&base_dir))
            .collect();
        Self {
            candidates,
            base_dir,
            cache_dir: None,
            probe_payload: false,
            probe_timeout_secs: None,
            engine_log: true,
            status_callback: None,
        }
    }
}

impl fmt::Debug for LoaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("candidates", &self.candidates)
            .field("base_dir", &self.base_dir)
            .field("cache_dir", &self.cache_dir)
            .field("probe_payload", &self.probe_payload)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("engine_log", &self.engine_log)
            .field(
                "status_callback",
                &self.status_callback.as_ref().map(|_| "<dyn StatusCallback>"),
            )
            .finish()
    }
}

impl LoaderConfig {
    /// Create a new builder for `LoaderConfig`.
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder {
            config: Self::default(),
            candidates: None,
        }
    }
}

/// Builder for [`LoaderConfig`].
#[derive(Debug)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
    /// Explicit candidates; `None` keeps the platform defaults.
    candidates: Option<Vec<CandidateSource>>,
}

impl LoaderConfigBuilder {
    /// Replace the default candidate list.
    pub fn candidates(mut self, candidates: Vec<CandidateSource>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Append one candidate. The first call discards the defaults.
    pub fn candidate(mut self, candidate: CandidateSource) -> Self {
        self.candidates.get_or_insert_with(Vec::new).push(candidate);
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = dir.into();
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn probe_payload(mut self, v: bool) -> Self {
        self.config.probe_payload = v;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = Some(secs);
        self
    }

    pub fn engine_log(mut self, v: bool) -> Self {
        self.config.engine_log = v;
        self
    }

    pub fn status_callback(mut self, cb: StatusHandle) -> Self {
        self.config.status_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<LoaderConfig, LoadError> {
        let mut config = self.config;

        let candidates = match self.candidates {
            Some(list) => list,
            None => default_candidates()?,
        };
        config.candidates = candidates
            .into_iter()
            .map(|c| c.resolve_against(&config.base_dir))
            .collect();

        if config.candidates.is_empty() {
            return Err(LoadError::InvalidConfig(
                "at least one candidate source is required".into(),
            ));
        }
        if config.probe_timeout_secs == Some(0) {
            return Err(LoadError::InvalidConfig(
                "probe timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(config)
    }
}
