//! Candidate sources: where the engine's module definition and binary payload
//! may be loaded from.
//!
//! A [`Location`] is either a remote URL or a local path. Relative local
//! paths (the `./assets/ffmpeg/…` fallback) are resolved against a base
//! directory once, when the [`crate::config::LoaderConfig`] is built, so the
//! loader never depends on the process working directory.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Serialize;

use crate::error::LoadError;

/// One place an engine asset can be read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "lowercase")]
pub enum Location {
    /// An `http://` or `https://` URL.
    Remote(#[serde(serialize_with = "serialize_url")] Url),
    /// A filesystem path.
    Local(PathBuf),
}

fn serialize_url<S: serde::Serializer>(url: &Url, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(url.as_str())
}

impl Location {
    /// Parse a user-supplied string.
    ///
    /// `http(s)://` becomes [`Location::Remote`], `file://` and anything
    /// without a scheme becomes [`Location::Local`].
    pub fn parse(input: &str) -> Result<Self, LoadError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LoadError::InvalidConfig("empty source location".into()));
        }

        if is_url(input) {
            let url = Url::parse(input).map_err(|e| {
                LoadError::InvalidConfig(format!("invalid source URL '{input}': {e}"))
            })?;
            return Ok(Location::Remote(url));
        }

        if input.starts_with("file://") {
            let url = Url::parse(input).map_err(|e| {
                LoadError::InvalidConfig(format!("invalid file URL '{input}': {e}"))
            })?;
            let path = url.to_file_path().map_err(|_| {
                LoadError::InvalidConfig(format!("file URL '{input}' has no local path"))
            })?;
            return Ok(Location::Local(path));
        }

        Ok(Location::Local(PathBuf::from(input)))
    }

    /// Anchor a relative local path at `base`. Remote and absolute locations
    /// are returned unchanged.
    pub fn resolve_against(self, base: &Path) -> Self {
        match self {
            Location::Local(p) if p.is_relative() => Location::Local(base.join(p)),
            other => other,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    /// Final path segment, used to name cached assets.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Location::Remote(url) => url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Location::Local(p) => p.file_name().map(|n| n.to_string_lossy().into_owned()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Remote(url) => f.write_str(url.as_str()),
            Location::Local(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Check if the input string looks like an HTTP URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// An ordered (module definition, binary payload) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSource {
    pub module: Location,
    pub payload: Location,
}

impl CandidateSource {
    pub fn new(module: Location, payload: Location) -> Self {
        Self { module, payload }
    }

    /// Parse both halves of a pair.
    pub fn parse(module: &str, payload: &str) -> Result<Self, LoadError> {
        Ok(Self::new(Location::parse(module)?, Location::parse(payload)?))
    }

    /// Parse the CLI form `MODULE=PAYLOAD`.
    pub fn parse_pair(pair: &str) -> Result<Self, LoadError> {
        // Split on the first `=` that is followed by a location, so query
        // strings in the module URL survive.
        let split = pair
            .match_indices('=')
            .map(|(i, _)| i)
            .find(|&i| looks_like_location(&pair[i + 1..]))
            .or_else(|| pair.find('='))
            .ok_or_else(|| {
                LoadError::InvalidConfig(format!(
                    "source '{pair}' must have the form MODULE=PAYLOAD"
                ))
            })?;
        Self::parse(&pair[..split], &pair[split + 1..])
    }

    pub fn resolve_against(self, base: &Path) -> Self {
        Self {
            module: self.module.resolve_against(base),
            payload: self.payload.resolve_against(base),
        }
    }
}

fn looks_like_location(s: &str) -> bool {
    is_url(s)
        || s.starts_with("file://")
        || s.starts_with('.')
        || s.starts_with('/')
        || s.starts_with('~')
        || Path::new(s).is_absolute()
}

/// The built-in fallback list for the running platform.
///
/// Two CDN mirrors of the pinned engine release, then the local assets
/// folder. The local entry stays relative until resolved by the config.
pub fn default_candidates() -> Result<Vec<CandidateSource>, LoadError> {
    let sources = ffmpeg_auto::default_sources()
        .map_err(|e| LoadError::InvalidConfig(e.to_string()))?;
    sources
        .iter()
        .map(|s| CandidateSource::parse(&s.module, &s.payload))
        .collect()
}

/// `true` when fetching from `url` happens over a secure channel: HTTPS, or
/// any scheme on a loopback host.
pub fn is_secure_origin(url: &Url) -> bool {
    if url.scheme() == "https" {
        return true;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Remote candidate locations that would be fetched over an insecure channel.
pub fn insecure_locations(candidates: &[CandidateSource]) -> Vec<&Location> {
    candidates
        .iter()
        .flat_map(|c| [&c.module, &c.payload])
        .filter(|l| matches!(l, Location::Remote(url) if !is_secure_origin(url)))
        .collect()
}
