//! Metadata-only availability checks.
//!
//! Remote locations get an HTTP `HEAD`; local ones a `metadata()` call. No
//! body is ever transferred here, the factory does the real fetch.

use std::time::Duration;

use tracing::debug;

use crate::engine::SourceProbe;
use crate::error::LoadError;
use crate::source::Location;

/// Probe backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Build a probe. `timeout_secs = None` waits indefinitely, matching the
    /// loader's default of never timing out a probe.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, LoadError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("vidtrim/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5));
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| LoadError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Reuse an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl SourceProbe for HttpProbe {
    async fn probe(&self, location: &Location) -> Result<(), LoadError> {
        let failure = |reason: String| LoadError::ProbeFailure {
            location: location.to_string(),
            reason,
        };

        match location {
            Location::Remote(url) => {
                let response = self
                    .client
                    .head(url.clone())
                    .send()
                    .await
                    .map_err(|e| failure(e.to_string()))?;
                debug!("HEAD {} → {}", url, response.status());
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(failure(format!("HTTP {}", response.status())))
                }
            }
            Location::Local(path) => {
                let meta = tokio::fs::metadata(path)
                    .await
                    .map_err(|e| failure(e.to_string()))?;
                if meta.is_file() {
                    Ok(())
                } else {
                    Err(failure("not a regular file".into()))
                }
            }
        }
    }
}
