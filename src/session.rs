//! Session controller: owns the engine handle and sequences the two entry
//! points.
//!
//! ```text
//!  Uninitialized ──on_ready──▶ Loading ──ok──▶ Ready ◀──────┐
//!                                 │              │          │
//!                                err      on_triggered   done/failed
//!                                 ▼              ▼          │
//!                            LoadFailed      Processing ────┘
//! ```
//!
//! `LoadFailed` is terminal: the trigger stays disabled for the lifetime of
//! the session. Exclusive `&mut self` access means at most one request is
//! ever in flight.

use serde::Serialize;
use tracing::{error, warn};

use crate::config::LoaderConfig;
use crate::engine::{EngineFactory, FfmpegFactory, HttpProbe, SourceProbe};
use crate::error::{remediation_steps, LoadError, ProcessingError};
use crate::loader::{load_engine, EngineHandle};
use crate::output::TrimmedVideo;
use crate::process::{process, InputFile};
use crate::source::insecure_locations;
use crate::status::{emit, StatusHandle, StatusKind};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Loading,
    Ready,
    Processing,
    LoadFailed,
}

/// One engine, loaded once, used for every request.
pub struct Session<P: SourceProbe, F: EngineFactory> {
    config: LoaderConfig,
    probe: P,
    factory: F,
    state: SessionState,
    handle: Option<EngineHandle<F::Engine>>,
    failure: Option<String>,
}

impl Session<HttpProbe, FfmpegFactory> {
    /// A session backed by real HTTP probes and the native ffmpeg factory.
    pub fn with_defaults(config: LoaderConfig) -> Result<Self, LoadError> {
        let probe = HttpProbe::new(config.probe_timeout_secs)?;
        let factory = FfmpegFactory::from_config(&config)?;
        Ok(Self::new(config, probe, factory))
    }
}

impl<P: SourceProbe, F: EngineFactory> Session<P, F> {
    pub fn new(config: LoaderConfig, probe: P, factory: F) -> Self {
        Self {
            config,
            probe,
            factory,
            state: SessionState::Uninitialized,
            handle: None,
            failure: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The loaded engine, once [`Self::on_ready`] has succeeded.
    pub fn handle(&self) -> Option<&EngineHandle<F::Engine>> {
        self.handle.as_ref()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn status(&self) -> Option<StatusHandle> {
        self.config.status_callback.clone()
    }

    /// Startup entry point: load the engine and arm the trigger.
    ///
    /// Calling it again after a success is a no-op. Calling it again after a
    /// failure returns [`LoadError::Disabled`] without loading.
    pub async fn on_ready(&mut self) -> Result<(), LoadError> {
        match self.state {
            SessionState::Ready | SessionState::Processing => return Ok(()),
            SessionState::LoadFailed => {
                return Err(LoadError::Disabled {
                    reason: self.failure.clone().unwrap_or_default(),
                })
            }
            SessionState::Uninitialized | SessionState::Loading => {}
        }

        let status = self.status();
        let insecure = insecure_locations(&self.config.candidates);
        if !insecure.is_empty() {
            for location in &insecure {
                warn!("Engine source is not served over HTTPS: {}", location);
            }
            emit(
                status.as_ref(),
                "Use HTTPS or localhost sources for better compatibility",
                StatusKind::Warning,
            );
        }

        self.state = SessionState::Loading;
        match load_engine(&self.config, &self.probe, &self.factory).await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::LoadFailed;
                self.failure = Some(e.to_string());
                emit(
                    status.as_ref(),
                    &format!("Critical failure: {e}"),
                    StatusKind::Error,
                );
                error!("Engine initialization failed: {}", e);
                if let Some(cb) = &status {
                    cb.on_remediation(&remediation_steps(&self.config.candidates));
                }
                Err(e)
            }
        }
    }

    /// Trigger entry point: trim `input` with the loaded engine.
    ///
    /// Guard failures raise an alert and leave the status line untouched;
    /// no engine call is made.
    pub async fn on_triggered(
        &mut self,
        input: Option<InputFile>,
    ) -> Result<TrimmedVideo, ProcessingError> {
        let status = self.status();

        if self.state != SessionState::Ready {
            return Err(alert(status.as_ref(), ProcessingError::NotReady));
        }
        let Some(input) = input else {
            return Err(alert(status.as_ref(), ProcessingError::NoInputSelected));
        };

        emit(status.as_ref(), "Processing video...", StatusKind::Warning);
        self.state = SessionState::Processing;

        let result = match input.into_bytes().await {
            Ok(bytes) => match self.handle.as_mut() {
                Some(handle) => process(handle, bytes).await,
                None => Err(ProcessingError::NotReady),
            },
            Err(e) => Err(e),
        };
        self.state = SessionState::Ready;

        match &result {
            Ok(_) => emit(
                status.as_ref(),
                "Processing finished successfully!",
                StatusKind::Success,
            ),
            Err(e) => {
                emit(
                    status.as_ref(),
                    &format!("Processing error: {e}"),
                    StatusKind::Error,
                );
                error!("Processing failed: {}", e);
            }
        }
        result
    }
}

fn alert(status: Option<&StatusHandle>, err: ProcessingError) -> ProcessingError {
    let message = err.to_string();
    warn!("{}", message);
    if let Some(cb) = status {
        cb.on_alert(&message);
    }
    err
}
