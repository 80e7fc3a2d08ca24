//! The module loader: walk the candidate list until one source yields a
//! working engine.
//!
//! ## Why strictly sequential?
//!
//! Candidates are ordered by preference (fast CDN first, local copy last).
//! Probing them concurrently would download payloads we then throw away and
//! would make "which source won" depend on network timing. Each probe and
//! initialisation is awaited before the next one starts.
//!
//! ## Which error escapes?
//!
//! Probe failures only mean "not here, try the next one" and are never
//! reported as the final error. Initialisation failures are remembered; when
//! the list runs out the most recent one is returned, so the user sees the
//! last real problem rather than a generic "nothing worked".

use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::LoaderConfig;
use crate::engine::{EngineFactory, EngineOptions, SourceProbe};
use crate::error::LoadError;
use crate::source::CandidateSource;
use crate::status::{emit, StatusKind};

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The probe reported the source unavailable; nothing was fetched.
    Unavailable { reason: String },
    /// The source was reachable but the engine failed to initialise.
    Failed { reason: String },
    /// The engine loaded from this source.
    Loaded,
}

/// One entry of a [`LoadReport`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceAttempt {
    /// 0-based position in the candidate list.
    pub index: usize,
    pub source: CandidateSource,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Per-candidate outcomes of a successful load, in attempt order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub attempts: Vec<SourceAttempt>,
    /// Wall-clock time of the whole loader run.
    pub duration_ms: u64,
}

impl LoadReport {
    /// Number of candidates skipped or failed before the winner.
    pub fn fallbacks(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome != AttemptOutcome::Loaded)
            .count()
    }
}

/// The loaded engine plus where it came from.
#[derive(Debug)]
pub struct EngineHandle<E> {
    engine: E,
    source: CandidateSource,
    index: usize,
    report: LoadReport,
}

impl<E> EngineHandle<E> {
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The candidate that produced this engine.
    pub fn source(&self) -> &CandidateSource {
        &self.source
    }

    /// Its 0-based position in the candidate list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}

/// Obtain a working engine from the first usable candidate in
/// `config.candidates`.
///
/// For each candidate, in order:
/// 1. emit a `Warning` status naming the module location;
/// 2. probe the module location (and the payload when
///    [`LoaderConfig::probe_payload`] is set), skipping the candidate on
///    failure;
/// 3. initialise the engine with multithreading disabled, returning on
///    success and recording the error otherwise.
///
/// # Errors
/// The last [`LoadError::InitializationFailure`] when the list is exhausted,
/// or [`LoadError::NoSourceAvailable`] if every candidate was skipped.
pub async fn load_engine<P, F>(
    config: &LoaderConfig,
    probe: &P,
    factory: &F,
) -> Result<EngineHandle<F::Engine>, LoadError>
where
    P: SourceProbe,
    F: EngineFactory,
{
    let start = Instant::now();
    let status = config.status_callback.as_ref();
    let options = EngineOptions {
        multithreading: false,
        log: config.engine_log,
    };

    let mut attempts = Vec::with_capacity(config.candidates.len());
    let mut last_error: Option<LoadError> = None;

    for (index, source) in config.candidates.iter().enumerate() {
        emit(
            status,
            &format!("Trying to load the engine from: {}", source.module),
            StatusKind::Warning,
        );

        if let Err(e) = probe_candidate(probe, source, config.probe_payload).await {
            warn!("Source not available: {} ({})", source.module, e);
            if let Some(cb) = status {
                cb.on_source_failed(index, source, &e);
            }
            attempts.push(SourceAttempt {
                index,
                source: source.clone(),
                outcome: AttemptOutcome::Unavailable {
                    reason: e.to_string(),
                },
            });
            continue;
        }

        match factory.initialize(source, &options).await {
            Ok(engine) => {
                attempts.push(SourceAttempt {
                    index,
                    source: source.clone(),
                    outcome: AttemptOutcome::Loaded,
                });
                emit(status, "Engine loaded successfully!", StatusKind::Success);

                let report = LoadReport {
                    attempts,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                info!(
                    "Engine loaded from source {} of {} in {}ms",
                    index + 1,
                    config.candidates.len(),
                    report.duration_ms
                );
                return Ok(EngineHandle {
                    engine,
                    source: source.clone(),
                    index,
                    report,
                });
            }
            Err(cause) => {
                let e = LoadError::InitializationFailure {
                    location: source.module.to_string(),
                    source: cause,
                };
                error!("{}", e);
                if let Some(cb) = status {
                    cb.on_source_failed(index, source, &e);
                }
                attempts.push(SourceAttempt {
                    index,
                    source: source.clone(),
                    outcome: AttemptOutcome::Failed {
                        reason: e.to_string(),
                    },
                });
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(LoadError::NoSourceAvailable {
        tried: config.candidates.len(),
    }))
}

async fn probe_candidate<P: SourceProbe>(
    probe: &P,
    source: &CandidateSource,
    probe_payload: bool,
) -> Result<(), LoadError> {
    probe.probe(&source.module).await?;
    if probe_payload {
        probe.probe(&source.payload).await?;
    }
    Ok(())
}
