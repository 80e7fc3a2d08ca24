//! End-to-end tests for vidtrim.
//!
//! Most tests drive a full `Session` against recording mock engines, so
//! every probe, initialisation, write, run and read can be counted. They need
//! no network and no ffmpeg.
//!
//! The live tests at the bottom load a real engine from the default sources
//! and are gated behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Live tests:
//!   E2E_ENABLED=1 VIDTRIM_E2E_VIDEO=./clip.mp4 cargo test --test e2e live -- --nocapture

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use vidtrim::{
    load_engine, CandidateSource, Engine, EngineError, EngineFactory, EngineOptions, InputFile,
    LoadError, LoaderConfig, Location, ProcessingError, Session, SessionState, SourceProbe,
    StatusCallback, StatusKind,
};

// ── Recording mocks ──────────────────────────────────────────────────────────

/// Every call made against the mocks, in order.
#[derive(Debug, Default)]
struct Trace {
    probed: Vec<String>,
    initialized: Vec<String>,
    options: Vec<EngineOptions>,
    writes: Vec<(String, usize)>,
    runs: Vec<Vec<String>>,
    reads: Vec<String>,
}

type SharedTrace = Arc<Mutex<Trace>>;

#[derive(Debug)]
struct MockEngine {
    trace: SharedTrace,
    files: HashMap<String, Vec<u8>>,
    fail_run: bool,
}

impl Engine for MockEngine {
    fn write_file(&mut self, name: &str, data: Vec<u8>) -> Result<(), EngineError> {
        self.trace
            .lock()
            .unwrap()
            .writes
            .push((name.to_string(), data.len()));
        self.files.insert(name.to_string(), data);
        Ok(())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.trace.lock().unwrap().reads.push(name.to_string());
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn run(&mut self, args: &[String]) -> Result<(), EngineError> {
        self.trace.lock().unwrap().runs.push(args.to_vec());
        if self.fail_run {
            return Err(EngineError::CommandFailed {
                status: "exit status: 1".into(),
                stderr: "input.mp4: Invalid data found when processing input".into(),
            });
        }
        // Pretend to trim: copy the `-i` input to the last argument.
        let input = args
            .windows(2)
            .find(|w| w[0] == "-i")
            .map(|w| w[1].clone())
            .unwrap_or_default();
        let data = self.files.get(&input).cloned().unwrap_or_default();
        if let Some(out) = args.last() {
            self.files.insert(out.clone(), data);
        }
        Ok(())
    }
}

struct MockProbe {
    down: HashSet<String>,
    trace: SharedTrace,
}

impl SourceProbe for MockProbe {
    async fn probe(&self, location: &Location) -> Result<(), LoadError> {
        let key = location.to_string();
        self.trace.lock().unwrap().probed.push(key.clone());
        if self.down.contains(&key) {
            Err(LoadError::ProbeFailure {
                location: key,
                reason: "HTTP 404 Not Found".into(),
            })
        } else {
            Ok(())
        }
    }
}

struct MockFactory {
    broken: HashSet<String>,
    fail_run: bool,
    trace: SharedTrace,
}

impl EngineFactory for MockFactory {
    type Engine = MockEngine;

    async fn initialize(
        &self,
        source: &CandidateSource,
        options: &EngineOptions,
    ) -> Result<MockEngine, EngineError> {
        let key = source.module.to_string();
        {
            let mut trace = self.trace.lock().unwrap();
            trace.initialized.push(key.clone());
            trace.options.push(*options);
        }
        if self.broken.contains(&key) {
            return Err(EngineError::Fetch {
                location: key,
                reason: "connection reset".into(),
            });
        }
        Ok(MockEngine {
            trace: self.trace.clone(),
            files: HashMap::new(),
            fail_run: self.fail_run,
        })
    }
}

#[derive(Default)]
struct Recorder {
    statuses: Mutex<Vec<(String, StatusKind)>>,
    alerts: Mutex<Vec<String>>,
    failed_sources: Mutex<Vec<usize>>,
    remediation: Mutex<Vec<String>>,
}

impl StatusCallback for Recorder {
    fn on_status(&self, message: &str, kind: StatusKind) {
        self.statuses
            .lock()
            .unwrap()
            .push((message.to_string(), kind));
    }

    fn on_alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn on_source_failed(&self, index: usize, _source: &CandidateSource, _error: &LoadError) {
        self.failed_sources.lock().unwrap().push(index);
    }

    fn on_remediation(&self, steps: &[String]) {
        self.remediation
            .lock()
            .unwrap()
            .extend(steps.iter().cloned());
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Candidates `a`, `b`, … map to module `https://<name>.test/package.json`.
fn module(name: &str) -> String {
    format!("https://{name}.test/package.json")
}

struct Fixture {
    config: LoaderConfig,
    probe: MockProbe,
    factory: MockFactory,
    trace: SharedTrace,
    recorder: Arc<Recorder>,
}

fn fixture(names: &[&str], probe_down: &[&str], init_broken: &[&str]) -> Fixture {
    let trace = SharedTrace::default();
    let recorder = Arc::new(Recorder::default());
    let candidates = names
        .iter()
        .map(|n| CandidateSource::parse(&module(n), &format!("https://{n}.test/ffmpeg")).unwrap())
        .collect();
    let config = LoaderConfig::builder()
        .candidates(candidates)
        .status_callback(recorder.clone())
        .build()
        .unwrap();
    Fixture {
        config,
        probe: MockProbe {
            down: probe_down.iter().map(|n| module(n)).collect(),
            trace: trace.clone(),
        },
        factory: MockFactory {
            broken: init_broken.iter().map(|n| module(n)).collect(),
            fail_run: false,
            trace: trace.clone(),
        },
        trace,
        recorder,
    }
}

impl Fixture {
    fn session(self) -> (Session<MockProbe, MockFactory>, SharedTrace, Arc<Recorder>) {
        (
            Session::new(self.config, self.probe, self.factory),
            self.trace,
            self.recorder,
        )
    }
}

fn video(data: &[u8]) -> Option<InputFile> {
    Some(InputFile::Bytes {
        name: "holiday.mp4".into(),
        data: data.to_vec(),
    })
}

// ── Module loader ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_working_candidate_wins() {
    let fx = fixture(&["a", "b", "c"], &[], &[]);
    let handle = load_engine(&fx.config, &fx.probe, &fx.factory)
        .await
        .unwrap();

    assert_eq!(handle.index(), 0);
    assert_eq!(handle.source().module.to_string(), module("a"));
    let trace = fx.trace.lock().unwrap();
    assert_eq!(trace.probed, vec![module("a")]);
    assert_eq!(trace.initialized, vec![module("a")]);

    let statuses = fx.recorder.statuses.lock().unwrap();
    assert_eq!(
        *statuses,
        vec![
            (
                format!("Trying to load the engine from: {}", module("a")),
                StatusKind::Warning
            ),
            ("Engine loaded successfully!".to_string(), StatusKind::Success),
        ]
    );
}

#[tokio::test]
async fn test_all_probes_fail_is_no_source_available() {
    let fx = fixture(&["a", "b", "c"], &["a", "b", "c"], &[]);
    let err = load_engine(&fx.config, &fx.probe, &fx.factory)
        .await
        .unwrap_err();

    assert!(
        matches!(err, LoadError::NoSourceAvailable { tried: 3 }),
        "got: {err}"
    );
    assert!(fx.trace.lock().unwrap().initialized.is_empty());
}

#[tokio::test]
async fn test_all_inits_fail_returns_last_error() {
    let fx = fixture(&["a", "b", "c"], &[], &["a", "b", "c"]);
    let err = load_engine(&fx.config, &fx.probe, &fx.factory)
        .await
        .unwrap_err();

    match err {
        LoadError::InitializationFailure { location, source } => {
            assert_eq!(location, module("c"));
            assert!(matches!(source, EngineError::Fetch { .. }));
        }
        other => panic!("expected InitializationFailure, got {other}"),
    }
    assert_eq!(fx.trace.lock().unwrap().initialized.len(), 3);
}

#[tokio::test]
async fn test_probe_fail_then_init_fail_then_success() {
    let fx = fixture(&["a", "b", "c"], &["a"], &["b"]);
    let recorder = fx.recorder.clone();
    let (mut session, trace, _) = fx.session();

    session.on_ready().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let handle = session.handle().unwrap();
    assert_eq!(handle.index(), 2);
    assert_eq!(handle.source().module.to_string(), module("c"));

    // Only A and B are reported as failed sources.
    assert_eq!(*recorder.failed_sources.lock().unwrap(), vec![0, 1]);
    // A was never initialised; B and C were.
    assert_eq!(
        trace.lock().unwrap().initialized,
        vec![module("b"), module("c")]
    );
    assert!(recorder.remediation.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_two_probe_failures_is_no_source_available() {
    let fx = fixture(&["a", "b"], &["a", "b"], &[]);
    let recorder = fx.recorder.clone();
    let (mut session, _, _) = fx.session();

    let err = session.on_ready().await.unwrap_err();
    assert!(matches!(err, LoadError::NoSourceAvailable { tried: 2 }));
    assert_eq!(session.state(), SessionState::LoadFailed);

    let statuses = recorder.statuses.lock().unwrap();
    let (last, kind) = statuses.last().unwrap();
    assert_eq!(*kind, StatusKind::Error);
    assert!(last.starts_with("Critical failure:"), "got: {last}");

    // The checklist links the first remote candidate's files.
    let steps = recorder.remediation.lock().unwrap();
    assert_eq!(steps.len(), 3);
    assert!(steps[1].contains("https://a.test/ffmpeg"));
}

#[tokio::test]
async fn test_multithreading_is_always_disabled() {
    let fx = fixture(&["a", "b"], &[], &["a"]);
    load_engine(&fx.config, &fx.probe, &fx.factory)
        .await
        .unwrap();
    let trace = fx.trace.lock().unwrap();
    assert_eq!(trace.options.len(), 2);
    assert!(trace.options.iter().all(|o| !o.multithreading));
}

// ── Processing trigger ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_trigger_before_load_makes_no_engine_calls() {
    let (mut session, trace, recorder) = fixture(&["a"], &[], &[]).session();

    let err = session.on_triggered(video(b"frames")).await.unwrap_err();
    assert!(matches!(err, ProcessingError::NotReady));
    assert_eq!(
        *recorder.alerts.lock().unwrap(),
        vec!["The engine is not loaded. Wait for initialization to finish."]
    );

    let trace = trace.lock().unwrap();
    assert!(trace.writes.is_empty());
    assert!(trace.runs.is_empty());
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_trigger_without_file_leaves_status_unchanged() {
    let (mut session, trace, recorder) = fixture(&["a"], &[], &[]).session();
    session.on_ready().await.unwrap();
    let before = recorder.statuses.lock().unwrap().len();

    let err = session.on_triggered(None).await.unwrap_err();
    assert!(matches!(err, ProcessingError::NoInputSelected));
    assert_eq!(
        *recorder.alerts.lock().unwrap(),
        vec!["Please select a video first!"]
    );
    assert_eq!(recorder.statuses.lock().unwrap().len(), before);

    let trace = trace.lock().unwrap();
    assert!(trace.writes.is_empty());
    assert!(trace.runs.is_empty());
    assert!(trace.reads.is_empty());
}

#[tokio::test]
async fn test_trigger_runs_exact_trim_command() {
    let (mut session, trace, recorder) = fixture(&["a"], &[], &[]).session();
    session.on_ready().await.unwrap();

    let clip = session.on_triggered(video(b"frames")).await.unwrap();
    assert_eq!(clip.bytes, b"frames");
    assert_eq!(clip.mime_type, "video/mp4");
    assert_eq!(session.state(), SessionState::Ready);

    let trace = trace.lock().unwrap();
    assert_eq!(trace.writes, vec![("input.mp4".to_string(), 6)]);
    assert_eq!(
        trace.runs,
        vec![vec!["-i", "input.mp4", "-t", "10", "-c", "copy", "output.mp4"]]
    );
    assert_eq!(trace.reads, vec!["output.mp4"]);

    let statuses = recorder.statuses.lock().unwrap();
    let tail: Vec<_> = statuses.iter().rev().take(2).rev().cloned().collect();
    assert_eq!(
        tail,
        vec![
            ("Processing video...".to_string(), StatusKind::Warning),
            (
                "Processing finished successfully!".to_string(),
                StatusKind::Success
            ),
        ]
    );
}

#[tokio::test]
async fn test_short_clip_still_requests_ten_seconds() {
    let (mut session, trace, _) = fixture(&["a"], &[], &[]).session();
    session.on_ready().await.unwrap();

    // A 5-second clip: the duration check is the engine's business.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five-seconds.mp4");
    std::fs::write(&path, vec![7u8; 512]).unwrap();

    let clip = session
        .on_triggered(Some(InputFile::Path(path)))
        .await
        .unwrap();
    assert_eq!(clip.len(), 512);

    let trace = trace.lock().unwrap();
    let args = &trace.runs[0];
    let t = args.iter().position(|a| a == "-t").unwrap();
    assert_eq!(args[t + 1], "10");
}

#[tokio::test]
async fn test_engine_failure_reports_processing_error() {
    let mut fx = fixture(&["a"], &[], &[]);
    fx.factory.fail_run = true;
    let (mut session, trace, recorder) = fx.session();
    session.on_ready().await.unwrap();

    let err = session.on_triggered(video(b"garbage")).await.unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::ProcessingFailure(EngineError::CommandFailed { .. })
    ));
    assert_eq!(session.state(), SessionState::Ready);

    // Failed run: no output read back.
    assert!(trace.lock().unwrap().reads.is_empty());
    let statuses = recorder.statuses.lock().unwrap();
    let (last, kind) = statuses.last().unwrap();
    assert_eq!(*kind, StatusKind::Error);
    assert!(last.starts_with("Processing error:"), "got: {last}");
    assert!(last.contains("Invalid data found"), "got: {last}");
}

#[tokio::test]
async fn test_session_reuses_one_engine_across_requests() {
    let (mut session, trace, _) = fixture(&["a", "b"], &[], &[]).session();
    session.on_ready().await.unwrap();

    for i in 0..3u8 {
        let clip = session.on_triggered(video(&[i; 4])).await.unwrap();
        assert_eq!(clip.bytes, vec![i; 4]);
    }

    let trace = trace.lock().unwrap();
    assert_eq!(trace.initialized.len(), 1);
    assert_eq!(trace.runs.len(), 3);
}

#[tokio::test]
async fn test_trimmed_video_saves_to_disk() {
    let (mut session, _, _) = fixture(&["a"], &[], &[]).session();
    session.on_ready().await.unwrap();
    let clip = session.on_triggered(video(b"frames")).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("trimmed.mp4");
    clip.save_to(&out).await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"frames");
    assert!(clip.to_data_url().starts_with("data:video/mp4;base64,"));
}

// ── Type-level guarantees ────────────────────────────────────────────────────

#[test]
fn test_status_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<vidtrim::NoopStatusCallback>();
    assert_send_sync::<Recorder>();
    assert_send_sync::<LoaderConfig>();
}

#[tokio::test]
async fn test_callback_send_in_tokio_spawn() {
    let recorder = Arc::new(Recorder::default());
    let cb: vidtrim::StatusHandle = recorder.clone();
    tokio::spawn(async move {
        cb.on_status("from another task", StatusKind::Info);
    })
    .await
    .unwrap();
    assert_eq!(recorder.statuses.lock().unwrap().len(), 1);
}

// ── Live tests (E2E_ENABLED) ─────────────────────────────────────────────────

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter("vidtrim=debug")
            .with_test_writer()
            .try_init();
    }};
}

#[tokio::test]
async fn test_live_load_from_default_sources() {
    e2e_skip_unless_enabled!();

    let cache = tempfile::tempdir().unwrap();
    let config = LoaderConfig::builder()
        .cache_dir(cache.path())
        .build()
        .unwrap();
    let mut session = Session::with_defaults(config).unwrap();
    session.on_ready().await.unwrap();

    let handle = session.handle().unwrap();
    let info = handle.engine().info();
    println!(
        "loaded ffmpeg {} from source {} ({})",
        info.version,
        handle.index() + 1,
        handle.source().module
    );
    assert!(!info.version.is_empty());
    assert!(info.package.contains("ffmpeg"));
}

#[tokio::test]
async fn test_live_trim_real_video() {
    e2e_skip_unless_enabled!();
    let Some(path) = std::env::var_os("VIDTRIM_E2E_VIDEO").map(PathBuf::from) else {
        println!("SKIP — set VIDTRIM_E2E_VIDEO to a video file");
        return;
    };

    let mut session = Session::with_defaults(LoaderConfig::builder().build().unwrap()).unwrap();
    session.on_ready().await.unwrap();
    let clip = session
        .on_triggered(Some(InputFile::Path(path)))
        .await
        .unwrap();

    assert!(!clip.is_empty());
    // Every MP4 starts with an `ftyp` box.
    assert_eq!(&clip.bytes[4..8], b"ftyp");
}
