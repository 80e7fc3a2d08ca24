//! CLI binary for vidtrim.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `LoaderConfig`, drives one `Session` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vidtrim::{
    CandidateSource, EngineInfo, InputFile, LoadError, LoadReport, LoaderConfig, Session,
    StatusCallback, StatusHandle, StatusKind, DOWNLOAD_NAME,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI status callback using indicatif ──────────────────────────────────────

/// Terminal status callback: a spinner carrying the current status line,
/// which turns into a byte counter while the engine payload downloads.
///
/// Without a spinner (`--no-progress`) status lines are left to the tracing
/// output and only alerts and the remediation checklist are printed.
struct CliStatusCallback {
    bar: Option<ProgressBar>,
    downloading: AtomicBool,
}

impl CliStatusCallback {
    fn new(show_progress: bool) -> Arc<Self> {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.set_prefix("Engine");
            bar.set_message("Starting…");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self {
            bar,
            downloading: AtomicBool::new(false),
        })
    }

    fn line(&self, msg: String) {
        match &self.bar {
            Some(bar) => bar.println(msg),
            None => eprintln!("{msg}"),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  \
         [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS)
}

impl StatusCallback for CliStatusCallback {
    fn on_status(&self, message: &str, kind: StatusKind) {
        let Some(bar) = &self.bar else { return };
        if kind != StatusKind::Warning && self.downloading.swap(false, Ordering::SeqCst) {
            bar.set_style(spinner_style());
            bar.set_prefix("Engine");
        }
        match kind {
            StatusKind::Info | StatusKind::Warning => bar.set_message(message.to_string()),
            StatusKind::Success => bar.println(format!("{} {}", green("✓"), message)),
            StatusKind::Error => bar.println(format!("{} {}", red("✗"), message)),
        }
    }

    fn on_alert(&self, message: &str) {
        self.line(format!("{} {}", yellow("!"), bold(message)));
    }

    fn on_source_failed(&self, index: usize, source: &CandidateSource, error: &LoadError) {
        if self.bar.is_none() {
            return;
        }
        let reason = match error {
            LoadError::ProbeFailure { reason, .. } => format!("not available ({reason})"),
            other => other.to_string(),
        };
        self.line(format!(
            "  {} source {}  {}  {}",
            red("✗"),
            index + 1,
            source.module,
            dim(&reason)
        ));
    }

    fn on_remediation(&self, steps: &[String]) {
        self.line(bold("Possible solutions:"));
        for (i, step) in steps.iter().enumerate() {
            self.line(format!("  {}. {}", i + 1, step));
        }
    }

    fn on_download_progress(&self, downloaded: u64, total: Option<u64>) {
        let Some(bar) = &self.bar else { return };
        if !self.downloading.swap(true, Ordering::SeqCst) {
            bar.set_style(download_style());
            bar.set_prefix("Downloading");
            bar.reset_eta();
        }
        if let Some(t) = total {
            if bar.length() != Some(t) {
                bar.set_length(t);
            }
        }
        bar.set_position(downloaded);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Keep the first 10 seconds (writes trimmed.mp4)
  vidtrim holiday.mp4

  # Choose the output file
  vidtrim holiday.mp4 -o clip.mp4

  # Only check that an engine source works
  vidtrim --check --json

  # Use a mirror you control, then the bundled copy
  vidtrim --source https://mirror.example.com/ffmpeg/package.json=https://mirror.example.com/ffmpeg/ffmpeg \
          --source ./assets/ffmpeg/package.json=./assets/ffmpeg/ffmpeg holiday.mp4

  # Print the clip as a data: URL for a <video> tag
  vidtrim holiday.mp4 --data-url > clip.txt

ENGINE SOURCES:
  Without --source, vidtrim tries in order:
    1. cdn.jsdelivr.net   @ffmpeg-installer/<platform>
    2. unpkg.com          @ffmpeg-installer/<platform>
    3. ./assets/ffmpeg/   package.json + ffmpeg (relative to --assets-dir)
  The first source that answers and yields a working ffmpeg wins.

ENVIRONMENT VARIABLES:
  VIDTRIM_SOURCES         Comma-separated MODULE=PAYLOAD pairs
  VIDTRIM_ASSETS_DIR      Base directory for relative local sources
  FFMPEG_AUTO_CACHE_DIR   Override the engine cache directory
  RUST_LOG                Override the log filter
"#;

/// Trim the first 10 seconds of a video with a runtime-loaded ffmpeg.
#[derive(Parser, Debug)]
#[command(
    name = "vidtrim",
    version,
    about = "Trim the first 10 seconds of a video with a runtime-loaded ffmpeg",
    long_about = "Loads an ffmpeg engine from the first working source in an ordered fallback \
list (two CDN mirrors, then a local assets folder) and uses it to keep the first 10 seconds of \
a video. Streams are copied, never re-encoded.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Video file to trim.
    input: Option<PathBuf>,

    /// Where to write the trimmed clip [default: trimmed.mp4].
    #[arg(short, long, env = "VIDTRIM_OUTPUT")]
    output: Option<PathBuf>,

    /// Engine source as MODULE=PAYLOAD; repeat to build a fallback list.
    #[arg(
        long = "source",
        value_name = "MODULE=PAYLOAD",
        env = "VIDTRIM_SOURCES",
        value_delimiter = ','
    )]
    sources: Vec<String>,

    /// Base directory for relative local sources.
    #[arg(long, env = "VIDTRIM_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    /// Also probe each payload location before initialising.
    #[arg(long, env = "VIDTRIM_PROBE_PAYLOAD")]
    probe_payload: bool,

    /// Timeout for each availability probe, in seconds.
    #[arg(long, env = "VIDTRIM_PROBE_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    probe_timeout: Option<u64>,

    /// Load the engine and stop; no video is processed.
    #[arg(long)]
    check: bool,

    /// Print the clip as a `data:` URL on stdout.
    #[arg(long, env = "VIDTRIM_DATA_URL")]
    data_url: bool,

    /// Print a JSON summary (engine, load report, output) on stdout.
    #[arg(long, env = "VIDTRIM_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs, including ffmpeg's own output.
    #[arg(short, long, env = "VIDTRIM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "VIDTRIM_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "VIDTRIM_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    source_index: usize,
    source: &'a CandidateSource,
    engine: &'a EngineInfo,
    report: &'a LoadReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<OutputSummary>,
}

#[derive(Serialize)]
struct OutputSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    bytes: usize,
    mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; it shows
    // the same status lines.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config & load ──────────────────────────────────────────────
    let status = (!cli.quiet).then(|| CliStatusCallback::new(show_progress));
    let config = build_config(
        &cli,
        status.clone().map(|cb| cb as Arc<dyn StatusCallback>),
    )?;

    let mut session = Session::with_defaults(config).context("Failed to set up the engine loader")?;
    let loaded = session.on_ready().await;
    if let Some(cb) = &status {
        cb.finish();
    }
    loaded.context("Failed to load the ffmpeg engine")?;

    if cli.check {
        print_summary(&cli, &session, None)?;
        return Ok(());
    }

    // ── Process ──────────────────────────────────────────────────────────
    let clip = session
        .on_triggered(cli.input.clone().map(InputFile::Path))
        .await
        .context("Processing failed")?;

    let path = if cli.data_url && cli.output.is_none() {
        None
    } else {
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DOWNLOAD_NAME));
        clip.save_to(&path)
            .await
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Some(path)
    };

    let data_url = cli.data_url.then(|| clip.to_data_url());
    if let (Some(url), false) = (&data_url, cli.json) {
        println!("{url}");
    }

    print_summary(
        &cli,
        &session,
        Some(OutputSummary {
            path,
            bytes: clip.len(),
            mime_type: clip.mime_type,
            data_url: data_url.filter(|_| cli.json),
        }),
    )
}

/// Map CLI args to `LoaderConfig`.
fn build_config(cli: &Cli, status: Option<StatusHandle>) -> Result<LoaderConfig> {
    let mut builder = LoaderConfig::builder()
        .probe_payload(cli.probe_payload)
        .engine_log(cli.verbose);

    if let Some(dir) = &cli.assets_dir {
        builder = builder.base_dir(dir);
    }
    if let Some(secs) = cli.probe_timeout {
        builder = builder.probe_timeout_secs(secs);
    }
    if !cli.sources.is_empty() {
        let candidates = cli
            .sources
            .iter()
            .map(|s| CandidateSource::parse_pair(s))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid --source")?;
        builder = builder.candidates(candidates);
    }
    if let Some(cb) = status {
        builder = builder.status_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary<P, F>(cli: &Cli, session: &Session<P, F>, output: Option<OutputSummary>) -> Result<()>
where
    P: vidtrim::SourceProbe,
    F: vidtrim::EngineFactory<Engine = vidtrim::FfmpegEngine>,
{
    let handle = session
        .handle()
        .context("Engine handle missing after a successful load")?;
    let info = handle.engine().info();

    if cli.json {
        let summary = RunSummary {
            source_index: handle.index(),
            source: handle.source(),
            engine: info,
            report: handle.report(),
            output,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    eprintln!(
        "{}  ffmpeg {}  from source {}/{}  {}ms",
        green("✔"),
        info.version,
        handle.index() + 1,
        session.config().candidates.len(),
        handle.report().duration_ms,
    );
    eprintln!("   {}", dim(&handle.source().module.to_string()));
    if let Some(out) = output {
        match out.path {
            Some(path) => eprintln!(
                "{}  {} bytes  →  {}",
                green("✔"),
                out.bytes,
                bold(&path.display().to_string())
            ),
            None => eprintln!("{}  {} bytes  →  data URL on stdout", green("✔"), out.bytes),
        }
    }
    Ok(())
}
