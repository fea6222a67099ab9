//! CLI binary for sitepdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExportOptions` / `ExportConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sitepdf::{
    export_paths_with, ChromeLauncher, ChromeSettings, ExportConfig, ExportOptions,
    ExportProgressCallback, FailurePolicy, FileOutcome, ForwardMode, Length, LoadCondition, Margin,
    PaperFormat, ProgressCallback, SessionStrategy,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished file. Files finish out
/// of order, so start times are keyed by path.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<PathBuf, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` tells us how many files there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Exporting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, source: &Path) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(source))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting {total_files} files…"))
        ));
    }

    fn on_file_start(&self, source: &Path) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(source.to_path_buf(), Instant::now());
        }
        self.bar.set_message(source.display().to_string());
    }

    fn on_file_complete(&self, source: &Path, target: &Path, bytes: usize) {
        let secs = self.elapsed(source);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            target.display(),
            dim(&format!("{:>7} KB", bytes / 1024)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, source: &Path, error: &str) {
        let secs = self.elapsed(source);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 100 {
            let cut: String = error.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} PDFs written",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} PDFs written  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page of a built site, Letter with 1cm margins
  sitepdf dist --format Letter --margin 1cm

  # Options from the build script's JSON
  sitepdf dist --options pdf.json

  # A4 landscape, backgrounds on, different top margin
  sitepdf report.html --format A4 --margin 15mm --margin-top 25mm --landscape --print-background

  # One fresh browser per file, no cap, stop at the first failure
  sitepdf dist --format Letter --margin 1cm --fresh-browser --unbounded --fail-fast

  # Machine-readable report
  sitepdf dist --options pdf.json --json > report.json

OPTIONS FILE:
  { "format": "Letter",
    "margin": { "top": "1cm", "right": "1cm", "bottom": "1cm", "left": "1cm" } }

  Optional keys: "landscape", "printBackground", "scale". Flags given on the
  command line override the file.

PAPER FORMATS:
  Letter, Legal, Tabloid, Ledger, A0, A1, A2, A3, A4, A5, A6

LENGTHS:
  A number with an optional unit: px (default), in, cm, mm.

ENVIRONMENT VARIABLES:
  SITEPDF_CHROME      Path to Chrome/Chromium
  SITEPDF_NO_SANDBOX  Disable the Chrome sandbox (needed as root in containers)
  RUST_LOG            Override log filtering
"#;

/// Export HTML pages to PDF with headless Chrome.
#[derive(Parser, Debug)]
#[command(
    name = "sitepdf",
    version,
    about = "Export HTML pages to PDF with headless Chrome",
    long_about = "Render HTML files (or every .html file under a directory) with headless \
Chrome and write a paginated PDF beside each one, with the same name and a .pdf extension.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTML files and/or directories to search for .html files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON file with page options (format, margin, …).
    #[arg(long, env = "SITEPDF_OPTIONS")]
    options: Option<PathBuf>,

    /// Paper format: Letter, Legal, Tabloid, Ledger, A0–A6.
    #[arg(long, env = "SITEPDF_FORMAT")]
    format: Option<PaperFormat>,

    /// Margin on all four sides, e.g. 1cm, 0.5in, 10mm, 20.
    #[arg(long, env = "SITEPDF_MARGIN")]
    margin: Option<Length>,

    #[arg(long, env = "SITEPDF_MARGIN_TOP")]
    margin_top: Option<Length>,

    #[arg(long, env = "SITEPDF_MARGIN_RIGHT")]
    margin_right: Option<Length>,

    #[arg(long, env = "SITEPDF_MARGIN_BOTTOM")]
    margin_bottom: Option<Length>,

    #[arg(long, env = "SITEPDF_MARGIN_LEFT")]
    margin_left: Option<Length>,

    /// Landscape orientation.
    #[arg(long, env = "SITEPDF_LANDSCAPE")]
    landscape: bool,

    /// Print CSS backgrounds.
    #[arg(long, env = "SITEPDF_PRINT_BACKGROUND")]
    print_background: bool,

    /// Rendering scale (0.1–2.0).
    #[arg(long, env = "SITEPDF_SCALE")]
    scale: Option<f64>,

    /// Maximum number of browsers running at once.
    #[arg(long, env = "SITEPDF_SESSIONS", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..))]
    sessions: u16,

    /// No limit on concurrent browsers (overrides --sessions).
    #[arg(long, env = "SITEPDF_UNBOUNDED")]
    unbounded: bool,

    /// Start a new browser for every file instead of reusing them.
    #[arg(long, env = "SITEPDF_FRESH_BROWSER")]
    fresh_browser: bool,

    /// Forward records before their PDF is written.
    #[arg(long, env = "SITEPDF_FORWARD_IMMEDIATELY")]
    forward_immediately: bool,

    /// Stop at the first failure and exit non-zero.
    #[arg(long, env = "SITEPDF_FAIL_FAST")]
    fail_fast: bool,

    /// Page readiness condition awaited before printing.
    #[arg(long, env = "SITEPDF_WAIT_UNTIL", value_enum, default_value = "network-almost-idle")]
    wait_until: WaitArg,

    /// Navigation timeout in seconds.
    #[arg(long, env = "SITEPDF_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Path to the Chrome/Chromium executable.
    #[arg(long, env = "SITEPDF_CHROME")]
    chrome: Option<PathBuf>,

    /// Disable the Chrome sandbox.
    #[arg(long, env = "SITEPDF_NO_SANDBOX")]
    no_sandbox: bool,

    /// Print the export report as JSON on stdout.
    #[arg(long, env = "SITEPDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SITEPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SITEPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SITEPDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum WaitArg {
    Load,
    NetworkAlmostIdle,
    NetworkIdle,
}

impl From<WaitArg> for LoadCondition {
    fn from(v: WaitArg) -> Self {
        match v {
            WaitArg::Load => LoadCondition::Load,
            WaitArg::NetworkAlmostIdle => LoadCondition::NetworkAlmostIdle,
            WaitArg::NetworkIdle => LoadCondition::NetworkIdle,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    // ── Build config ─────────────────────────────────────────────────────
    let options = resolve_options(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, options, progress_cb)?;
    let launcher = Arc::new(ChromeLauncher::new(ChromeSettings {
        executable: cli.chrome.clone(),
        sandbox: !cli.no_sandbox,
        ..ChromeSettings::default()
    }));

    // ── Run export ───────────────────────────────────────────────────────
    let report = export_paths_with(&cli.inputs, &config, launcher)
        .await
        .context("Export failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        eprintln!(
            "Exported {}/{} files in {}ms ({} browser sessions)",
            report.stats.exported,
            report.stats.total_files,
            report.stats.total_duration_ms,
            report.stats.sessions_launched,
        );
        for file in &report.files {
            if let FileOutcome::Failed { error, .. } = file {
                eprintln!("  {} {}", red("✗"), error);
            }
        }
    }

    Ok(())
}

/// Page options from `--options`, overridden by individual flags.
async fn resolve_options(cli: &Cli) -> Result<ExportOptions> {
    let mut options = match cli.options {
        Some(ref path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read options from {:?}", path))?;
            ExportOptions::from_json(&json)
                .with_context(|| format!("Invalid options in {:?}", path))?
        }
        None => {
            let format = cli
                .format
                .context("No paper format given: pass --format or --options")?;
            let any_margin = cli.margin.is_some()
                || cli.margin_top.is_some()
                || cli.margin_right.is_some()
                || cli.margin_bottom.is_some()
                || cli.margin_left.is_some();
            if !any_margin {
                anyhow::bail!("No margin given: pass --margin, --margin-<side> or --options");
            }
            ExportOptions::new(format, Margin::default())
        }
    };

    if let Some(format) = cli.format {
        options.format = format;
    }
    if let Some(margin) = cli.margin {
        options.margin = Margin::uniform(margin);
    }
    let m = &mut options.margin;
    for (side, value) in [
        (&mut m.top, cli.margin_top),
        (&mut m.right, cli.margin_right),
        (&mut m.bottom, cli.margin_bottom),
        (&mut m.left, cli.margin_left),
    ] {
        if let Some(v) = value {
            *side = v;
        }
    }
    if cli.landscape {
        options.landscape = true;
    }
    if cli.print_background {
        options.print_background = true;
    }
    if let Some(scale) = cli.scale {
        options.scale = scale;
    }
    Ok(options)
}

/// Map CLI args to `ExportConfig`.
fn build_config(
    cli: &Cli,
    options: ExportOptions,
    progress: Option<ProgressCallback>,
) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder(options)
        .max_sessions((!cli.unbounded).then_some(cli.sessions as usize))
        .wait_until(cli.wait_until.into())
        .navigation_timeout_secs(cli.timeout);

    if cli.fresh_browser {
        builder = builder.session_strategy(SessionStrategy::PerFile);
    }
    if cli.forward_immediately {
        builder = builder.forward(ForwardMode::Immediate);
    }
    if cli.fail_fast {
        builder = builder.failure_policy(FailurePolicy::FailFast);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sitepdf").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    async fn format_is_required_without_options_file() {
        let err = resolve_options(&cli(&["dist", "--margin", "1cm"])).await.unwrap_err();
        assert!(err.to_string().starts_with("No paper format"), "{err}");
    }

    #[tokio::test]
    async fn margin_is_required_without_options_file() {
        let err = resolve_options(&cli(&["dist", "--format", "A4"])).await.unwrap_err();
        assert!(err.to_string().starts_with("No margin"), "{err}");
    }

    #[tokio::test]
    async fn one_margin_side_is_enough() {
        let options = resolve_options(&cli(&["dist", "--format", "a4", "--margin-top", "2cm"]))
            .await
            .unwrap();
        assert_eq!(options.format, PaperFormat::A4);
        assert_eq!(options.margin.top, Length::cm(2.0));
        assert_eq!(options.margin.bottom, Length::default());
    }

    #[tokio::test]
    async fn side_flags_override_uniform_margin() {
        let options = resolve_options(&cli(&[
            "dist",
            "--format",
            "Letter",
            "--margin",
            "1cm",
            "--margin-left",
            "0.5in",
        ]))
        .await
        .unwrap();
        assert_eq!(options.margin.top, Length::cm(1.0));
        assert_eq!(options.margin.right, Length::cm(1.0));
        assert_eq!(options.margin.bottom, Length::cm(1.0));
        assert_eq!(options.margin.left, Length::inches(0.5));
    }

    #[tokio::test]
    async fn flags_override_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdf.json");
        std::fs::write(
            &path,
            r#"{"format": "Letter", "margin": {"top": "1cm", "right": "1cm", "bottom": "1cm", "left": "1cm"}}"#,
        )
        .unwrap();
        let path = path.to_string_lossy().into_owned();

        let options = resolve_options(&cli(&[
            "dist",
            "--options",
            &path,
            "--format",
            "A5",
            "--margin-bottom",
            "20mm",
            "--landscape",
        ]))
        .await
        .unwrap();
        assert_eq!(options.format, PaperFormat::A5);
        assert_eq!(options.margin.top, Length::cm(1.0));
        assert_eq!(options.margin.bottom, Length::mm(20.0));
        assert!(options.landscape);

        // The file alone is enough.
        let options = resolve_options(&cli(&["dist", "--options", &path])).await.unwrap();
        assert_eq!(options.format, PaperFormat::Letter);
        assert!(!options.landscape);
    }

    #[tokio::test]
    async fn unreadable_options_file_is_an_error() {
        let err = resolve_options(&cli(&["dist", "--options", "/no/such/pdf.json"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read options"), "{err}");
    }

    #[test]
    fn unbounded_overrides_sessions() {
        let options = ExportOptions::new(PaperFormat::Letter, Margin::uniform(Length::cm(1.0)));

        let config = build_config(&cli(&["dist", "--sessions", "2"]), options.clone(), None).unwrap();
        assert_eq!(config.max_sessions, Some(2));

        let args = cli(&["dist", "--sessions", "2", "--unbounded"]);
        let config = build_config(&args, options, None).unwrap();
        assert_eq!(config.max_sessions, None);
    }

    #[test]
    fn run_flags_map_to_config() {
        let options = ExportOptions::new(PaperFormat::Letter, Margin::uniform(Length::cm(1.0)));
        let args = cli(&[
            "dist",
            "--fresh-browser",
            "--forward-immediately",
            "--fail-fast",
            "--wait-until",
            "network-idle",
            "--timeout",
            "5",
        ]);
        let config = build_config(&args, options.clone(), None).unwrap();
        assert_eq!(config.session_strategy, SessionStrategy::PerFile);
        assert_eq!(config.forward, ForwardMode::Immediate);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.wait_until, LoadCondition::NetworkIdle);
        assert_eq!(config.navigation_timeout_secs, 5);

        let config = build_config(&cli(&["dist"]), options, None).unwrap();
        assert_eq!(config.session_strategy, SessionStrategy::Pooled);
        assert_eq!(config.max_sessions, Some(4));
        assert_eq!(config.failure_policy, FailurePolicy::BestEffort);
    }

    #[test]
    fn zero_sessions_is_rejected() {
        let parsed = Cli::try_parse_from(["sitepdf", "dist", "--sessions", "0"]);
        assert!(parsed.is_err());
    }
}
