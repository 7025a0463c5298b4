//! CLI binary for pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `BatchConfig` / `ServiceConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2img::server::{self, AppState, ServiceConfig};
use pdf2img::{
    convert_batch, convert_document, Background, BatchConfig, BinaryLocation, CanvasSpec,
    ConversionConfig, ConversionProgressCallback, FailurePolicy, OutputFormat, PageNaming,
    ProgressCallback, RendererBackend, RendererConfig,
};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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

/// Terminal progress callback: a live progress bar plus one log line per
/// written page.
///
/// In batch mode the same bar is reused for every document, so
/// `on_conversion_complete` only clears it when `single_document` is set.
struct CliProgressCallback {
    bar: ProgressBar,
    single_document: bool,
}

impl CliProgressCallback {
    fn new(single_document: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Rendering");
        bar.set_message("Rasterising PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            single_document,
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Writing");
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendered {total_pages} page(s)"))
        ));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, bytes: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{:>8} bytes", bytes)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        if self.single_document {
            self.bar.finish_and_clear();
        }
        if failed > 0 {
            self.bar.suspend(|| {
                eprintln!(
                    "{} {}/{} pages written  ({} failed, nothing kept)",
                    red("✘"),
                    bold(&success_count.to_string()),
                    total_pages,
                    red(&failed.to_string()),
                )
            });
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as PNG at 150 DPI into ./report/
  pdf2img convert report.pdf

  # JPEG at 300 DPI, letterboxed onto A4-ish canvas, zipped
  pdf2img convert report.pdf -o out/ --format jpeg --dpi 300 \
      --canvas 1447x2048 --background white --zip

  # Every PDF in a folder, one subfolder per document
  pdf2img batch ./pdfs ./images

  # Web UI on http://127.0.0.1:5000
  pdf2img serve

RENDERERS:
  poppler   pdftoppm from poppler-utils (default)
  pdfium    the pdfium shared library (libpdfium.so / pdfium.dll)

  Use --renderer-dir to look in a specific directory instead of PATH.

ENVIRONMENT VARIABLES:
  PDF2IMG_RENDERER        poppler | pdfium
  PDF2IMG_RENDERER_DIR    Directory holding pdftoppm or libpdfium
  PDF2IMG_BIND            Service listen address (default 127.0.0.1:5000)
  PDF2IMG_DATA_DIR        Service storage root (default ./data)
  PDF2IMG_MAX_UPLOAD_MB   Service upload limit (default 20)
  RUST_LOG                Overrides the log filter
"#;

/// Convert PDF pages to PNG or JPEG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Convert PDF pages to PNG or JPEG images",
    long_about = "Render every page of a PDF to a PNG or JPEG image, optionally shrunk and \
centred on a fixed-size canvas. Works on single files, whole folders, or as a small \
upload/convert/download web service.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Rasteriser backend.
    #[arg(long, global = true, env = "PDF2IMG_RENDERER", value_enum, default_value = "poppler")]
    renderer: RendererArg,

    /// Directory containing pdftoppm or the pdfium library (default: system path).
    #[arg(long, global = true, env = "PDF2IMG_RENDERER_DIR")]
    renderer_dir: Option<PathBuf>,

    /// Per-document render timeout in seconds.
    #[arg(long, global = true, env = "PDF2IMG_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2IMG_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,

    /// Print the result as JSON on stdout.
    #[arg(long, global = true, env = "PDF2IMG_JSON")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one PDF.
    Convert(ConvertArgs),
    /// Convert every PDF in a folder.
    Batch(BatchArgs),
    /// Run the web service.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF file to convert.
    input: PathBuf,

    /// Output directory (default: ./<pdf name>).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image format.
    #[arg(long, value_enum, default_value = "png")]
    format: FormatArg,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2IMG_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Fit every page onto a WIDTHxHEIGHT canvas.
    #[arg(long, value_parser = parse_size)]
    canvas: Option<(u32, u32)>,

    /// Canvas fill colour (name or #rrggbb).
    #[arg(long, value_parser = parse_background, default_value = "white")]
    background: Background,

    /// JPEG quality (1–100).
    #[arg(long, default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Also bundle the images into <pdf name>.zip.
    #[arg(long)]
    zip: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2IMG_PASSWORD")]
    password: Option<String>,

    /// Pages encoded in parallel.
    #[arg(short, long, env = "PDF2IMG_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Folder containing PDF files.
    input_dir: PathBuf,

    /// Folder receiving one subfolder per PDF.
    output_dir: PathBuf,

    /// Canvas size.
    #[arg(long, value_parser = parse_size, default_value = "1447x2048")]
    canvas: (u32, u32),

    /// Canvas fill colour (name or #rrggbb).
    #[arg(long, value_parser = parse_background, default_value = "white")]
    background: Background,

    /// Image format.
    #[arg(long, value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2IMG_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Stop at the first document that fails.
    #[arg(long)]
    fail_fast: bool,

    /// Pages encoded in parallel.
    #[arg(short, long, env = "PDF2IMG_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address (overrides PDF2IMG_BIND).
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Storage root for uploads and outputs (overrides PDF2IMG_DATA_DIR).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Upload limit in MiB (overrides PDF2IMG_MAX_UPLOAD_MB).
    #[arg(long)]
    max_upload_mb: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::Jpeg,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RendererArg {
    Poppler,
    Pdfium,
}

impl From<RendererArg> for RendererBackend {
    fn from(v: RendererArg) -> Self {
        match v {
            RendererArg::Poppler => RendererBackend::Poppler,
            RendererArg::Pdfium => RendererBackend::Pdfium,
        }
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    CanvasSpec::parse_size(s).map_err(|e| e.to_string())
}

fn parse_background(s: &str) -> Result<Background, String> {
    s.parse().map_err(|e: pdf2img::Pdf2ImgError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the progress bar is active.
    let serving = matches!(cli.command, Command::Serve(_));
    let show_progress = !serving && !cli.quiet && !cli.no_progress && !cli.json;
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

    let renderer_config = RendererConfig {
        backend: cli.renderer.into(),
        location: match cli.renderer_dir {
            Some(ref dir) => BinaryLocation::Directory(dir.clone()),
            None => BinaryLocation::SystemPath,
        },
    };

    match cli.command {
        Command::Convert(ref args) => {
            run_convert(&cli, args, &renderer_config, show_progress).await
        }
        Command::Batch(ref args) => run_batch(&cli, args, &renderer_config, show_progress).await,
        Command::Serve(ref args) => run_serve(&cli, args, renderer_config).await,
    }
}

async fn run_convert(
    cli: &Cli,
    args: &ConvertArgs,
    renderer_config: &RendererConfig,
    show_progress: bool,
) -> Result<()> {
    let progress = show_progress.then(|| CliProgressCallback::new(true));

    let mut builder = ConversionConfig::builder()
        .dpi(args.dpi)
        .format(args.format.into())
        .jpeg_quality(args.quality)
        .concurrency(args.concurrency)
        .render_timeout_secs(cli.timeout)
        .zip(args.zip);
    if let Some((w, h)) = args.canvas {
        builder = builder.canvas(CanvasSpec::new(w, h, args.background)?);
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref cb) = progress {
        builder = builder.progress_callback(cb.clone() as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(stem_of(&args.input)));

    let renderer = renderer_config.build();
    let result = convert_document(&args.input, &output_dir, &config, renderer.as_ref()).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} page(s)  {}ms  →  {}",
            green("✔"),
            output.stats.page_count,
            output.stats.total_duration_ms,
            bold(&output.output_dir.display().to_string()),
        );
        if let Some(ref zip) = output.archive {
            eprintln!("   {} {}", dim("archive:"), zip.display());
        }
    }

    Ok(())
}

async fn run_batch(
    cli: &Cli,
    args: &BatchArgs,
    renderer_config: &RendererConfig,
    show_progress: bool,
) -> Result<()> {
    let progress = show_progress.then(|| CliProgressCallback::new(false));

    let (w, h) = args.canvas;
    let mut builder = ConversionConfig::builder()
        .dpi(args.dpi)
        .format(args.format.into())
        .canvas(CanvasSpec::new(w, h, args.background)?)
        .naming(PageNaming::batch())
        .concurrency(args.concurrency)
        .render_timeout_secs(cli.timeout);
    if let Some(ref cb) = progress {
        builder = builder.progress_callback(cb.clone() as ProgressCallback);
    }
    let config = BatchConfig {
        conversion: builder.build().context("Invalid configuration")?,
        failure_policy: if args.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        },
    };

    let renderer = renderer_config.build();
    let result = convert_batch(&args.input_dir, &args.output_dir, &config, renderer.as_ref()).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let report = result.context("Batch conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        for doc in &report.documents {
            match doc.result {
                pdf2img::DocumentResult::Converted { pages } => eprintln!(
                    "  {} {}  {}",
                    green("✓"),
                    doc.source.display(),
                    dim(&format!("{pages} page(s) → {}", doc.output_dir.display()))
                ),
                pdf2img::DocumentResult::Failed { ref error } => {
                    eprintln!("  {} {}  {}", red("✗"), doc.source.display(), red(error))
                }
            }
        }
        eprintln!(
            "{}  {} converted, {} failed, {} page(s)",
            if report.failed() == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.converted(),
            report.failed(),
            report.total_pages(),
        );
    }

    if report.failed() > 0 {
        anyhow::bail!("{} document(s) failed to convert", report.failed());
    }
    Ok(())
}

async fn run_serve(cli: &Cli, args: &ServeArgs, renderer_config: RendererConfig) -> Result<()> {
    let mut config = ServiceConfig::from_env().context("Invalid service configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(ref dir) = args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(mb) = args.max_upload_mb {
        config.max_upload_bytes = mb * 1024 * 1024;
    }
    config.render_timeout_secs = cli.timeout;
    config.renderer = renderer_config;

    let state = AppState::new(config)
        .await
        .context("Failed to prepare storage")?;
    server::serve(state).await.context("Server failed")?;
    Ok(())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}
