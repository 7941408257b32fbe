//! CLI binary for edgequake-sheet2pdf.
//!
//! A thin shim over the library crate: `serve` runs the HTTP endpoint,
//! `convert` drives Excel locally, `upload` sends a workbook to a server.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_sheet2pdf::client::{is_spreadsheet_path, upload_workbook, write_sheet_pdfs};
use edgequake_sheet2pdf::server::{serve, ServerConfig};
use edgequake_sheet2pdf::{
    convert_file, ConversionConfig, ConvertResponse, Converter, ExcelHost, Orientation,
    ProgressCallback, SheetExport, SheetProgressCallback, ThumbnailMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::{IpAddr, SocketAddr};
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

/// Terminal progress callback: a spinner while Excel starts and opens the
/// workbook, then a bar with one log line per exported sheet.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the sheet currently being exported.
    sheet_started: Mutex<Option<Instant>>,
    exported_bytes: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Starting Excel…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            sheet_started: Mutex::new(None),
            exported_bytes: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} sheets  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Exporting");
    }

    fn sheet_elapsed(&self) -> String {
        let secs = self
            .sheet_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }

    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl SheetProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_sheets: usize) {
        self.activate_bar(total_sheets);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting {total_sheets} sheets…"))
        ));
    }

    fn on_sheet_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut started) = self.sheet_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_sheet_complete(&self, index: usize, total: usize, name: &str, pdf_len: usize) {
        self.exported_bytes.fetch_add(pdf_len, Ordering::Relaxed);
        self.bar.println(format!(
            "  {} Sheet {:>3}/{:<3}  {:<24}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{:>8} bytes", pdf_len)),
            self.sheet_elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_sheet_error(&self, index: usize, total: usize, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Sheet {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            self.sheet_elapsed(),
        ));
    }

    fn on_conversion_complete(&self, total_sheets: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} sheets exported  {}",
            green("✔"),
            bold(&total_sheets.to_string()),
            dim(&format!(
                "({} PDF bytes)",
                self.exported_bytes.load(Ordering::Relaxed)
            )),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the conversion endpoint on the default port (Windows + Excel)
  sheet2pdf serve

  # Listen on all interfaces, allow 100 MB uploads
  sheet2pdf serve --host 0.0.0.0 --max-upload-mb 100

  # Convert locally: writes Q1-01-Summary.pdf, Q1-02-Detail.pdf, …
  sheet2pdf convert Q1.xlsx -o out/

  # Convert on a remote Windows box from any OS
  sheet2pdf upload Q1.xlsx --server http://win-box:5000 -o out/

  # Print the endpoint's JSON instead of writing files
  sheet2pdf convert Q1.xlsx --json > q1.json

ENDPOINT:
  POST /api/convert-excel   multipart/form-data, file field "excelFile"
  GET  /api/health          liveness + platform support

ENVIRONMENT VARIABLES:
  SHEET2PDF_HOST            serve: bind address
  SHEET2PDF_PORT            serve: port
  SHEET2PDF_MAX_UPLOAD_MB   serve: request body limit
  SHEET2PDF_MAX_HOSTS       serve: concurrent Excel instances
  SHEET2PDF_THUMBNAILS      duplicate | rasterize
  SHEET2PDF_SERVER          upload: server URL
  PDFIUM_LIB_PATH           libpdfium location for --thumbnails rasterize
  RUST_LOG                  overrides the log filter
"#;

/// Convert Excel workbooks to one PDF per worksheet.
#[derive(Parser, Debug)]
#[command(
    name = "sheet2pdf",
    version,
    about = "Convert Excel workbooks to one PDF per worksheet",
    long_about = "Convert Excel workbooks to one PDF per worksheet using Excel itself. \
Runs as an HTTP service (POST /api/convert-excel), converts local files, or uploads \
workbooks to a remote service.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SHEET2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SHEET2PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP conversion service.
    Serve(ServeArgs),
    /// Convert a local workbook with the local Excel installation.
    Convert(ConvertArgs),
    /// Send a workbook to a running service and save the returned PDFs.
    Upload(UploadArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "SHEET2PDF_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "SHEET2PDF_PORT", default_value_t = 5000)]
    port: u16,

    /// Largest accepted upload, in megabytes.
    #[arg(long, env = "SHEET2PDF_MAX_UPLOAD_MB", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..=2048))]
    max_upload_mb: u64,

    /// Excel instances allowed to run at once.
    #[arg(long, env = "SHEET2PDF_MAX_HOSTS", default_value_t = 1)]
    max_hosts: usize,

    /// Directory for per-request scratch files (default: system temp dir).
    #[arg(long, env = "SHEET2PDF_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Workbook to convert (.xls, .xlsx, .xlsm).
    input: PathBuf,

    /// Directory for the PDFs (default: next to the input).
    #[arg(short, long, env = "SHEET2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the endpoint's JSON response instead of writing files.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SHEET2PDF_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Workbook to send (.xls, .xlsx, .xlsm).
    input: PathBuf,

    /// Server root or full endpoint URL.
    #[arg(long, env = "SHEET2PDF_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Directory for the PDFs (default: next to the input).
    #[arg(short, long, env = "SHEET2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the server's JSON response instead of writing files.
    #[arg(long)]
    json: bool,

    /// Request timeout in seconds.
    #[arg(long, env = "SHEET2PDF_TIMEOUT", default_value_t = 600)]
    timeout: u64,
}

/// Layout options shared by `serve` and `convert`.
#[derive(Args, Debug)]
struct LayoutArgs {
    /// How the thumbnail field is produced.
    #[arg(long, env = "SHEET2PDF_THUMBNAILS", value_enum, default_value = "duplicate")]
    thumbnails: ThumbnailArg,

    /// Longest edge of rasterised thumbnails, in pixels.
    #[arg(long, env = "SHEET2PDF_THUMBNAIL_PX", default_value_t = 320)]
    thumbnail_px: u32,

    /// Export in portrait instead of landscape.
    #[arg(long, env = "SHEET2PDF_PORTRAIT")]
    portrait: bool,

    /// Honour print areas defined in the workbook.
    #[arg(long, env = "SHEET2PDF_RESPECT_PRINT_AREAS")]
    respect_print_areas: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ThumbnailArg {
    Duplicate,
    Rasterize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The service logs at debug by default; one-shot commands stay quiet
    // while the progress bar is active.
    let filter = match (&cli.command, cli.quiet, cli.verbose) {
        (_, true, _) => "error",
        (_, _, true) => "debug",
        (Command::Serve(_), _, _) => "debug,hyper=info",
        (Command::Convert(args), _, _) if args.json || args.no_progress => "info",
        (Command::Convert(_), _, _) => "error",
        (Command::Upload(_), _, _) => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Convert(args) => run_convert(args, cli.quiet).await,
        Command::Upload(args) => run_upload(args, cli.quiet).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut builder = layout_builder(&args.layout).max_concurrent_hosts(args.max_hosts);
    if let Some(ref dir) = args.scratch_dir {
        builder = builder.scratch_root(dir);
    }
    let config = builder.build().context("Invalid configuration")?;

    let server = ServerConfig {
        bind: SocketAddr::new(args.host, args.port),
        max_upload_bytes: (args.max_upload_mb * 1024 * 1024) as usize,
    };
    let converter = Converter::new(Arc::new(ExcelHost::new()), config);
    serve(server, converter).await.context("Server stopped")
}

async fn run_convert(args: ConvertArgs, quiet: bool) -> Result<()> {
    if !is_spreadsheet_path(&args.input) {
        bail!(
            "'{}' is not a spreadsheet file (expected .xls, .xlsx or .xlsm)",
            args.input.display()
        );
    }

    let show_progress = !quiet && !args.no_progress && !args.json;
    let progress = show_progress.then(CliProgressCallback::new_dynamic);

    let mut builder = layout_builder(&args.layout);
    if let Some(ref cb) = progress {
        builder = builder.progress_callback(Arc::clone(cb) as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;

    let output = match convert_file(&args.input, &config).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.abandon();
            }
            return Err(e).context("Conversion failed");
        }
    };

    if args.json {
        return print_json(output.sheets);
    }

    let paths = save_sheets(&output.sheets, &args.input, args.output.as_deref()).await?;
    if !quiet {
        report_saved(&paths, Some(output.stats.total_duration_ms));
    }
    Ok(())
}

async fn run_upload(args: UploadArgs, quiet: bool) -> Result<()> {
    let sheets = upload_workbook(&args.server, &args.input, args.timeout)
        .await
        .context("Upload failed")?;

    if args.json {
        return print_json(sheets);
    }

    let paths = save_sheets(&sheets, &args.input, args.output.as_deref()).await?;
    if !quiet {
        report_saved(&paths, None);
    }
    Ok(())
}

/// Map shared layout flags onto a config builder.
fn layout_builder(layout: &LayoutArgs) -> edgequake_sheet2pdf::ConversionConfigBuilder {
    let thumbnail = match layout.thumbnails {
        ThumbnailArg::Duplicate => ThumbnailMode::Duplicate,
        ThumbnailArg::Rasterize => ThumbnailMode::Rasterize {
            max_pixels: layout.thumbnail_px,
        },
    };
    let orientation = if layout.portrait {
        Orientation::Portrait
    } else {
        Orientation::Landscape
    };
    ConversionConfig::builder()
        .thumbnail(thumbnail)
        .orientation(orientation)
        .ignore_print_areas(!layout.respect_print_areas)
}

fn print_json(sheets: Vec<SheetExport>) -> Result<()> {
    let json = serde_json::to_string_pretty(&ConvertResponse::converted(sheets))
        .context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

async fn save_sheets(
    sheets: &[SheetExport],
    input: &Path,
    output: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());

    write_sheet_pdfs(sheets, &dir, &stem)
        .await
        .with_context(|| format!("Failed to write PDFs to {}", dir.display()))
}

fn report_saved(paths: &[PathBuf], duration_ms: Option<u64>) {
    for path in paths {
        eprintln!("  {} {}", cyan("→"), path.display());
    }
    let timing = duration_ms
        .map(|ms| format!("  {}", dim(&format!("{ms}ms"))))
        .unwrap_or_default();
    eprintln!(
        "{}  {} PDFs written{}",
        green("✔"),
        bold(&paths.len().to_string()),
        timing
    );
}
