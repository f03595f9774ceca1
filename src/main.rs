use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stripbind::{
    DEFAULT_DPI, DEFAULT_IMAGE_EXTENSION, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_STRIP_HEIGHT,
    DEFAULT_WORKERS, Stitcher,
};

/// Stitch numbered chapter images into tall strips and bind them into one PDF.
#[derive(Parser, Debug)]
#[command(name = "stripbind", version, about)]
struct Cli {
    /// Directory holding `Chapter <N>` folders
    root: PathBuf,

    /// Directory that receives `<prefix>MASTER.pdf` (created if missing)
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// File name prefix for the master PDF
    #[arg(short, long, default_value = "")]
    prefix: String,

    /// Worker threads; each takes a contiguous run of chapters
    #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Tallest strip in pixels before a new page is started
    #[arg(long, default_value_t = DEFAULT_MAX_STRIP_HEIGHT)]
    max_height: u32,

    /// Extension of page images inside each chapter folder
    #[arg(long, default_value = DEFAULT_IMAGE_EXTENSION)]
    ext: String,

    /// JPEG quality for embedded strips (1-100)
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Page resolution; strips map to PDF points at this many pixels per inch
    #[arg(long, default_value_t = DEFAULT_DPI)]
    dpi: u32,

    /// Write JSON-lines chapter, worker and export timings to this file
    #[arg(long)]
    perf_log: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = Stitcher::builder(&cli.root, &cli.output)
        .prefix(cli.prefix)
        .workers(cli.workers)
        .max_height(cli.max_height)
        .image_extension(cli.ext)
        .jpeg_quality(cli.quality)
        .dpi(cli.dpi);
    if let Some(path) = cli.perf_log {
        builder = builder.perf_log(path);
    }
    let stitcher = builder.build().context("invalid settings")?;

    let report = stitcher
        .run()
        .with_context(|| format!("failed to bind chapters in {}", cli.root.display()))?;

    println!(
        "{} chapters, {} images -> {} pages in {} ({:.0} ms)",
        report.chapters.len(),
        report.image_count(),
        report.strip_count,
        report.output_path.display(),
        report.total_ms
    );
    Ok(())
}
