mod config;
mod discovery;
mod error;
mod export;
mod metrics;
mod orchestrator;
mod perf;
mod strip;

pub use config::{
    DEFAULT_DPI, DEFAULT_IMAGE_EXTENSION, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_STRIP_HEIGHT,
    DEFAULT_WORKERS, MASTER_SUFFIX, StitchConfig,
};
pub use discovery::{
    CHAPTER_DIR_PREFIX, ChapterDir, discover_chapters, list_chapter_images, parse_chapter_index,
    parse_image_index,
};
pub use error::StitchError;
pub use export::{ExportOptions, ExportSummary, build_document, write_document};
pub use metrics::{ChapterMetrics, StitchReport};
pub use orchestrator::{
    ChapterLoader, CollectOptions, CollectedStrips, FsChapterLoader, collect_strips, load_image,
    partition_ranges,
};
use perf::PerfLogger;
use std::path::PathBuf;
use std::time::Instant;
pub use strip::{Strip, StripCanvas, StripPlan, build_strips, plan_strips};
use tracing::info;

/// Binds every chapter under a root directory into one master PDF.
pub struct Stitcher {
    config: StitchConfig,
    perf: Option<PerfLogger>,
}

#[derive(Clone)]
pub struct StitcherBuilder {
    config: StitchConfig,
}

impl StitcherBuilder {
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: StitchConfig::new(root, output_dir),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn max_height(mut self, max_height: u32) -> Self {
        self.config.max_height = max_height;
        self
    }

    pub fn image_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.image_extension = extension.into();
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    // JSON-lines timing log; a `<stem>_summary.log` lands beside it on drop.
    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Stitcher, StitchError> {
        self.config.validate()?;
        let perf = match &self.config.perf_path {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        Ok(Stitcher {
            config: self.config,
            perf,
        })
    }
}

impl Stitcher {
    pub fn builder(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> StitcherBuilder {
        StitcherBuilder::new(root, output_dir)
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            workers: self.config.workers,
            max_height: self.config.max_height,
        }
    }

    fn export_options(&self) -> ExportOptions {
        ExportOptions {
            jpeg_quality: self.config.jpeg_quality,
            dpi: self.config.dpi,
        }
    }

    /// Discovers chapters under the root and stitches them, in chapter order.
    pub fn collect(&self) -> Result<CollectedStrips, StitchError> {
        let loader = FsChapterLoader::new(self.config.image_extension.clone());
        self.collect_with_loader(&loader)
    }

    pub fn collect_with_loader<L: ChapterLoader + ?Sized>(
        &self,
        loader: &L,
    ) -> Result<CollectedStrips, StitchError> {
        let chapters = discover_chapters(&self.config.root)?;
        info!(
            root = %self.config.root.display(),
            chapters = chapters.len(),
            workers = self.config.workers,
            "stitching chapters"
        );
        orchestrator::collect_strips_with_perf(
            &chapters,
            loader,
            &self.collect_options(),
            self.perf.as_ref(),
        )
    }

    /// Stitches everything and writes `<prefix>MASTER.pdf` into the output
    /// directory. Nothing is written if any chapter fails.
    pub fn run(&self) -> Result<StitchReport, StitchError> {
        let loader = FsChapterLoader::new(self.config.image_extension.clone());
        self.run_with_loader(&loader)
    }

    pub fn run_with_loader<L: ChapterLoader + ?Sized>(
        &self,
        loader: &L,
    ) -> Result<StitchReport, StitchError> {
        let t_total = Instant::now();
        let collected = self.collect_with_loader(loader)?;

        let output_path = self.config.master_path();
        let t_export = Instant::now();
        let summary = write_document(&collected.strips, &output_path, &self.export_options())?;
        let export_ms = t_export.elapsed().as_secs_f64() * 1000.0;
        let total_ms = t_total.elapsed().as_secs_f64() * 1000.0;

        if let Some(perf) = &self.perf {
            perf.log_export(summary.pages_written, summary.bytes_written, export_ms, total_ms);
            perf.flush();
        }
        info!(
            path = %output_path.display(),
            pages = summary.pages_written,
            bytes = summary.bytes_written,
            "master PDF saved"
        );

        Ok(StitchReport {
            output_path,
            chapters: collected.chapters,
            strip_count: summary.pages_written,
            total_bytes: summary.bytes_written,
            total_ms,
        })
    }
}
