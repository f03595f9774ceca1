use crate::discovery::{ChapterDir, list_chapter_images};
use crate::error::StitchError;
use crate::metrics::ChapterMetrics;
use crate::perf::PerfLogger;
use crate::strip::{Strip, build_strips};
use image::RgbImage;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// Turns one chapter directory into its ordered page images.
pub trait ChapterLoader: Send + Sync {
    fn load(&self, chapter: &ChapterDir) -> Result<Vec<RgbImage>, StitchError>;
}

/// Reads `<n>.<ext>` files from the chapter directory in numeric order.
#[derive(Debug, Clone)]
pub struct FsChapterLoader {
    extension: String,
}

impl FsChapterLoader {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

/// Decodes one page. The format is sniffed from the file's bytes, so the
/// extension only selects which files belong to the chapter.
pub fn load_image(path: &Path) -> Result<RgbImage, StitchError> {
    let decode_err = |err: &dyn std::fmt::Display| StitchError::Decode {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    let decoded = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| decode_err(&err))?
        .decode()
        .map_err(|err| decode_err(&err))?;
    Ok(decoded.to_rgb8())
}

impl ChapterLoader for FsChapterLoader {
    fn load(&self, chapter: &ChapterDir) -> Result<Vec<RgbImage>, StitchError> {
        list_chapter_images(&chapter.path, &self.extension)?
            .iter()
            .map(|path| load_image(path))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    pub workers: usize,
    pub max_height: u32,
}

#[derive(Debug, Default)]
pub struct CollectedStrips {
    pub strips: Vec<Strip>,
    pub chapters: Vec<ChapterMetrics>,
}

/// Splits `count` chapters into `workers` contiguous ranges of
/// `ceil(count / workers)` chapters. Surplus workers get empty ranges.
pub fn partition_ranges(count: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let per_worker = count.div_ceil(workers);
    (0..workers)
        .map(|worker| {
            let start = (worker * per_worker).min(count);
            let end = (start + per_worker).min(count);
            start..end
        })
        .collect()
}

struct WorkerFailure {
    chapter: PathBuf,
    error: StitchError,
}

fn run_range<L: ChapterLoader + ?Sized>(
    worker: usize,
    chapters: &[ChapterDir],
    loader: &L,
    max_height: u32,
    perf: Option<&PerfLogger>,
) -> Result<CollectedStrips, WorkerFailure> {
    let mut out = CollectedStrips::default();
    for chapter in chapters {
        let fail = |error| WorkerFailure {
            chapter: chapter.path.clone(),
            error,
        };

        let t_load = Instant::now();
        let images = loader.load(chapter).map_err(fail)?;
        let load_ms = t_load.elapsed().as_secs_f64() * 1000.0;

        let t_stitch = Instant::now();
        let strips = build_strips(chapter.index, &images, max_height).map_err(fail)?;
        let stitch_ms = t_stitch.elapsed().as_secs_f64() * 1000.0;

        info!(
            worker,
            chapter = chapter.index,
            images = images.len(),
            strips = strips.len(),
            "stitched chapter"
        );

        let metrics = ChapterMetrics {
            chapter: chapter.index,
            image_count: images.len(),
            strip_count: strips.len(),
            load_ms,
            stitch_ms,
        };
        if let Some(perf) = perf {
            perf.log_chapter(worker, &metrics);
        }
        out.chapters.push(metrics);
        out.strips.extend(strips);
    }
    Ok(out)
}

/// Stitches every chapter on a pool of `options.workers` threads and returns
/// the strips in chapter order.
///
/// Each worker owns one contiguous range of chapters. Results are joined by
/// range index, never by completion order, so scheduling cannot reorder
/// strips. If any worker fails, all workers still run to completion and the
/// first failure in range order is returned.
pub(crate) fn collect_strips_with_perf<L: ChapterLoader + ?Sized>(
    chapters: &[ChapterDir],
    loader: &L,
    options: &CollectOptions,
    perf: Option<&PerfLogger>,
) -> Result<CollectedStrips, StitchError> {
    use rayon::prelude::*;

    if options.workers == 0 {
        return Err(StitchError::InvalidConfiguration(
            "worker count must be at least 1".to_string(),
        ));
    }
    let ranges = partition_ranges(chapters.len(), options.workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .thread_name(|idx| format!("stripbind-worker-{idx}"))
        .build()
        .map_err(|err| StitchError::WorkerPool(err.to_string()))?;
    debug!(
        chapters = chapters.len(),
        workers = options.workers,
        "dispatching chapter ranges"
    );

    let mut results: Vec<(usize, Result<CollectedStrips, WorkerFailure>)> = pool.install(|| {
        ranges
            .par_iter()
            .with_max_len(1)
            .enumerate()
            .map(|(worker, range)| {
                let assigned = &chapters[range.clone()];
                let started = Instant::now();
                let res = run_range(worker, assigned, loader, options.max_height, perf);
                if let Some(perf) = perf {
                    let ms = started.elapsed().as_secs_f64() * 1000.0;
                    perf.log_worker(worker, assigned, ms, res.is_err());
                }
                (worker, res)
            })
            .collect()
    });
    results.sort_by_key(|(idx, _)| *idx);

    let total_workers = results.len();
    let failed_workers = results.iter().filter(|(_, res)| res.is_err()).count();
    let mut collected = CollectedStrips::default();
    for (worker, res) in results {
        match res {
            Ok(part) => {
                collected.strips.extend(part.strips);
                collected.chapters.extend(part.chapters);
            }
            Err(failure) => {
                error!(
                    worker,
                    chapter = %failure.chapter.display(),
                    failed_workers,
                    "chapter range failed: {}",
                    failure.error
                );
                return Err(StitchError::WorkerFailed {
                    worker,
                    chapter: failure.chapter,
                    failed_workers,
                    total_workers,
                    source: Box::new(failure.error),
                });
            }
        }
    }
    Ok(collected)
}

pub fn collect_strips<L: ChapterLoader + ?Sized>(
    chapters: &[ChapterDir],
    loader: &L,
    options: &CollectOptions,
) -> Result<CollectedStrips, StitchError> {
    collect_strips_with_perf(chapters, loader, options, None)
}
