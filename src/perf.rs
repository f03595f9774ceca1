use crate::discovery::ChapterDir;
use crate::metrics::ChapterMetrics;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// JSON-lines timing log shared by all workers: one `perf.chapter` line per
/// stitched chapter, one `perf.worker` line per chapter range and one
/// `perf.export` line. On drop a `<stem>_summary.log` beside it ranks workers
/// and chapters and reports how evenly the ranges were balanced.
pub(crate) struct PerfLogger {
    state: Mutex<PerfState>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    workers: Vec<WorkerSpan>,
    chapters: Vec<ChapterSpan>,
}

struct WorkerSpan {
    worker: usize,
    chapters: usize,
    ms: f64,
    failed: bool,
}

struct ChapterSpan {
    chapter: u32,
    worker: usize,
    ms: f64,
}

fn json_opt(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "null".to_string())
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            state: Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                workers: Vec::new(),
                chapters: Vec::new(),
            }),
        })
    }

    pub fn log_chapter(&self, worker: usize, metrics: &ChapterMetrics) {
        let line = format!(
            "{{\"type\":\"perf.chapter\",\"worker\":{},\"chapter\":{},\"images\":{},\"strips\":{},\"load_ms\":{:.3},\"stitch_ms\":{:.3}}}",
            worker,
            metrics.chapter,
            metrics.image_count,
            metrics.strip_count,
            metrics.load_ms,
            metrics.stitch_ms
        );
        if let Ok(mut state) = self.state.lock() {
            state.chapters.push(ChapterSpan {
                chapter: metrics.chapter,
                worker,
                ms: metrics.load_ms + metrics.stitch_ms,
            });
            let _ = writeln!(state.writer, "{line}");
        }
    }

    /// Records one worker's whole range. `chapters` is the range it was
    /// assigned, which is empty for surplus workers.
    pub fn log_worker(&self, worker: usize, chapters: &[ChapterDir], ms: f64, failed: bool) {
        let line = format!(
            "{{\"type\":\"perf.worker\",\"worker\":{},\"first_chapter\":{},\"last_chapter\":{},\"chapters\":{},\"ms\":{:.3},\"status\":\"{}\"}}",
            worker,
            json_opt(chapters.first().map(|c| c.index)),
            json_opt(chapters.last().map(|c| c.index)),
            chapters.len(),
            ms,
            if failed { "failed" } else { "ok" }
        );
        if let Ok(mut state) = self.state.lock() {
            state.workers.push(WorkerSpan {
                worker,
                chapters: chapters.len(),
                ms,
                failed,
            });
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn log_export(&self, pages: usize, bytes: usize, export_ms: f64, total_ms: f64) {
        let line = format!(
            "{{\"type\":\"perf.export\",\"pages\":{},\"bytes\":{},\"ms\":{:.3},\"total_ms\":{:.3}}}",
            pages, bytes, export_ms, total_ms
        );
        if let Ok(mut state) = self.state.lock() {
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        if self.workers.is_empty() && self.chapters.is_empty() {
            return;
        }
        let Ok(file) = File::create(summary_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        self.workers.sort_by_key(|w| w.worker);
        let worker_total: f64 = self.workers.iter().map(|w| w.ms).sum();
        for span in &self.workers {
            let share = if worker_total > 0.0 {
                span.ms / worker_total
            } else {
                0.0
            };
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.summary.worker\",\"worker\":{},\"chapters\":{},\"ms\":{:.3},\"share\":{:.3},\"status\":\"{}\"}}",
                span.worker,
                span.chapters,
                span.ms,
                share,
                if span.failed { "failed" } else { "ok" }
            );
        }

        self.chapters
            .sort_by(|a, b| b.ms.total_cmp(&a.ms).then(a.chapter.cmp(&b.chapter)));
        for (rank, span) in self.chapters.iter().enumerate() {
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.summary.chapter\",\"rank\":{},\"chapter\":{},\"worker\":{},\"ms\":{:.3}}}",
                rank + 1,
                span.chapter,
                span.worker,
                span.ms
            );
        }

        // Surplus workers with empty ranges are left out of the balance.
        let busy: Vec<f64> = self
            .workers
            .iter()
            .filter(|w| w.chapters > 0)
            .map(|w| w.ms)
            .collect();
        if !busy.is_empty() {
            let max = busy.iter().copied().fold(0.0, f64::max);
            let mean = busy.iter().sum::<f64>() / busy.len() as f64;
            let imbalance = if mean > 0.0 { max / mean } else { 1.0 };
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.summary.balance\",\"busy_workers\":{},\"max_ms\":{:.3},\"mean_ms\":{:.3},\"imbalance\":{:.3}}}",
                busy.len(),
                max,
                mean,
                imbalance
            );
        }
    }
}

fn summary_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("stripbind_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_summary.log"))
}
