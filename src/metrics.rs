use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterMetrics {
    pub chapter: u32,
    pub image_count: usize,
    pub strip_count: usize,
    pub load_ms: f64,
    pub stitch_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StitchReport {
    pub output_path: PathBuf,
    pub chapters: Vec<ChapterMetrics>,
    pub strip_count: usize,
    pub total_bytes: usize,
    pub total_ms: f64,
}

impl StitchReport {
    pub fn image_count(&self) -> usize {
        self.chapters.iter().map(|c| c.image_count).sum()
    }
}
