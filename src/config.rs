use crate::error::StitchError;
use std::path::PathBuf;

/// Tallest strip canvas allocated by default. Sits just under the 65535px
/// dimension ceiling of baseline JPEG, which is how strips are embedded.
pub const DEFAULT_MAX_STRIP_HEIGHT: u32 = 65_500;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const DEFAULT_DPI: u32 = 72;
pub const MASTER_SUFFIX: &str = "MASTER.pdf";

#[derive(Debug, Clone)]
pub struct StitchConfig {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub prefix: String,
    pub workers: usize,
    pub max_height: u32,
    pub image_extension: String,
    pub jpeg_quality: u8,
    pub dpi: u32,
    pub perf_path: Option<PathBuf>,
}

impl StitchConfig {
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
            prefix: String::new(),
            workers: DEFAULT_WORKERS,
            max_height: DEFAULT_MAX_STRIP_HEIGHT,
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            dpi: DEFAULT_DPI,
            perf_path: None,
        }
    }

    pub fn master_file_name(&self) -> String {
        format!("{}{}", self.prefix, MASTER_SUFFIX)
    }

    pub fn master_path(&self) -> PathBuf {
        self.output_dir.join(self.master_file_name())
    }

    pub fn validate(&self) -> Result<(), StitchError> {
        if self.workers == 0 {
            return Err(StitchError::InvalidConfiguration(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.max_height == 0 {
            return Err(StitchError::InvalidConfiguration(
                "max strip height must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(StitchError::InvalidConfiguration(format!(
                "jpeg quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.dpi == 0 {
            return Err(StitchError::InvalidConfiguration(
                "dpi must be at least 1".to_string(),
            ));
        }
        let ext = self.image_extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            return Err(StitchError::InvalidConfiguration(format!(
                "invalid image extension {:?}",
                self.image_extension
            )));
        }
        Ok(())
    }
}
