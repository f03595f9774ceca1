use crate::error::StitchError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CHAPTER_DIR_PREFIX: &str = "Chapter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDir {
    pub index: u32,
    pub path: PathBuf,
}

/// Parses `"Chapter 12"` into `12`. The number is the last whitespace
/// separated token of the name.
pub fn parse_chapter_index(name: &str) -> Option<u32> {
    if !name.starts_with(CHAPTER_DIR_PREFIX) {
        return None;
    }
    name.split_whitespace().last()?.parse().ok()
}

/// Integer value of a file stem, `"007.jpg"` -> `7`.
pub fn parse_image_index(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.trim().parse().ok()
}

fn discovery_err(path: &Path, err: impl std::fmt::Display) -> StitchError {
    StitchError::Discovery {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Lists `Chapter <N>` directories directly under `root`, ascending by `N`.
pub fn discover_chapters(root: &Path) -> Result<Vec<ChapterDir>, StitchError> {
    let entries = fs::read_dir(root).map_err(|err| discovery_err(root, err))?;
    let mut chapters = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| discovery_err(root, err))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(CHAPTER_DIR_PREFIX) {
            continue;
        }
        match parse_chapter_index(name) {
            Some(index) => chapters.push(ChapterDir {
                index,
                path: path.clone(),
            }),
            None => warn!(dir = %path.display(), "skipping chapter directory without a numeric suffix"),
        }
    }
    if chapters.is_empty() {
        return Err(discovery_err(
            root,
            format!("no directories named \"{CHAPTER_DIR_PREFIX} <N>\""),
        ));
    }
    chapters.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.path.cmp(&b.path)));
    debug!(root = %root.display(), count = chapters.len(), "discovered chapters");
    Ok(chapters)
}

/// Lists the chapter's image files ending in `extension`, ascending by the
/// numeric value of their stem. A matching file whose stem is not a number
/// is an error.
pub fn list_chapter_images(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, StitchError> {
    let extension = extension.trim_start_matches('.');
    let entries = fs::read_dir(dir).map_err(|err| discovery_err(dir, err))?;
    let mut images: Vec<(u64, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| discovery_err(dir, err))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches_ext {
            continue;
        }
        let Some(index) = parse_image_index(&path) else {
            return Err(StitchError::Discovery {
                path,
                reason: "non-numeric image name".to_string(),
            });
        };
        images.push((index, path));
    }
    images.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(images.into_iter().map(|(_, path)| path).collect())
}
