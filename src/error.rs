use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StitchError {
    Discovery {
        path: PathBuf,
        reason: String,
    },
    Decode {
        path: PathBuf,
        reason: String,
    },
    EmptyInput {
        chapter: u32,
    },
    Export(String),
    InvalidConfiguration(String),
    WorkerPool(String),
    /// First failure in partition order, reported once every worker has settled.
    WorkerFailed {
        worker: usize,
        chapter: PathBuf,
        failed_workers: usize,
        total_workers: usize,
        source: Box<StitchError>,
    },
    Io(std::io::Error),
}

impl fmt::Display for StitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StitchError::Discovery { path, reason } => {
                write!(f, "cannot discover chapters in {}: {}", path.display(), reason)
            }
            StitchError::Decode { path, reason } => {
                write!(f, "cannot decode image {}: {}", path.display(), reason)
            }
            StitchError::EmptyInput { chapter } => {
                write!(f, "chapter {} contains no images", chapter)
            }
            StitchError::Export(message) => write!(f, "export error: {}", message),
            StitchError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            StitchError::WorkerPool(message) => {
                write!(f, "cannot start worker pool: {}", message)
            }
            StitchError::WorkerFailed {
                worker,
                chapter,
                failed_workers,
                total_workers,
                ..
            } => write!(
                f,
                "worker {} failed on {} ({} of {} workers failed)",
                worker,
                chapter.display(),
                failed_workers,
                total_workers
            ),
            StitchError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for StitchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StitchError::WorkerFailed { source, .. } => Some(source.as_ref()),
            StitchError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StitchError {
    fn from(value: std::io::Error) -> Self {
        StitchError::Io(value)
    }
}

impl StitchError {
    /// Unwraps a worker aggregate down to the error that started it.
    pub fn root_cause(&self) -> &StitchError {
        match self {
            StitchError::WorkerFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
