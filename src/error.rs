use thiserror::Error;

/// Errors surfaced by the engine's fallible entry points.
///
/// Per-process suspend/resume failures are never errors; they are counted in reports.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to snapshot running processes: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} is only supported on Windows")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
