use thiserror::Error;

/// Errors that abort a scan before a report can be produced.
///
/// Per-file problems (missing file, tool failure, failed download) are not
/// errors: they are recorded as an [`AnalysisOutcome`](crate::analysis::AnalysisOutcome)
/// and the scan carries on.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing or malformed repository URL. The pipeline never starts.
    #[error("invalid repository URL: {0}")]
    Input(String),

    /// The repository host refused or failed a listing call.
    #[error("failed to fetch repository contents at '{path}': {reason}")]
    Upstream { path: String, reason: String },

    /// The repository contains no files with the tracked suffix.
    #[error("no {suffix} files found in the repository")]
    EmptyResult { suffix: String },

    #[error("scratch storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// HTTP-style status used by the request surface.
    pub fn status_code(&self) -> u16 {
        match self {
            ScanError::Input(_) => 400,
            ScanError::EmptyResult { .. } => 404,
            ScanError::Upstream { .. } => 502,
            ScanError::Io(_) | ScanError::Internal(_) => 500,
        }
    }

    pub fn upstream(path: &str, reason: impl std::fmt::Display) -> Self {
        ScanError::Upstream {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            reason: reason.to_string(),
        }
    }
}
