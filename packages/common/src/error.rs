use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Common error type shared by the trellis crates
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<String> for CommonError {
    fn from(s: String) -> Self {
        CommonError::Generic(s)
    }
}

impl From<&str> for CommonError {
    fn from(s: &str) -> Self {
        CommonError::Generic(s.to_string())
    }
}

/// A single failed sub-operation, tagged with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub file_path: PathBuf,
    pub error: String,
}

impl Problem {
    pub fn new(file_path: impl Into<PathBuf>, error: impl fmt::Display) -> Self {
        Self {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }
}

/// Aggregated failures of a multi-file load or save.
///
/// Renders as one message listing every failed file, so surrounding tooling
/// can surface all of them at once instead of stopping at the first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemReport {
    pub problems: Vec<Problem>,
}

impl ProblemReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// `Ok(())` when nothing failed, otherwise the report itself
    pub fn into_result(self) -> Result<(), ProblemReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ProblemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error loading project:")?;
        for problem in &self.problems {
            write!(f, "\n{}:\n  {}", problem.file_path.display(), problem.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProblemReport {}
