use std::path::PathBuf;

use thiserror::Error;

pub type PackResult<T> = Result<T, PackError>;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing command `{command}` on PATH")]
    CommandMissing { command: String },

    #[error("input asset does not exist or is not a file: `{0}`")]
    InputMissing(PathBuf),

    #[error("command failed: `{command}` (status: {status}){stderr_suffix}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr_suffix: String,
    },

    #[error("missing expected artifact at `{0}`")]
    MissingArtifact(PathBuf),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PackError {
    #[must_use]
    pub fn from_command_failure(command: String, status: i32, stderr: String) -> Self {
        let trimmed = stderr.trim();
        let stderr_suffix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("; stderr: {trimmed}")
        };
        Self::CommandFailed {
            command,
            status,
            stderr_suffix,
        }
    }

    /// `true` for failures raised before any artifact is touched.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::CommandMissing { .. } | Self::InputMissing(_))
    }

    /// Stable, machine-readable code for every variant.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "FE-IO",
            Self::Json(_) => "FE-JSON",
            Self::CommandMissing { .. } => "FE-CMD-MISSING",
            Self::InputMissing(_) => "FE-INPUT-MISSING",
            Self::CommandFailed { .. } => "FE-CMD-FAILED",
            Self::MissingArtifact(_) => "FE-MISSING-ARTIFACT",
            Self::InvalidRequest(_) => "FE-INVALID-REQUEST",
        }
    }
}
