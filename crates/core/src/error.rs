//! Error types for pjbuild
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pjbuild
#[derive(Error, Debug)]
pub enum PjBuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Toolchain not found: {0}")]
    ToolchainNotFound(String),

    #[error("Not found: {0}")]
    NotFound(PathBuf),
}

/// Result type alias for pjbuild operations
pub type Result<T> = std::result::Result<T, PjBuildError>;

impl PjBuildError {
    /// Whether re-running the pipeline unchanged may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, PjBuildError::Network(_) | PjBuildError::Download(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PjBuildError::Io(e) => format!("File operation failed: {}", e),
            PjBuildError::Network(msg) => {
                format!("Network error: {}. Please check your connection.", msg)
            }
            PjBuildError::ToolchainNotFound(tool) => {
                format!("Required tool `{}` was not found on PATH", tool)
            }
            PjBuildError::NotFound(path) => format!("Not found: {}", path.display()),
            _ => self.to_string(),
        }
    }
}
