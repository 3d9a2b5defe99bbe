//! Toolchain Detection
//!
//! Checks that the external programs a run needs are installed before any
//! stage touches the staging area.

use std::path::PathBuf;
use tracing::{info, debug};
use which::which;

/// Toolchain detection errors
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("{0} not found on PATH")]
    NotFound(String),
}

impl From<DetectionError> for pjbuild_core::PjBuildError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::NotFound(tool) => pjbuild_core::PjBuildError::ToolchainNotFound(tool),
        }
    }
}

/// A located program
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub path: PathBuf,
}

/// Toolchain detector
pub struct ToolchainDetector;

impl ToolchainDetector {
    /// Locate one program
    pub fn find(name: &str) -> Result<ToolInfo, DetectionError> {
        match which(name) {
            Ok(path) => {
                debug!("Found {} at {:?}", name, path);
                Ok(ToolInfo {
                    name: name.to_string(),
                    path,
                })
            }
            Err(_) => Err(DetectionError::NotFound(name.to_string())),
        }
    }

    /// Locate every program, failing on the first missing one
    pub fn require<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Vec<ToolInfo>, DetectionError> {
        let tools = names
            .into_iter()
            .map(Self::find)
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Toolchain ready: {}",
            tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let err = ToolchainDetector::find("pjbuild-no-such-tool").unwrap_err();
        assert_eq!(err.to_string(), "pjbuild-no-such-tool not found on PATH");
    }

    #[cfg(unix)]
    #[test]
    fn test_require_stops_on_missing() {
        let result = ToolchainDetector::require(["sh", "pjbuild-no-such-tool"]);
        assert!(matches!(result, Err(DetectionError::NotFound(name)) if name == "pjbuild-no-such-tool"));
    }
}
