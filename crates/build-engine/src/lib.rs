//! pjbuild Build Engine
//!
//! Builds pjproject once per iOS target triple and merges the per-triple
//! static libraries into fat libraries with lipo.

pub mod config;
pub mod arch_build;
pub mod lipo;
pub mod runner;

pub use config::{NativeBuildConfig, NativeStep};
pub use arch_build::ArchitectureBuilder;
pub use lipo::{LibraryMerger, LibraryGroup, LibraryScan, MergePolicy, MergeReport, SuffixConvention};
pub use runner::{CommandRunner, CommandSpec, CommandOutput, ProcessRunner};

use pjbuild_core::PjBuildError;

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("`{command}` failed with exit code {code:?}:\n{output}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },
    #[error("Could not start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Merging {library} failed: {reason}")]
    MergeFailed { library: String, reason: String },
    #[error("Library {library} is incomplete: missing {missing:?}, duplicated {duplicated:?}")]
    IncompleteGroup {
        library: String,
        missing: Vec<String>,
        duplicated: Vec<String>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BuildError> for PjBuildError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Io(e) => PjBuildError::Io(e),
            err @ (BuildError::MergeFailed { .. } | BuildError::IncompleteGroup { .. }) => {
                PjBuildError::Merge(err.to_string())
            }
            err @ BuildError::Spawn { .. } => PjBuildError::Process(err.to_string()),
            err @ BuildError::CommandFailed { .. } => PjBuildError::Build(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: PjBuildError = BuildError::MergeFailed {
            library: "libpj.a".into(),
            reason: "lipo exited with 1".into(),
        }
        .into();
        assert!(matches!(err, PjBuildError::Merge(msg) if msg.contains("libpj.a")));

        let err: PjBuildError = BuildError::CommandFailed {
            command: "make dep".into(),
            code: Some(2),
            output: "no rule".into(),
        }
        .into();
        assert!(matches!(err, PjBuildError::Build(msg) if msg.contains("make dep") && msg.contains("no rule")));
    }
}
