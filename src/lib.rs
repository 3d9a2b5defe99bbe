//! pjbuild - pjproject iOS cross-compiler
//!
//! Downloads pjproject, builds it once per iOS architecture and merges the
//! per-architecture static libraries into fat libraries.
//!
//! ## Architecture
//!
//! pjbuild is organized into specialized crates:
//!
//! - `pjbuild-core`: Stage orchestration, configuration and staging layout
//! - `pjbuild-toolchain`: Source download, extraction, configuration and target triples
//! - `pjbuild-build-engine`: Per-architecture builds and fat library merging

#![warn(clippy::all)]

pub mod commands;
pub mod pipeline;

// Re-export main components for library usage
pub use pjbuild_core as core;
pub use pjbuild_toolchain as toolchain;
pub use pjbuild_build_engine as build;

/// Prelude module for convenient imports
pub mod prelude {
    pub use pjbuild_core::{AppConfig, Orchestrator, Stage, Workspace};
    pub use pjbuild_toolchain::{SourceFetcher, ToolchainDetector, TripleSet};
    pub use pjbuild_build_engine::{ArchitectureBuilder, LibraryMerger, ProcessRunner};
    pub use crate::pipeline::Pipeline;
}
