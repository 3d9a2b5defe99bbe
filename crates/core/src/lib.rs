//! pjbuild Core - Orchestrator and shared types
//!
//! This crate provides the pipeline driver, the run configuration and the
//! staging workspace layout shared by every pjbuild stage.

pub mod orchestrator;
pub mod config;
pub mod error;
pub mod workspace;

pub use orchestrator::{Orchestrator, PipelineReport, RunState, Stage, StageFailure, StageRecord};
pub use config::AppConfig;
pub use error::{PjBuildError, Result};
pub use workspace::Workspace;

/// pjbuild version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "pjbuild";
