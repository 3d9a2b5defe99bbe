//! Native Build Configuration
//!
//! Where pjproject's own build system runs and which commands make up one
//! per-triple build cycle.

use std::path::PathBuf;
use pjbuild_core::{config::PlatformConfig, Workspace};

use crate::runner::CommandSpec;

/// One command of the per-triple build cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeStep {
    /// `./configure-iphone --prefix=<prefix>`
    Configure,
    /// `make dep`
    Dep,
    /// `make`
    Build,
    /// `make install`
    Install,
    /// `make clean`
    Clean,
}

impl NativeStep {
    /// Every step, in execution order
    pub const CYCLE: [NativeStep; 5] = [
        NativeStep::Configure,
        NativeStep::Dep,
        NativeStep::Build,
        NativeStep::Install,
        NativeStep::Clean,
    ];

    /// Command for this step, run from the source tree without overrides
    pub fn command(&self, config: &NativeBuildConfig) -> CommandSpec {
        let make = CommandSpec::new(&config.make, &config.source_dir);
        match self {
            NativeStep::Configure => {
                CommandSpec::new(&config.configure_script, &config.source_dir).arg(config.prefix_arg())
            }
            NativeStep::Dep => make.arg("dep"),
            NativeStep::Build => make,
            NativeStep::Install => make.arg("install"),
            NativeStep::Clean => make.arg("clean"),
        }
    }
}

/// Native build configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBuildConfig {
    /// Extracted source tree; working directory of every native command
    pub source_dir: PathBuf,
    /// Absolute install prefix shared by all triples
    pub prefix: PathBuf,
    /// Configure script, relative to the source tree
    pub configure_script: String,
    /// Make program
    pub make: String,
}

impl NativeBuildConfig {
    /// Configuration for the given workspace and platform settings
    pub fn new(workspace: &Workspace, platform: &PlatformConfig) -> Self {
        Self {
            source_dir: workspace.sources_dir().to_path_buf(),
            prefix: workspace.result_dir().to_path_buf(),
            configure_script: platform.configure_script.clone(),
            make: platform.make.clone(),
        }
    }

    /// `--prefix=<prefix>` argument for the configure script
    pub fn prefix_arg(&self) -> String {
        format!("--prefix={}", self.prefix.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pjbuild_core::AppConfig;

    #[test]
    fn test_from_workspace() {
        let config = AppConfig::default();
        let ws = Workspace::from_config("/work", &config).unwrap();
        let native = NativeBuildConfig::new(&ws, &config.platform);

        assert_eq!(native.source_dir, PathBuf::from("/work/build/src"));
        assert_eq!(native.prefix_arg(), "--prefix=/work/build/result");
        assert_eq!(native.configure_script, "./configure-iphone");
    }

    #[test]
    fn test_cycle_commands() {
        let config = AppConfig::default();
        let ws = Workspace::from_config("/work", &config).unwrap();
        let native = NativeBuildConfig::new(&ws, &config.platform);

        let lines: Vec<String> = NativeStep::CYCLE
            .iter()
            .map(|s| s.command(&native).to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "./configure-iphone --prefix=/work/build/result",
                "make dep",
                "make",
                "make install",
                "make clean",
            ]
        );
        assert!(NativeStep::CYCLE
            .iter()
            .all(|s| s.command(&native).cwd == PathBuf::from("/work/build/src")));
    }
}
