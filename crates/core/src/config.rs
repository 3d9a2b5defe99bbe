//! Application Configuration
//!
//! Settings for one pjbuild run:
//! - Source archive location
//! - Staging directory layout
//! - iOS platform settings
//! - Target triples
//! - Merge behavior

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{info, debug};

use crate::error::{PjBuildError, Result};

/// Configuration file looked up in the root directory when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "pjbuild.toml";

/// Source archive configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    /// URL of the pjproject release archive
    pub url: String,
    /// File name of the archive inside the build directory
    pub archive_name: String,
    /// Expected SHA-256 of the archive (lowercase hex); unchecked when absent
    pub sha256: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://www.pjsip.org/release/2.5/pjproject-2.5.tar.bz2".to_string(),
            archive_name: "pjsip.tar.bz2".to_string(),
            sha256: None,
        }
    }
}

/// Staging directory names, relative to the root directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Build directory
    pub build_dir: String,
    /// Extracted sources, inside the build directory
    pub sources_dir: String,
    /// Install prefix, inside the build directory
    pub result_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            build_dir: "build".to_string(),
            sources_dir: "src".to_string(),
            result_dir: "result".to_string(),
        }
    }
}

/// iOS platform configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlatformConfig {
    /// Minimum iOS version passed to the compiler
    pub deployment_target: String,
    /// Developer directory of the iPhoneSimulator platform (`DEVPATH`)
    pub simulator_devpath: PathBuf,
    /// Configure script, relative to the source tree
    pub configure_script: String,
    /// Make program
    pub make: String,
    /// Lines written to `pjlib/include/pj/config_site.h`
    pub config_site: Vec<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            deployment_target: "7.0".to_string(),
            simulator_devpath: PathBuf::from(
                "/Applications/Xcode.app/Contents/Developer/Platforms/iPhoneSimulator.platform/Developer",
            ),
            configure_script: "./configure-iphone".to_string(),
            make: "make".to_string(),
            config_site: vec![
                "#define PJ_CONFIG_IPHONE 1".to_string(),
                "#include <pj/config_site_sample.h>".to_string(),
            ],
        }
    }
}

/// Target triples, built in order: device set first, then simulator set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetsConfig {
    /// Device architectures
    pub device: Vec<String>,
    /// Simulator architectures
    pub simulator: Vec<String>,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            device: vec!["armv7".to_string(), "armv7s".to_string(), "arm64".to_string()],
            simulator: vec!["i386".to_string(), "x86_64".to_string()],
        }
    }
}

impl TargetsConfig {
    /// All triple names, device set first
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.device.iter().chain(self.simulator.iter()).map(String::as_str)
    }

    /// The two sets must be disjoint and free of duplicates
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for name in self.all() {
            if name.is_empty() {
                return Err(PjBuildError::Config("empty target triple name".into()));
            }
            if !seen.insert(name) {
                return Err(PjBuildError::Config(format!(
                    "target triple `{}` is listed more than once",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Artifact merge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MergeConfig {
    /// Archive merge tool, invoked as `<tool> -create -output <dest> <inputs...>`
    pub tool: String,
    /// Static library file name prefix; other files are skipped
    pub library_prefix: String,
    /// Toolchain text that may follow the architecture in library names
    pub host_tails: Vec<String>,
    /// Fail instead of merging a group that lacks a built triple
    pub require_complete: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            tool: "lipo".to_string(),
            library_prefix: "lib".to_string(),
            host_tails: vec!["apple-darwin_ios".to_string()],
            require_complete: false,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Source archive settings
    pub source: SourceConfig,
    /// Staging layout
    pub layout: LayoutConfig,
    /// Platform settings
    pub platform: PlatformConfig,
    /// Target triples
    pub targets: TargetsConfig,
    /// Merge settings
    pub merge: MergeConfig,
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.targets.validate()?;
        Ok(config)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `<root>/pjbuild.toml` is used
    /// when present and defaults otherwise.
    pub async fn load(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        let config_file = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(PjBuildError::NotFound(path.to_path_buf()));
                }
                path.to_path_buf()
            }
            None => root.join(CONFIG_FILE_NAME),
        };

        if config_file.is_file() {
            debug!("Loading config from {:?}", config_file);
            let contents = tokio::fs::read_to_string(&config_file).await?;
            Self::from_toml(&contents)
        } else {
            info!("Config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}
