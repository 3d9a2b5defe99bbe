//! iOS Target Triples
//!
//! The architectures pjproject is built for and the environment each one
//! hands to `configure-iphone`.

use indexmap::IndexMap;
use pjbuild_core::config::{PlatformConfig, TargetsConfig};

use crate::env::EnvManager;

/// Which SDK a triple is compiled against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// iPhoneOS (device)
    Device,
    /// iPhoneSimulator
    Simulator,
}

impl Platform {
    /// Get the platform name as used in stage logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Device => "iphoneos",
            Platform::Simulator => "iphonesimulator",
        }
    }
}

/// One build target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTriple {
    /// Architecture name, also the suffix of per-triple library names
    pub name: String,
    pub platform: Platform,
    /// Variables added on top of the inherited environment, in order
    pub env: IndexMap<String, String>,
}

impl TargetTriple {
    /// Create a triple with no environment overrides
    pub fn new(name: impl Into<String>, platform: Platform) -> Self {
        Self {
            name: name.into(),
            platform,
            env: IndexMap::new(),
        }
    }

    /// Whether the architecture is 64-bit
    pub fn is_64_bit(&self) -> bool {
        matches!(self.name.as_str(), "arm64" | "x86_64")
    }
}

/// Ordered set of triples sharing a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleSet {
    pub platform: Platform,
    pub triples: Vec<TargetTriple>,
}

impl TripleSet {
    /// Build the set for `platform` from configured names, with overrides filled in
    pub fn from_names<'a>(
        platform: Platform,
        names: impl IntoIterator<Item = &'a str>,
        settings: &PlatformConfig,
    ) -> Self {
        let env = EnvManager::new(settings.clone());
        let triples = names
            .into_iter()
            .map(|name| {
                let mut triple = TargetTriple::new(name, platform);
                triple.env = env.overrides_for(&triple);
                triple
            })
            .collect();

        Self { platform, triples }
    }

    /// Device set from configuration
    pub fn device(targets: &TargetsConfig, settings: &PlatformConfig) -> Self {
        Self::from_names(Platform::Device, targets.device.iter().map(String::as_str), settings)
    }

    /// Simulator set from configuration
    pub fn simulator(targets: &TargetsConfig, settings: &PlatformConfig) -> Self {
        Self::from_names(Platform::Simulator, targets.simulator.iter().map(String::as_str), settings)
    }

    /// Triple names, in build order
    pub fn names(&self) -> Vec<&str> {
        self.triples.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}
