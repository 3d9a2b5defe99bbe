//! Environment Manager
//!
//! Computes the variables `configure-iphone` reads for each target triple.
//! Variable names are pjproject's contract and must match exactly.

use indexmap::IndexMap;
use pjbuild_core::config::PlatformConfig;

use crate::ios::{Platform, TargetTriple};

/// Compiler flags
pub const CFLAGS: &str = "CFLAGS";
/// Linker flags
pub const LDFLAGS: &str = "LDFLAGS";
/// Simulator platform developer directory
pub const DEVPATH: &str = "DEVPATH";
/// Architecture selector
pub const ARCH: &str = "ARCH";

/// Environment Manager
pub struct EnvManager {
    settings: PlatformConfig,
}

impl EnvManager {
    /// Create a new environment manager
    pub fn new(settings: PlatformConfig) -> Self {
        Self { settings }
    }

    /// Compiler flags for a triple
    pub fn compiler_flags(&self, triple: &TargetTriple) -> String {
        let min = &self.settings.deployment_target;
        match triple.platform {
            Platform::Device => format!("-miphoneos-version-min={}", min),
            Platform::Simulator => {
                let width = if triple.is_64_bit() { "-m64" } else { "-m32" };
                format!("-O2 {} -mios-simulator-version-min={}", width, min)
            }
        }
    }

    /// Variables added to the inherited environment when building `triple`
    pub fn overrides_for(&self, triple: &TargetTriple) -> IndexMap<String, String> {
        let flags = self.compiler_flags(triple);
        let mut vars = IndexMap::new();

        vars.insert(CFLAGS.to_string(), flags.clone());
        vars.insert(LDFLAGS.to_string(), flags);

        if triple.platform == Platform::Simulator {
            vars.insert(
                DEVPATH.to_string(),
                self.settings.simulator_devpath.to_string_lossy().to_string(),
            );
        }

        vars.insert(ARCH.to_string(), format!("-arch {}", triple.name));
        vars
    }

    /// Get shell export commands (for `pjbuild plan`)
    pub fn shell_exports(vars: &IndexMap<String, String>) -> String {
        let mut exports = String::new();
        for (key, value) in vars {
            exports.push_str(&format!("export {}=\"{}\"\n", key, value));
        }
        exports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_overrides() {
        let env = EnvManager::new(PlatformConfig::default());
        let vars = env.overrides_for(&TargetTriple::new("armv7s", Platform::Device));

        let keys: Vec<&str> = vars.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["CFLAGS", "LDFLAGS", "ARCH"]);
        assert_eq!(vars["CFLAGS"], "-miphoneos-version-min=7.0");
        assert_eq!(vars["LDFLAGS"], "-miphoneos-version-min=7.0");
        assert_eq!(vars["ARCH"], "-arch armv7s");
    }

    #[test]
    fn test_simulator_overrides() {
        let env = EnvManager::new(PlatformConfig::default());

        let i386 = env.overrides_for(&TargetTriple::new("i386", Platform::Simulator));
        assert_eq!(i386["CFLAGS"], "-O2 -m32 -mios-simulator-version-min=7.0");
        assert!(i386["DEVPATH"].ends_with("iPhoneSimulator.platform/Developer"));
        assert_eq!(i386["ARCH"], "-arch i386");

        let x86_64 = env.overrides_for(&TargetTriple::new("x86_64", Platform::Simulator));
        assert_eq!(x86_64["LDFLAGS"], "-O2 -m64 -mios-simulator-version-min=7.0");
    }

    #[test]
    fn test_deployment_target() {
        let settings = PlatformConfig {
            deployment_target: "9.0".to_string(),
            ..Default::default()
        };
        let env = EnvManager::new(settings);
        assert_eq!(
            env.compiler_flags(&TargetTriple::new("arm64", Platform::Device)),
            "-miphoneos-version-min=9.0"
        );
    }

    #[test]
    fn test_shell_exports() {
        let mut vars = IndexMap::new();
        vars.insert("ARCH".to_string(), "-arch arm64".to_string());
        assert_eq!(EnvManager::shell_exports(&vars), "export ARCH=\"-arch arm64\"\n");
    }
}
