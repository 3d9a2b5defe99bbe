//! Staging Workspace
//!
//! The fixed directory tree shared by all pipeline stages. Stages never hand
//! data to each other in memory; they only agree on these paths.

use std::path::{Path, PathBuf};

use crate::config::{AppConfig, LayoutConfig};

/// Staging area rooted at an absolute directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    build: PathBuf,
    sources: PathBuf,
    result: PathBuf,
    archive: PathBuf,
}

impl Workspace {
    /// Create the layout for `root` (made absolute against the current directory)
    pub fn new(root: impl AsRef<Path>, layout: &LayoutConfig, archive_name: &str) -> std::io::Result<Self> {
        let root = std::path::absolute(root.as_ref())?;
        let build = root.join(&layout.build_dir);

        Ok(Self {
            sources: build.join(&layout.sources_dir),
            result: build.join(&layout.result_dir),
            archive: build.join(archive_name),
            build,
            root,
        })
    }

    /// Create the layout described by a full configuration
    pub fn from_config(root: impl AsRef<Path>, config: &AppConfig) -> std::io::Result<Self> {
        Self::new(root, &config.layout, &config.source.archive_name)
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `build/`
    pub fn build_dir(&self) -> &Path {
        &self.build
    }

    /// `build/pjsip.tar.bz2`
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// `build/src/`
    pub fn sources_dir(&self) -> &Path {
        &self.sources
    }

    /// `build/result/`, the install prefix shared by every triple
    pub fn result_dir(&self) -> &Path {
        &self.result
    }

    /// `build/result/lib/`
    pub fn lib_dir(&self) -> PathBuf {
        self.result.join("lib")
    }

    /// `build/result/include/`
    pub fn include_dir(&self) -> PathBuf {
        self.result.join("include")
    }

    /// `build/src/pjlib/include/pj/config_site.h`
    pub fn config_site_path(&self) -> PathBuf {
        self.sources
            .join("pjlib")
            .join("include")
            .join("pj")
            .join("config_site.h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let ws = Workspace::from_config("/work", &AppConfig::default()).unwrap();

        assert_eq!(ws.archive_path(), Path::new("/work/build/pjsip.tar.bz2"));
        assert_eq!(ws.sources_dir(), Path::new("/work/build/src"));
        assert_eq!(ws.result_dir(), Path::new("/work/build/result"));
        assert_eq!(ws.lib_dir(), PathBuf::from("/work/build/result/lib"));
        assert_eq!(
            ws.config_site_path(),
            PathBuf::from("/work/build/src/pjlib/include/pj/config_site.h")
        );
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let ws = Workspace::new("some/dir", &LayoutConfig::default(), "a.tar.bz2").unwrap();
        assert!(ws.root().is_absolute());
        assert!(ws.result_dir().is_absolute());
        assert!(ws.root().ends_with("some/dir"));
    }
}
