//! Source Tree Configuration
//!
//! Writes pjproject's `config_site.h` and resets the install prefix so the
//! architecture builds start from an empty destination.

use std::path::Path;
use tracing::info;

/// Write `lines` (newline-terminated) to the header at `path`
pub async fn write_config_site(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }

    tokio::fs::write(path, content).await?;
    info!("Wrote {:?}", path);
    Ok(())
}

/// Remove `dir` with everything in it and create it again empty
pub async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

/// Configure the source tree and reset the install prefix
pub async fn configure(config_site: &Path, lines: &[String], result_dir: &Path) -> std::io::Result<()> {
    write_config_site(config_site, lines).await?;
    reset_dir(result_dir).await?;
    info!("Reset install prefix {:?}", result_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pjbuild_core::config::PlatformConfig;

    #[tokio::test]
    async fn test_configure() {
        let dir = tempfile::tempdir().unwrap();
        let header_dir = dir.path().join("src/pjlib/include/pj");
        std::fs::create_dir_all(&header_dir).unwrap();
        let header = header_dir.join("config_site.h");

        let result = dir.path().join("result");
        std::fs::create_dir_all(result.join("lib")).unwrap();
        std::fs::write(result.join("lib/libold.a"), b"x").unwrap();

        configure(&header, &PlatformConfig::default().config_site, &result)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&header).unwrap(),
            "#define PJ_CONFIG_IPHONE 1\n#include <pj/config_site_sample.h>\n"
        );
        assert!(result.is_dir());
        assert_eq!(std::fs::read_dir(&result).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_tree_fails() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("src/pjlib/include/pj/config_site.h");
        let result = configure(&header, &["x".to_string()], &dir.path().join("result")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reset_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fresh");
        reset_dir(&target).await.unwrap();
        assert!(target.is_dir());
    }
}
