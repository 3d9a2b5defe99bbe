//! Archive Extraction
//!
//! Unpacks the bzip2-compressed source tarball into a fresh source tree,
//! dropping the release's top-level wrapper directory.

use std::path::{Component, Path, PathBuf};
use tracing::{info, debug};

use crate::downloader::DownloadError;

/// Leading path components removed from every archive entry
pub const STRIP_COMPONENTS: usize = 1;

/// Replace `target_dir` with the contents of `archive`.
///
/// The destination is removed and recreated unconditionally, so anything
/// already there is lost.
pub async fn extract_tar_bz2(archive: &Path, target_dir: &Path) -> Result<u64, DownloadError> {
    info!("Extracting {:?} to {:?}", archive, target_dir);

    if tokio::fs::metadata(target_dir).await.is_ok() {
        tokio::fs::remove_dir_all(target_dir).await?;
    }
    tokio::fs::create_dir_all(target_dir).await?;

    let archive = archive.to_path_buf();
    let target = target_dir.to_path_buf();

    // tar is synchronous
    let unpacked = tokio::task::spawn_blocking(move || unpack_stripped(&archive, &target, STRIP_COMPONENTS))
        .await
        .map_err(|e| DownloadError::Extraction(e.to_string()))??;

    info!("extracted {} entries to {:?}", unpacked, target_dir);
    Ok(unpacked)
}

fn unpack_stripped(archive: &Path, target_dir: &Path, strip: usize) -> Result<u64, DownloadError> {
    let file = std::fs::File::open(archive)?;
    let bz = bzip2::read::BzDecoder::new(file);
    let mut tar = tar::Archive::new(bz);
    tar.set_preserve_permissions(true);

    let root = target_dir.canonicalize()?;
    let mut unpacked = 0;
    let entries = tar
        .entries()
        .map_err(|e| DownloadError::Extraction(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| DownloadError::Extraction(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| DownloadError::Extraction(e.to_string()))?
            .into_owned();

        let Some(relative) = strip_components(&path, strip)? else {
            debug!("skipping wrapper entry {:?}", path);
            continue;
        };

        let outpath = target_dir.join(&relative);
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)?;
            // an earlier symlink entry could redirect the parent
            if !parent.canonicalize()?.starts_with(&root) {
                return Err(escape_error(&path));
            }
        }
        if std::fs::symlink_metadata(&outpath).map(|m| m.file_type().is_symlink()).unwrap_or(false) {
            std::fs::remove_file(&outpath)?;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| DownloadError::Extraction(e.to_string()))?
                .ok_or_else(|| DownloadError::Extraction(format!("link without target: {}", path.display())))?
                .into_owned();

            if entry_type.is_hard_link() {
                // hard link targets name archive members, wrapper included
                let Some(source) = strip_components(&link, strip)? else {
                    return Err(escape_error(&path));
                };
                std::fs::hard_link(target_dir.join(&source), &outpath).map_err(|e| {
                    DownloadError::Extraction(format!("{} -> {}: {}", relative.display(), source.display(), e))
                })?;
                unpacked += 1;
                continue;
            }

            if !link_stays_inside(&relative, &link) {
                return Err(escape_error(&path));
            }
        }

        entry
            .unpack(&outpath)
            .map_err(|e| DownloadError::Extraction(format!("{}: {}", relative.display(), e)))?;
        unpacked += 1;
    }

    Ok(unpacked)
}

fn escape_error(path: &Path) -> DownloadError {
    DownloadError::Extraction(format!(
        "archive entry escapes the source tree: {}",
        path.display()
    ))
}

/// Whether a symlink at `relative` pointing to `link` resolves inside the tree
fn link_stays_inside(relative: &Path, link: &Path) -> bool {
    let mut depth = relative.components().count().saturating_sub(1);

    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Drop `strip` leading components. `None` means nothing is left after
/// stripping (the wrapper directory itself).
fn strip_components(path: &Path, strip: usize) -> Result<Option<PathBuf>, DownloadError> {
    let mut stripped = PathBuf::new();

    for component in path.components().skip(strip) {
        match component {
            Component::Normal(part) => stripped.push(part),
            Component::CurDir => {}
            _ => return Err(escape_error(path)),
        }
    }

    // Components skipped above may themselves be unsafe
    if path
        .components()
        .take(strip)
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(escape_error(path));
    }

    Ok(if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    })
}
