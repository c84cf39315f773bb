//! Archive extraction into a working directory

use std::fs::File;
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::compiler::errors::EngineError;

/// File-type bits of a unix mode, and the value marking a symbolic link
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Unpack the archive at `archive_path` into `dest_dir`
///
/// Only directories and regular files are written. An entry that is a
/// symbolic link, or whose name would land outside `dest_dir`, rejects the
/// whole archive before anything is written.
pub async fn extract(archive_path: &Path, dest_dir: &Path) -> Result<usize, EngineError> {
    if !tokio::fs::try_exists(archive_path).await? {
        return Err(EngineError::MissingUpload);
    }

    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &dest_dir))
        .await
        .map_err(|join_error| {
            EngineError::Task(format!("Extraction task panicked: {}", join_error))
        })?
}

fn extract_blocking(archive_path: &Path, dest_dir: &Path) -> Result<usize, EngineError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let entries = archive.len();

    let mut targets = Vec::with_capacity(entries);
    for index in 0..entries {
        let entry = archive.by_index(index)?;
        let is_link = entry
            .unix_mode()
            .is_some_and(|mode| mode & S_IFMT == S_IFLNK);
        match entry.enclosed_name() {
            Some(relative) if !is_link => targets.push(dest_dir.join(relative)),
            _ => return Err(EngineError::UnsafeEntry(entry.name().to_string())),
        }
    }

    for (index, target) in targets.into_iter().enumerate() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    debug!(entries, dest = %dest_dir.display(), "Archive extracted");
    Ok(entries)
}
