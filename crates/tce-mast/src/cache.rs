//! On-disk light-curve cache layout.
//!
//! Files live under `<root>/mastDownload/TESS/<obs_id>/<filename>`, the
//! layout astropy-based tooling uses, so an existing cache is reused as-is.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tce_core::{Error, Result};

use crate::archive::DataProduct;

/// Suffix for files still being downloaded.
const PARTIAL_SUFFIX: &str = ".part";

/// Distinguishes concurrent downloads of the same product.
static NEXT_PARTIAL: AtomicU64 = AtomicU64::new(0);

/// Cache directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    /// Creates a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of a product.
    pub fn product_path(&self, product: &DataProduct) -> PathBuf {
        self.root
            .join("mastDownload")
            .join("TESS")
            .join(sanitize(&product.obs_id))
            .join(sanitize(&product.filename))
    }

    /// Reserves a temporary file next to `path` for one download.
    ///
    /// Every call yields a distinct name (`<file>.<pid>-<seq>.part`), so two
    /// tasks resolving to the same product never write the same file.
    pub fn partial_file(path: &Path) -> PartialFile {
        let seq = NEXT_PARTIAL.fetch_add(1, Ordering::Relaxed);
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}-{seq}{PARTIAL_SUFFIX}", std::process::id()));
        PartialFile {
            path: path.with_file_name(name),
            persisted: false,
        }
    }

    /// Returns `true` for names produced by [`CacheLayout::partial_file`].
    pub fn is_partial(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "part")
    }

    /// Returns `true` if `path` exists and is a non-empty file.
    pub async fn is_cached(path: &Path) -> bool {
        matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > 0)
    }

    /// Creates the cache root; with `world_writable` it is chmod 0777 so
    /// containers running under arbitrary UIDs can write to it.
    pub async fn ensure_root(&self, world_writable: bool) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io_with_path(e, &self.root))?;

        if world_writable {
            set_world_writable(&self.root).await?;
        }

        tracing::info!(path = %self.root.display(), "Light-curve cache ready");
        Ok(())
    }
}

/// A download in progress.
///
/// The file is removed on drop unless [`PartialFile::persist`] moved it into
/// place, so failed and cancelled downloads leave nothing behind.
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    persisted: bool,
}

impl PartialFile {
    /// Where the download is written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the finished download to `dest`, replacing any file there.
    pub async fn persist(mut self, dest: &Path) -> Result<()> {
        tokio::fs::rename(&self.path, dest)
            .await
            .map_err(|e| Error::io_with_path(e, dest))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.persisted {
            // Absent when the download never started
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(unix)]
async fn set_world_writable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::io_with_path(e, path))?;
    if meta.permissions().mode() & 0o777 == 0o777 {
        return Ok(());
    }
    match tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).await {
        Ok(()) => Ok(()),
        // Mounted volumes owned by another UID; usable if already writable
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::warn!(path = %path.display(), "Cannot chmod cache root: {e}");
            Ok(())
        }
        Err(e) => Err(Error::io_with_path(e, path)),
    }
}

#[cfg(not(unix))]
async fn set_world_writable(_path: &Path) -> Result<()> {
    Ok(())
}

fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
