//! Working directory for received and filtered images.
//!
//! Layout:
//!   {work_dir}/2024-05-01_12-30-00.png          received original
//!   {work_dir}/blurred_2024-05-01_12-30-00.png  filtered result
//!
//! Names have one-second resolution. Jobs run one at a time, so a clash
//! only happens when two jobs finish inside the same second; the later
//! file then replaces the earlier one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

/// Prefix applied to the filtered derivative of an original.
pub const FILTERED_PREFIX: &str = "blurred_";

const NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create work dir {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} has no file name")]
    NoFileName(PathBuf),
}

#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

/// File name for an original received at `at`.
pub fn original_name(at: NaiveDateTime) -> String {
    format!("{}.png", at.format(NAME_FORMAT))
}

impl WorkDir {
    /// Create the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::CreateDir {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist the bytes of a received image under a timestamped name.
    pub fn store_original(&self, data: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.root.join(original_name(Local::now().naive_local()));
        write_atomic(&path, data)?;
        tracing::trace!(path = %path.display(), bytes = data.len(), "original stored");
        Ok(path)
    }

    /// Persist a filtered image next to its original.
    pub fn store_filtered(&self, original: &Path, data: &[u8]) -> Result<PathBuf, StorageError> {
        let path = filtered_path(original)?;
        write_atomic(&path, data)?;
        tracing::trace!(path = %path.display(), bytes = data.len(), "filtered image stored");
        Ok(path)
    }
}

/// `dir/name.png` → `dir/blurred_name.png`.
pub fn filtered_path(original: &Path) -> Result<PathBuf, StorageError> {
    let name = original
        .file_name()
        .ok_or_else(|| StorageError::NoFileName(original.to_path_buf()))?;
    let mut filtered = FILTERED_PREFIX.to_string();
    filtered.push_str(&name.to_string_lossy());
    Ok(original.with_file_name(filtered))
}

// Temp file then rename, so readers never observe a half-written image.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    let tmp_path = path.with_extension("png.tmp");
    let written = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(source));
    }
    Ok(())
}
