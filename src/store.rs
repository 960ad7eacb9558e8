use std::fs;
use std::io;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Url;
use serde::Serialize;
use tempfile::{Builder, NamedTempFile};

use crate::error::HlsError;
use crate::granule::GranuleFile;

pub const STAGING_PREFIX: &str = ".hls-fetch-";
const STAGING_SUFFIX: &str = ".part";
const STALE_STAGING_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Flat directory of downloaded files keyed by filename.
///
/// A non-empty file under its canonical name is the only record that a file
/// has been fetched. In-progress downloads live under a staging name and are
/// renamed into place once complete.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Promoted,
    AlreadyPresent,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub path: Utf8PathBuf,
    pub size_bytes: u64,
    pub label: String,
    pub granule: Option<GranuleFile>,
}

impl OutputStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn absolute_root(&self) -> Utf8PathBuf {
        std::path::absolute(self.root.as_std_path())
            .ok()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .unwrap_or_else(|| self.root.clone())
    }

    pub fn ensure_root(&self) -> Result<(), HlsError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| HlsError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn path_for(&self, filename: &str) -> Utf8PathBuf {
        self.root.join(filename)
    }

    pub fn is_present(&self, filename: &str) -> bool {
        fs::metadata(self.path_for(filename).as_std_path())
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }

    pub fn stage(&self, filename: &str) -> Result<NamedTempFile, HlsError> {
        Builder::new()
            .prefix(&format!("{STAGING_PREFIX}{filename}."))
            .suffix(STAGING_SUFFIX)
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| HlsError::Filesystem(format!("create staging file: {err}")))
    }

    /// Renames a completed staging file to its canonical name without ever
    /// overwriting a complete file written by someone else.
    pub fn promote(&self, staged: NamedTempFile, filename: &str) -> Result<Promotion, HlsError> {
        let path = self.path_for(filename);
        let err = match staged.persist_noclobber(path.as_std_path()) {
            Ok(_) => return Ok(Promotion::Promoted),
            Err(err) => err,
        };
        if self.is_present(filename) {
            return Ok(Promotion::AlreadyPresent);
        }
        if err.error.kind() != io::ErrorKind::AlreadyExists {
            return Err(HlsError::Filesystem(format!("promote {path}: {}", err.error)));
        }
        // An empty leftover under the canonical name does not count as fetched.
        fs::remove_file(path.as_std_path())
            .map_err(|remove| HlsError::Filesystem(format!("remove {path}: {remove}")))?;
        err.file
            .persist_noclobber(path.as_std_path())
            .map(|_| Promotion::Promoted)
            .map_err(|err| HlsError::Filesystem(format!("promote {path}: {}", err.error)))
    }

    /// Removes staging files left behind by runs that were killed outright.
    pub fn remove_stale_staging(&self) -> Result<usize, HlsError> {
        let entries = match fs::read_dir(self.root.as_std_path()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(HlsError::Filesystem(err.to_string())),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|err| HlsError::Filesystem(err.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(STAGING_PREFIX) {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .is_some_and(|age| age >= STALE_STAGING_AGE);
            if stale && fs::remove_file(entry.path()).is_ok() {
                tracing::debug!(file = name, "removed stale staging file");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Canonical files in the store, sorted by filename. Staging files and
    /// empty files are skipped.
    pub fn list(&self) -> Result<Vec<StoredFile>, HlsError> {
        let entries = match fs::read_dir(self.root.as_std_path()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(HlsError::Filesystem(err.to_string())),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| HlsError::Filesystem(err.to_string()))?;
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if filename.starts_with(STAGING_PREFIX) {
                continue;
            }
            let meta = entry
                .metadata()
                .map_err(|err| HlsError::Filesystem(err.to_string()))?;
            if !meta.is_file() || meta.len() == 0 {
                continue;
            }
            let granule: Option<GranuleFile> = filename.parse().ok();
            let label = granule
                .as_ref()
                .map(GranuleFile::label)
                .unwrap_or_else(|| filename.clone());
            files.push(StoredFile {
                path: self.path_for(&filename),
                size_bytes: meta.len(),
                label,
                granule,
                filename,
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }
}

/// Final path segment of a URL, ignoring any query string or fragment.
pub fn filename_from_url(url: &str) -> Result<String, HlsError> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .ok_or_else(|| HlsError::InvalidFilename(url.to_string()))
}
