//! Shared, write-once cache of runner packages.
//!
//! Layout: `<base>/_cache/<version>/actions-runner-<platform>-<version>.tar.gz`.
//! Downloads land in a temporary file next to their final location and are
//! renamed into place without clobbering, so concurrent runs never observe a
//! truncated package.

use crate::error::{FleetError, Result};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Release download root for actions/runner
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com/actions/runner/releases/download";

/// Where runner packages come from
pub trait ArtifactSource {
    /// File name of the package for `version`
    fn file_name(&self, version: &str) -> String;

    /// Stream the package for `version` into `dest`, returning bytes written
    fn fetch(&self, version: &str, dest: &mut dyn Write) -> Result<u64>;
}

/// Downloads packages from GitHub releases over HTTPS
pub struct HttpSource {
    base_url: String,
    platform: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            platform: platform.into(),
        }
    }

    pub fn url(&self, version: &str) -> String {
        format!(
            "{}/v{}/{}",
            self.base_url.trim_end_matches('/'),
            version,
            self.file_name(version)
        )
    }
}

impl ArtifactSource for HttpSource {
    fn file_name(&self, version: &str) -> String {
        format!("actions-runner-{}-{}.tar.gz", self.platform, version)
    }

    fn fetch(&self, version: &str, dest: &mut dyn Write) -> Result<u64> {
        let url = self.url(version);
        let download_err = |reason: String| FleetError::Download {
            version: version.to_string(),
            reason,
        };

        debug!(%url, "requesting runner package");
        let response = ureq::get(&url)
            .call()
            .map_err(|e| download_err(e.to_string()))?;

        let length = response
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok());

        let bar = if io::stderr().is_terminal() {
            let bar = ProgressBar::new(length.unwrap_or(0));
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            bar.set_message(format!("runner {}", version));
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut reader = bar.wrap_read(response.into_reader());
        let written = io::copy(&mut reader, dest).map_err(|e| download_err(e.to_string()))?;
        bar.finish_and_clear();

        if let Some(expected) = length {
            if written != expected {
                return Err(download_err(format!(
                    "truncated download: got {} of {} bytes",
                    written, expected
                )));
            }
        }

        Ok(written)
    }
}

/// Version-keyed package cache shared by every target of a batch
pub struct ArtifactCache<'a> {
    root: PathBuf,
    source: &'a dyn ArtifactSource,
    resolved: RefCell<HashMap<String, PathBuf>>,
}

impl<'a> ArtifactCache<'a> {
    pub fn new(root: impl Into<PathBuf>, source: &'a dyn ArtifactSource) -> Self {
        Self {
            root: root.into(),
            source,
            resolved: RefCell::new(HashMap::new()),
        }
    }

    pub fn artifact_path(&self, version: &str) -> PathBuf {
        self.root
            .join(version)
            .join(self.source.file_name(version))
    }

    /// Make sure the package for `version` is cached and return its path.
    ///
    /// Cached versions are returned without touching the network. Any failure
    /// is reported as [`FleetError::Download`].
    pub fn ensure_artifact(&self, version: &str) -> Result<PathBuf> {
        if let Some(path) = self.resolved.borrow().get(version) {
            return Ok(path.clone());
        }

        let path = self.artifact_path(version);
        if path.is_file() {
            debug!(version, path = %path.display(), "runner package already cached");
        } else {
            self.download(version, &path)?;
        }

        self.resolved
            .borrow_mut()
            .insert(version.to_string(), path.clone());
        Ok(path)
    }

    fn download(&self, version: &str, path: &Path) -> Result<()> {
        let download_err = |reason: String| FleetError::Download {
            version: version.to_string(),
            reason,
        };

        let dir = path
            .parent()
            .ok_or_else(|| download_err(format!("invalid cache path {}", path.display())))?;
        fs::create_dir_all(dir).map_err(|e| download_err(e.to_string()))?;

        // Dropped (and deleted) on any early return below
        let mut partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".partial")
            .tempfile_in(dir)
            .map_err(|e| download_err(e.to_string()))?;

        info!(version, "downloading runner package");
        let bytes = self
            .source
            .fetch(version, partial.as_file_mut())
            .map_err(|e| match e {
                FleetError::Download { .. } => e,
                other => download_err(other.to_string()),
            })?;
        partial
            .as_file()
            .sync_all()
            .map_err(|e| download_err(e.to_string()))?;

        match partial.persist_noclobber(path) {
            Ok(_) => {
                info!(version, bytes, path = %path.display(), "runner package cached");
                Ok(())
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(version, "runner package cached concurrently, keeping existing file");
                Ok(())
            }
            Err(e) => Err(download_err(e.error.to_string())),
        }
    }
}

/// Unpack a gzip'd runner package into `dest`
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let extract_err = |reason: String| FleetError::Extract {
        archive: archive.to_path_buf(),
        dest: dest.to_path_buf(),
        reason,
    };

    fs::create_dir_all(dest).map_err(|e| extract_err(e.to_string()))?;
    let file = File::open(archive).map_err(|e| extract_err(e.to_string()))?;

    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.set_preserve_permissions(true);
    tarball
        .unpack(dest)
        .map_err(|e| extract_err(e.to_string()))?;

    debug!(archive = %archive.display(), dest = %dest.display(), "runner package extracted");
    Ok(())
}
