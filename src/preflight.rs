//! Checks that must pass before any target directory is touched.

use crate::config::Config;
use crate::error::{FleetError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Locate the `gh` executable named in the config
pub fn find_gh(config: &Config) -> Result<PathBuf> {
    which::which(&config.github.gh).map_err(|_| {
        FleetError::Preflight(format!(
            "'{}' not found. Install the GitHub CLI from https://cli.github.com",
            config.github.gh
        ))
    })
}

/// Verify `gh` holds a valid login for the configured host
pub fn check_auth(gh: &Path, hostname: Option<&str>) -> Result<()> {
    let mut cmd = Command::new(gh);
    cmd.args(["auth", "status"]);
    if let Some(host) = hostname {
        cmd.args(["--hostname", host]);
    }

    let output = cmd
        .output()
        .map_err(|e| FleetError::Preflight(format!("failed to run {}: {}", gh.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FleetError::Preflight(format!(
            "gh is not authenticated{}. Run 'gh auth login' first",
            stderr
                .lines()
                .find(|l| !l.trim().is_empty())
                .map(|l| format!(" ({})", l.trim()))
                .unwrap_or_default()
        )));
    }

    debug!(gh = %gh.display(), "gh authenticated");
    Ok(())
}

/// Create the base directory if needed and make sure it is a directory
pub fn prepare_base_dir(base_dir: &Path) -> Result<()> {
    fs::create_dir_all(base_dir).map_err(|e| {
        FleetError::Preflight(format!(
            "cannot create base directory {}: {}",
            base_dir.display(),
            e
        ))
    })?;

    if !base_dir.is_dir() {
        return Err(FleetError::Preflight(format!(
            "{} is not a directory",
            base_dir.display()
        )));
    }
    Ok(())
}

/// All control-plane checks: `gh` is installed and logged in
pub fn control_plane(config: &Config) -> Result<PathBuf> {
    let gh = find_gh(config)?;
    check_auth(&gh, config.github.hostname.as_deref())?;
    Ok(gh)
}
