use crate::error::{FleetError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files written by `config.sh` once a runner is registered
pub const MARKER_FILES: [&str; 2] = [".runner", ".credentials"];

/// Secondary registration state removed together with the markers
const AUXILIARY_MARKERS: [&str; 1] = [".credentials_rsaparams"];

/// Written by `svc.sh install`, removed by `svc.sh uninstall`
pub const SERVICE_FILE: &str = ".service";

/// Executable entry point of an extracted runner package
pub const ENTRY_POINT: &str = "config.sh";

/// Reserved directory under the base dir holding the artifact cache
pub const CACHE_DIR_NAME: &str = "_cache";

/// Ordered set of runner labels: first occurrence wins, duplicates dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label, returning false when it was already present or blank
    pub fn insert(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || self.0.iter().any(|l| l == label) {
            return false;
        }
        self.0.push(label.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Comma-separated form accepted by `config.sh --labels`
    pub fn to_arg(&self) -> String {
        self.0.join(",")
    }
}

impl<S: AsRef<str>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for label in iter {
            set.insert(label.as_ref());
        }
        set
    }
}

/// One repository's provisioning unit. Owns `dir` exclusively.
#[derive(Debug, Clone)]
pub struct Target {
    pub owner: String,
    pub name: String,
    pub dir: PathBuf,
    pub labels: LabelSet,
    pub work_dir: String,
    pub server_url: String,
}

#[derive(Debug, Deserialize)]
struct RunnerFile {
    #[serde(rename = "agentName")]
    agent_name: Option<String>,
}

impl Target {
    /// `owner/name`, the control-plane scope of this target
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Repository URL passed to `config.sh --url`
    pub fn url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.server_url.trim_end_matches('/'),
            self.owner,
            self.name
        )
    }

    /// Registration marker: both marker files are present
    pub fn is_configured(&self) -> bool {
        MARKER_FILES.iter().all(|f| self.dir.join(f).is_file())
    }

    pub fn has_entry_point(&self) -> bool {
        self.dir.join(ENTRY_POINT).is_file()
    }

    pub fn has_service(&self) -> bool {
        self.dir.join(SERVICE_FILE).is_file()
    }

    /// Delete local registration state. Missing files are not an error.
    pub fn clear_markers(&self) -> io::Result<()> {
        for file in MARKER_FILES.iter().chain(AUXILIARY_MARKERS.iter()) {
            match fs::remove_file(self.dir.join(file)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Runner name recorded in `.runner`, if the file exists and parses
    pub fn registered_name(&self) -> Option<String> {
        let content = fs::read_to_string(self.dir.join(".runner")).ok()?;
        // config.sh writes the file with a UTF-8 BOM
        let content = content.trim_start_matches('\u{feff}');
        serde_json::from_str::<RunnerFile>(content).ok()?.agent_name
    }
}

/// Everything shared by the targets of one batch
#[derive(Debug, Clone)]
pub struct TargetDefaults {
    pub owner: String,
    pub base_dir: PathBuf,
    pub labels: LabelSet,
    pub work_dir: String,
    pub server_url: String,
}

/// Build the target list, enforcing one directory per target
pub fn build_targets(defaults: &TargetDefaults, names: &[String]) -> Result<Vec<Target>> {
    if defaults.owner.trim().is_empty() {
        return Err(FleetError::Preflight("owner must not be empty".to_string()));
    }
    if names.is_empty() {
        return Err(FleetError::Preflight(
            "at least one repository is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(names.len());

    for raw in names {
        let name = raw.trim();
        validate_name(name)?;
        if !seen.insert(name.to_string()) {
            return Err(FleetError::Preflight(format!(
                "repository '{}' listed more than once",
                name
            )));
        }

        targets.push(Target {
            owner: defaults.owner.clone(),
            name: name.to_string(),
            dir: defaults.base_dir.join(name),
            labels: defaults.labels.clone(),
            work_dir: defaults.work_dir.clone(),
            server_url: defaults.server_url.clone(),
        });
    }

    Ok(targets)
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name == CACHE_DIR_NAME
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_whitespace);

    if invalid {
        return Err(FleetError::Preflight(format!(
            "invalid repository name '{}'",
            name
        )));
    }
    Ok(())
}

/// Stable identifier for this machine: the short hostname
pub fn host_identifier() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .and_then(|h| h.split('.').next().map(str::to_string))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "host".to_string())
}

/// Runner name unique per host and target: `{host}-{target}`, sanitized
pub fn runner_name(host: &str, target: &str) -> String {
    sanitize_name(&format!("{}-{}", host, target))
}

/// Lowercase, alphanumeric + dash, collapse dashes
fn sanitize_name(name: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            result.push('-');
            last_was_dash = true;
        }
    }

    result.trim_matches('-').to_string()
}

/// Shared artifact cache location under a base dir
pub fn cache_root(base_dir: &Path) -> PathBuf {
    base_dir.join(CACHE_DIR_NAME)
}
