use crate::cache::DEFAULT_DOWNLOAD_URL;
use crate::cli::{TargetArgs, UpCmd};
use crate::error::{FleetError, Result};
use crate::target::{LabelSet, TargetDefaults};
use crate::version::DEFAULT_RUNNER_VERSION;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the per-directory config file
pub const PROJECT_CONFIG_FILE: &str = "runner-fleet.toml";

/// Name of the per-user config file, relative to `$HOME`
pub const GLOBAL_CONFIG_FILE: &str = ".runner-fleet.toml";

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Account or organization owning the repositories
    pub owner: Option<String>,

    /// Repositories to provision
    pub repos: Vec<String>,

    pub runner: RunnerConfig,

    pub service: ServiceConfig,

    pub github: GithubConfig,

    /// Re-register configured runners (CLI only)
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_dir: String,
    pub version: String,
    pub labels: Vec<String>,
    pub work_dir: String,
    pub download_url: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_dir: "~/actions-runners".to_string(),
            version: DEFAULT_RUNNER_VERSION.to_string(),
            labels: vec!["self-hosted".to_string()],
            work_dir: "_work".to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Install and start a service per runner
    pub enabled: bool,

    /// Run svc.sh through `sudo -n`
    pub sudo: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sudo: cfg!(target_os = "linux"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Path or name of the gh executable
    pub gh: String,

    /// GitHub Enterprise host; github.com when unset
    pub hostname: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            gh: "gh".to_string(),
            hostname: None,
        }
    }
}

/// One TOML file as written. Keys left out do not touch lower layers.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub owner: Option<String>,
    pub repos: Option<Vec<String>>,
    pub runner: RunnerFile,
    pub service: ServiceFile,
    pub github: GithubFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunnerFile {
    pub base_dir: Option<String>,
    pub version: Option<String>,
    /// Added to the labels of lower layers
    pub labels: Vec<String>,
    pub work_dir: Option<String>,
    pub download_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServiceFile {
    pub enabled: Option<bool>,
    pub sudo: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GithubFile {
    pub gh: Option<String>,
    pub hostname: Option<String>,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

impl Config {
    /// Load configuration with precedence:
    /// 1. CLI flags (applied later via with_*_overrides)
    /// 2. Environment variables
    /// 3. Explicit `--config` file, or `runner-fleet.toml` in `cwd`
    /// 4. Global config (~/.runner-fleet.toml)
    /// 5. Built-in defaults
    pub fn load(cwd: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = home_dir() {
            let global_config = home.join(GLOBAL_CONFIG_FILE);
            if global_config.exists() {
                config = config.merge(ConfigFile::load(&global_config)?);
            }
        }

        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(FleetError::Preflight(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                config = config.merge(ConfigFile::load(path)?);
            }
            None => {
                let project_config = cwd.join(PROJECT_CONFIG_FILE);
                if project_config.exists() {
                    config = config.merge(ConfigFile::load(&project_config)?);
                }
            }
        }

        Ok(config.merge_env())
    }

    /// Layer a config file over this config (keys set in the file win)
    pub fn merge(mut self, file: ConfigFile) -> Self {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        if file.owner.is_some() {
            self.owner = file.owner;
        }
        set(&mut self.repos, file.repos);

        set(&mut self.runner.base_dir, file.runner.base_dir);
        set(&mut self.runner.version, file.runner.version);
        set(&mut self.runner.work_dir, file.runner.work_dir);
        set(&mut self.runner.download_url, file.runner.download_url);
        // Labels accumulate
        extend_unique(&mut self.runner.labels, file.runner.labels);

        set(&mut self.service.enabled, file.service.enabled);
        set(&mut self.service.sudo, file.service.sudo);

        set(&mut self.github.gh, file.github.gh);
        if file.github.hostname.is_some() {
            self.github.hostname = file.github.hostname;
        }

        self
    }

    /// Apply environment variable overrides
    fn merge_env(mut self) -> Self {
        if let Ok(base_dir) = std::env::var("RUNNER_FLEET_BASE_DIR") {
            if !base_dir.is_empty() {
                self.runner.base_dir = base_dir;
            }
        }
        if let Ok(version) = std::env::var("RUNNER_FLEET_RUNNER_VERSION") {
            if !version.is_empty() {
                self.runner.version = version;
            }
        }
        if let Ok(owner) = std::env::var("RUNNER_FLEET_OWNER") {
            if !owner.is_empty() {
                self.owner = Some(owner);
            }
        }
        self
    }

    /// Apply target selection flags shared by every command
    pub fn with_target_overrides(mut self, args: &TargetArgs) -> Self {
        if let Some(owner) = &args.owner {
            self.owner = Some(owner.clone());
        }
        if !args.repos.is_empty() {
            self.repos = args.repos.clone();
        }
        if let Some(base_dir) = &args.base_dir {
            self.runner.base_dir = base_dir.to_string_lossy().to_string();
        }
        self
    }

    /// Apply `up` flags (highest precedence)
    pub fn with_up_overrides(self, cmd: &UpCmd) -> Self {
        let mut config = self.with_target_overrides(&cmd.targets);
        extend_unique(&mut config.runner.labels, cmd.labels.iter().cloned());
        if let Some(version) = &cmd.runner_version {
            config.runner.version = version.clone();
        }
        if let Some(work_dir) = &cmd.work_dir {
            config.runner.work_dir = work_dir.clone();
        }
        if cmd.no_service {
            config.service.enabled = false;
        }
        config.force = cmd.force;
        config
    }

    /// Base directory with `~` expanded
    pub fn base_dir(&self) -> Result<PathBuf> {
        crate::utils::path::expand_tilde(&self.runner.base_dir).ok_or_else(|| {
            FleetError::Preflight(format!(
                "cannot resolve base directory '{}'",
                self.runner.base_dir
            ))
        })
    }

    /// Control-plane server URL derived from the configured host
    pub fn server_url(&self) -> String {
        match &self.github.hostname {
            Some(host) => format!("https://{}", host),
            None => "https://github.com".to_string(),
        }
    }

    /// Settings shared by every target of the batch
    pub fn target_defaults(&self) -> Result<TargetDefaults> {
        let owner = self
            .owner
            .clone()
            .filter(|o| !o.trim().is_empty())
            .ok_or_else(|| {
                FleetError::Preflight(
                    "no owner given: pass --owner or set `owner` in runner-fleet.toml".to_string(),
                )
            })?;

        if self.runner.work_dir.trim().is_empty() {
            return Err(FleetError::Preflight(
                "work directory name must not be empty".to_string(),
            ));
        }

        Ok(TargetDefaults {
            owner,
            base_dir: self.base_dir()?,
            labels: self.runner.labels.iter().collect::<LabelSet>(),
            work_dir: self.runner.work_dir.clone(),
            server_url: self.server_url(),
        })
    }
}

fn extend_unique(labels: &mut Vec<String>, more: impl IntoIterator<Item = String>) {
    for label in more {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
}

/// Get the home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
