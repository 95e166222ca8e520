pub mod down;
pub mod report;
pub mod status;
pub mod up;

use crate::agent::ScriptController;
use crate::cache::{ArtifactCache, HttpSource};
use crate::config::Config;
use crate::credentials::GhCliBroker;
use crate::error::Result;
use crate::orchestrator::{BatchSummary, Mode, Orchestrator};
use crate::reconcile::{ReconcileOptions, Reconciler};
use crate::target::{build_targets, cache_root, host_identifier, Target};
use crate::{preflight, version};
use std::path::PathBuf;

/// Production collaborators for one batch
struct Fleet {
    source: HttpSource,
    broker: GhCliBroker,
    controller: ScriptController,
    base_dir: PathBuf,
    options: ReconcileOptions,
}

impl Fleet {
    /// Run every pre-flight check and resolve the target list
    fn prepare(config: &Config) -> Result<(Self, Vec<Target>)> {
        let defaults = config.target_defaults()?;
        let targets = build_targets(&defaults, &config.repos)?;
        let runner_version = version::parse_runner_version(&config.runner.version)?;
        let platform = version::current_platform()?;
        let gh = preflight::control_plane(config)?;
        preflight::prepare_base_dir(&defaults.base_dir)?;

        let fleet = Self {
            source: HttpSource::new(config.runner.download_url.clone(), platform),
            broker: GhCliBroker::new(gh, config.github.hostname.clone()),
            controller: ScriptController::new(config.service.sudo),
            base_dir: defaults.base_dir,
            options: ReconcileOptions {
                version: runner_version,
                force: config.force,
                manage_service: config.service.enabled,
                host: host_identifier(),
            },
        };
        Ok((fleet, targets))
    }

    fn run(&self, targets: &[Target], mode: Mode) -> BatchSummary {
        let cache = ArtifactCache::new(cache_root(&self.base_dir), &self.source);
        let reconciler = Reconciler::new(
            &cache,
            &self.broker,
            &self.controller,
            self.options.clone(),
        );
        Orchestrator::new(&reconciler).run(targets, mode)
    }
}
