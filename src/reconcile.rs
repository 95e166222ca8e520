//! Per-target reconciliation.
//!
//! ```text
//!              marker, no force
//!   Configured ───────────────▶ (skip)
//!       │ marker + force
//!       ▼
//!  ForceRemoving ──▶ Unconfigured ──▶ Configuring ──▶ Configured ──▶ service
//! ```
//!
//! Failures of required steps are returned as errors. Failures of cleanup
//! steps are collected in [`Warnings`] and never stop the target.

use crate::agent::{AgentController, ConfigureRequest};
use crate::cache::{self, ArtifactCache};
use crate::credentials::CredentialBroker;
use crate::error::{FleetError, Result};
use crate::target::{runner_name, Target};
use std::fmt;
use std::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Unconfigured,
    Configuring,
    Configured,
    ForceRemoving,
}

impl TargetState {
    /// Current state as evidenced by the target directory
    pub fn observe(target: &Target) -> Self {
        if target.is_configured() {
            TargetState::Configured
        } else {
            TargetState::Unconfigured
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetState::Unconfigured => "unconfigured",
            TargetState::Configuring => "configuring",
            TargetState::Configured => "configured",
            TargetState::ForceRemoving => "force-removing",
        };
        f.write_str(s)
    }
}

/// Result of one target in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Configured,
    Removed,
    Failed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped => f.write_str("skipped"),
            Outcome::Configured => f.write_str("configured"),
            Outcome::Removed => f.write_str("removed"),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Best-effort failures collected for one target
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Warnings(Vec<String>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the value on success; record the failure as a warning otherwise
    pub fn best_effort<T>(&mut self, target: &Target, step: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(repo = %target.slug(), step, error = %e, "best-effort step failed");
                self.0.push(format!("{}: {}", step, e));
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Tracks and logs state transitions of one target
struct Transitions<'t> {
    target: &'t Target,
    state: TargetState,
}

impl<'t> Transitions<'t> {
    fn observe(target: &'t Target) -> Self {
        let state = TargetState::observe(target);
        debug!(repo = %target.slug(), %state, "observed state");
        Self { target, state }
    }

    fn advance(&mut self, next: TargetState) {
        debug!(repo = %self.target.slug(), from = %self.state, to = %next, "transition");
        self.state = next;
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Runner package version to install into fresh directories
    pub version: String,
    /// Remove and re-register targets that are already configured
    pub force: bool,
    /// Install and start the local service after registration
    pub manage_service: bool,
    /// Host identifier used to build runner names
    pub host: String,
}

pub struct Reconciler<'a> {
    cache: &'a ArtifactCache<'a>,
    broker: &'a dyn CredentialBroker,
    controller: &'a dyn AgentController,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        cache: &'a ArtifactCache<'a>,
        broker: &'a dyn CredentialBroker,
        controller: &'a dyn AgentController,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            cache,
            broker,
            controller,
            options,
        }
    }

    /// Bring one target to the configured state.
    ///
    /// Returns `Skipped` without any network access when the target is already
    /// registered and force was not requested.
    pub fn reconcile(&self, target: &Target, warnings: &mut Warnings) -> Result<Outcome> {
        let mut machine = Transitions::observe(target);

        if machine.state == TargetState::Configured {
            if !self.options.force {
                info!(repo = %target.slug(), "already configured");
                return Ok(Outcome::Skipped);
            }

            machine.advance(TargetState::ForceRemoving);
            self.force_remove(target, warnings);
            machine.advance(TargetState::Unconfigured);
        }

        machine.advance(TargetState::Configuring);
        self.configure(target)?;
        machine.advance(TargetState::Configured);
        info!(repo = %target.slug(), "runner registered");

        if self.options.manage_service {
            self.install_service(target)?;
        }

        Ok(Outcome::Configured)
    }

    /// Unregister a target and remove its service. Here removal is required.
    pub fn deprovision(&self, target: &Target, warnings: &mut Warnings) -> Result<Outcome> {
        if !target.is_configured() {
            info!(repo = %target.slug(), "not configured, nothing to remove");
            return Ok(Outcome::Skipped);
        }

        self.stop_existing_service(target, warnings);

        let token = self.broker.issue_removal_token(target)?;
        self.controller.remove(&target.dir, token)?;
        target.clear_markers()?;

        info!(repo = %target.slug(), "runner removed");
        Ok(Outcome::Removed)
    }

    fn force_remove(&self, target: &Target, warnings: &mut Warnings) {
        info!(repo = %target.slug(), "force requested, removing existing registration");

        self.stop_existing_service(target, warnings);

        let token = warnings.best_effort(
            target,
            "issue removal token",
            self.broker.issue_removal_token(target),
        );
        if let Some(token) = token {
            warnings.best_effort(
                target,
                "remove runner",
                self.controller.remove(&target.dir, token),
            );
        }

        warnings.best_effort(
            target,
            "delete registration marker",
            target.clear_markers().map_err(FleetError::from),
        );
    }

    fn stop_existing_service(&self, target: &Target, warnings: &mut Warnings) {
        if !target.has_service() {
            return;
        }
        warnings.best_effort(
            target,
            "stop service",
            self.controller.stop_service(&target.dir),
        );
        warnings.best_effort(
            target,
            "uninstall service",
            self.controller.uninstall_service(&target.dir),
        );
    }

    fn configure(&self, target: &Target) -> Result<()> {
        fs::create_dir_all(&target.dir)?;

        if target.has_entry_point() {
            debug!(repo = %target.slug(), "runner already installed, keeping existing files");
        } else {
            let artifact = self.cache.ensure_artifact(&self.options.version)?;
            info!(repo = %target.slug(), version = %self.options.version, "installing runner");
            cache::extract(&artifact, &target.dir)?;
        }

        let token = self.broker.issue_registration_token(target)?;
        let name = runner_name(&self.options.host, &target.name);
        info!(repo = %target.slug(), runner = %name, "registering runner");

        self.controller.configure(
            &target.dir,
            ConfigureRequest {
                url: target.url(),
                token,
                name,
                labels: target.labels.clone(),
                work_dir: target.work_dir.clone(),
                replace: true,
            },
        )
    }

    fn install_service(&self, target: &Target) -> Result<()> {
        if target.has_service() {
            debug!(repo = %target.slug(), "service already installed");
        } else {
            self.controller
                .install_service(&target.dir)
                .map_err(|e| match e {
                    FleetError::ServiceInstall(_) => e,
                    other => FleetError::ServiceInstall(other.to_string()),
                })?;
        }

        self.controller.start_service(&target.dir)?;
        info!(repo = %target.slug(), "service started");
        Ok(())
    }
}
