#![allow(dead_code)]

use runner_fleet::agent::{AgentController, ConfigureRequest};
use runner_fleet::cache::{ArtifactCache, ArtifactSource};
use runner_fleet::credentials::{
    CredentialBroker, IssuedToken, RegistrationToken, RemovalToken,
};
use runner_fleet::error::{FleetError, Result};
use runner_fleet::orchestrator::{BatchSummary, Mode, Orchestrator};
use runner_fleet::reconcile::{ReconcileOptions, Reconciler};
use runner_fleet::target::{build_targets, cache_root, LabelSet, Target, TargetDefaults};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HOST: &str = "testhost";
pub const VERSION: &str = "2.321.0";

/// Serves an in-memory runner package and counts downloads
pub struct FakeSource {
    pub fetches: Cell<usize>,
    pub fail: bool,
    package: Vec<u8>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            fetches: Cell::new(0),
            fail: false,
            package: runner_package(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl ArtifactSource for FakeSource {
    fn file_name(&self, version: &str) -> String {
        format!("actions-runner-test-{}.tar.gz", version)
    }

    fn fetch(&self, version: &str, dest: &mut dyn Write) -> Result<u64> {
        self.fetches.set(self.fetches.get() + 1);
        if self.fail {
            return Err(FleetError::Download {
                version: version.to_string(),
                reason: "HTTP 503".to_string(),
            });
        }
        dest.write_all(&self.package)?;
        Ok(self.package.len() as u64)
    }
}

/// gzip'd tarball holding the runner entry points
pub fn runner_package() -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    for (name, body) in [
        ("config.sh", "#!/bin/sh\n"),
        ("svc.sh", "#!/bin/sh\n"),
        ("run.sh", "#!/bin/sh\n"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, body.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Registration,
    Removal,
}

#[derive(Debug, Clone)]
pub struct Issued {
    pub kind: TokenKind,
    pub target: String,
    pub value: String,
}

/// Control plane issuing numbered tokens
#[derive(Default)]
pub struct FakeControlPlane {
    pub counter: Cell<u32>,
    pub issued: RefCell<Vec<Issued>>,
    pub attempts: RefCell<Vec<(TokenKind, String)>>,
    pub deny_registration_for: HashSet<String>,
    pub fail_removal: bool,
}

impl FakeControlPlane {
    fn next(&self, kind: TokenKind, target: &Target) -> IssuedToken {
        self.counter.set(self.counter.get() + 1);
        let prefix = match kind {
            TokenKind::Registration => "reg",
            TokenKind::Removal => "rm",
        };
        let value = format!("{}-{}", prefix, self.counter.get());
        self.issued.borrow_mut().push(Issued {
            kind,
            target: target.name.clone(),
            value: value.clone(),
        });
        IssuedToken::new(value, chrono::Utc::now(), chrono::Duration::hours(1))
    }

    pub fn attempts_of(&self, kind: TokenKind) -> usize {
        self.attempts.borrow().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn issued_of(&self, kind: TokenKind) -> Vec<String> {
        self.issued
            .borrow()
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.value.clone())
            .collect()
    }
}

impl CredentialBroker for FakeControlPlane {
    fn issue_registration_token(&self, target: &Target) -> Result<RegistrationToken> {
        self.attempts
            .borrow_mut()
            .push((TokenKind::Registration, target.name.clone()));
        if self.deny_registration_for.contains(&target.name) {
            return Err(FleetError::Authorization {
                target: target.slug(),
                reason: "Must have admin rights to Repository. (HTTP 403)".to_string(),
            });
        }
        Ok(RegistrationToken(self.next(TokenKind::Registration, target)))
    }

    fn issue_removal_token(&self, target: &Target) -> Result<RemovalToken> {
        self.attempts
            .borrow_mut()
            .push((TokenKind::Removal, target.name.clone()));
        if self.fail_removal {
            return Err(FleetError::Transport {
                target: target.slug(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(RemovalToken(self.next(TokenKind::Removal, target)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Configure {
        dir: PathBuf,
        url: String,
        name: String,
        token: String,
        labels: String,
        work_dir: String,
        replace: bool,
    },
    Remove {
        dir: PathBuf,
        token: String,
    },
    InstallService(PathBuf),
    StartService(PathBuf),
    StopService(PathBuf),
    UninstallService(PathBuf),
}

/// Agent controller that writes the same marker files the real scripts do
#[derive(Default)]
pub struct FakeAgent {
    pub calls: RefCell<Vec<Call>>,
    /// Directory names whose configure call fails
    pub fail_configure_for: HashSet<String>,
    pub fail_remove: bool,
    pub deny_service: bool,
}

impl FakeAgent {
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn configures(&self) -> usize {
        self.count(|c| matches!(c, Call::Configure { .. }))
    }

    pub fn installs(&self) -> usize {
        self.count(|c| matches!(c, Call::InstallService(_)))
    }

    pub fn calls_for(&self, dir: &Path) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| match c {
                Call::Configure { dir: d, .. } | Call::Remove { dir: d, .. } => d == dir,
                Call::InstallService(d)
                | Call::StartService(d)
                | Call::StopService(d)
                | Call::UninstallService(d) => d == dir,
            })
            .cloned()
            .collect()
    }

    fn dir_name(dir: &Path) -> String {
        dir.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl AgentController for FakeAgent {
    fn configure(&self, dir: &Path, request: ConfigureRequest) -> Result<()> {
        self.calls.borrow_mut().push(Call::Configure {
            dir: dir.to_path_buf(),
            url: request.url.clone(),
            name: request.name.clone(),
            token: request.token.token().secret().to_string(),
            labels: request.labels.to_arg(),
            work_dir: request.work_dir.clone(),
            replace: request.replace,
        });

        if self.fail_configure_for.contains(&Self::dir_name(dir)) {
            return Err(FleetError::Configure(
                "config.sh exited with status 1".to_string(),
            ));
        }
        if dir.join(".runner").exists() && !request.replace {
            return Err(FleetError::Configure("already configured".to_string()));
        }

        fs::write(
            dir.join(".runner"),
            format!("{{\"agentName\":\"{}\"}}", request.name),
        )?;
        fs::write(dir.join(".credentials"), "{}")?;
        Ok(())
    }

    fn remove(&self, dir: &Path, token: RemovalToken) -> Result<()> {
        self.calls.borrow_mut().push(Call::Remove {
            dir: dir.to_path_buf(),
            token: token.token().secret().to_string(),
        });
        if self.fail_remove {
            return Err(FleetError::Removal("runner not found".to_string()));
        }
        let _ = fs::remove_file(dir.join(".runner"));
        let _ = fs::remove_file(dir.join(".credentials"));
        Ok(())
    }

    fn install_service(&self, dir: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::InstallService(dir.to_path_buf()));
        if self.deny_service {
            return Err(FleetError::ServiceInstall(
                "insufficient privileges (Must be run as root)".to_string(),
            ));
        }
        fs::write(dir.join(".service"), "actions.runner.service")?;
        Ok(())
    }

    fn start_service(&self, dir: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::StartService(dir.to_path_buf()));
        Ok(())
    }

    fn stop_service(&self, dir: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::StopService(dir.to_path_buf()));
        Ok(())
    }

    fn uninstall_service(&self, dir: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::UninstallService(dir.to_path_buf()));
        let _ = fs::remove_file(dir.join(".service"));
        Ok(())
    }
}

pub fn targets(base: &Path, names: &[&str]) -> Vec<Target> {
    let defaults = TargetDefaults {
        owner: "acme".to_string(),
        base_dir: base.to_path_buf(),
        labels: ["self-hosted", "linux"].into_iter().collect::<LabelSet>(),
        work_dir: "_work".to_string(),
        server_url: "https://github.com".to_string(),
    };
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    build_targets(&defaults, &names).unwrap()
}

pub fn options(force: bool, manage_service: bool) -> ReconcileOptions {
    ReconcileOptions {
        version: VERSION.to_string(),
        force,
        manage_service,
        host: HOST.to_string(),
    }
}

/// Make a target look like a previous run registered it
pub fn mark_configured(target: &Target, runner_name: &str, with_service: bool) {
    fs::create_dir_all(&target.dir).unwrap();
    fs::write(target.dir.join("config.sh"), "#!/bin/sh\n").unwrap();
    fs::write(
        target.dir.join(".runner"),
        format!("{{\"agentName\":\"{}\"}}", runner_name),
    )
    .unwrap();
    fs::write(target.dir.join(".credentials"), "{}").unwrap();
    if with_service {
        fs::write(target.dir.join(".service"), "actions.runner.service").unwrap();
    }
}

pub fn run_batch(
    base: &Path,
    source: &FakeSource,
    plane: &FakeControlPlane,
    agent: &FakeAgent,
    targets: &[Target],
    options: ReconcileOptions,
    mode: Mode,
) -> BatchSummary {
    let cache = ArtifactCache::new(cache_root(base), source);
    let reconciler = Reconciler::new(&cache, plane, agent, options);
    Orchestrator::new(&reconciler).run(targets, mode)
}
