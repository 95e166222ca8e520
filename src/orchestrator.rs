use crate::reconcile::{Outcome, Reconciler, Warnings};
use crate::target::Target;
use tracing::{error, info};

/// What a batch does to each target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Provision,
    Deprovision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: String,
    pub outcome: Outcome,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub reports: Vec<TargetReport>,
    /// Set when a batch-fatal error stopped processing
    pub aborted: Option<String>,
    /// Targets never reached because the batch was aborted
    pub not_attempted: Vec<String>,
}

impl BatchSummary {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn configured(&self) -> usize {
        self.count(|o| *o == Outcome::Configured)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == Outcome::Skipped)
    }

    pub fn removed(&self) -> usize {
        self.count(|o| *o == Outcome::Removed)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    pub fn warnings(&self) -> usize {
        self.reports.iter().map(|r| r.warnings.len()).sum()
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed() == 0
    }

    pub fn outcome_of(&self, target: &str) -> Option<&Outcome> {
        self.reports
            .iter()
            .find(|r| r.target == target)
            .map(|r| &r.outcome)
    }
}

/// Runs the reconciler over a target list, one target at a time
pub struct Orchestrator<'r> {
    reconciler: &'r Reconciler<'r>,
}

impl<'r> Orchestrator<'r> {
    pub fn new(reconciler: &'r Reconciler<'r>) -> Self {
        Self { reconciler }
    }

    /// Process targets in order. Target-scoped errors are recorded and the
    /// batch continues; a batch-fatal error stops it.
    pub fn run(&self, targets: &[Target], mode: Mode) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for (index, target) in targets.iter().enumerate() {
            let slug = target.slug();
            info!(repo = %slug, position = index + 1, total = targets.len(), ?mode, "processing target");

            let mut warnings = Warnings::new();
            let result = match mode {
                Mode::Provision => self.reconciler.reconcile(target, &mut warnings),
                Mode::Deprovision => self.reconciler.deprovision(target, &mut warnings),
            };

            let (outcome, fatal) = match result {
                Ok(outcome) => (outcome, None),
                Err(e) => {
                    error!(repo = %slug, error = %e, "target failed");
                    let fatal = e.is_batch_fatal().then(|| e.to_string());
                    (Outcome::Failed(e.to_string()), fatal)
                }
            };

            summary.reports.push(TargetReport {
                target: slug,
                outcome,
                warnings: warnings.into_vec(),
            });

            if let Some(reason) = fatal {
                error!(%reason, "aborting batch");
                summary.aborted = Some(reason);
                summary.not_attempted = targets[index + 1..].iter().map(Target::slug).collect();
                break;
            }
        }

        summary
    }
}
