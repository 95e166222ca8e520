use crate::commands::{report, Fleet};
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{BatchSummary, Mode};
use tracing::info;

pub fn execute(config: &Config) -> Result<BatchSummary> {
    let (fleet, targets) = Fleet::prepare(config)?;

    info!(count = targets.len(), "removing runners");

    let summary = fleet.run(&targets, Mode::Deprovision);
    report::print_summary(&summary);
    Ok(summary)
}
