use crate::commands::{report, Fleet};
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{BatchSummary, Mode};
use tracing::info;

pub fn execute(config: &Config) -> Result<BatchSummary> {
    let (fleet, targets) = Fleet::prepare(config)?;

    info!(
        count = targets.len(),
        version = %fleet.options.version,
        force = fleet.options.force,
        service = fleet.options.manage_service,
        "provisioning runners"
    );

    let summary = fleet.run(&targets, Mode::Provision);
    report::print_summary(&summary);
    Ok(summary)
}
