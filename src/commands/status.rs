use crate::config::Config;
use crate::error::Result;
use crate::reconcile::TargetState;
use crate::target::{build_targets, Target};
use std::fmt::Write;

/// Print the local state of every target. Never contacts GitHub.
pub fn execute(config: &Config) -> Result<()> {
    let defaults = config.target_defaults()?;
    let targets = build_targets(&defaults, &config.repos)?;

    println!("Base directory: {}", defaults.base_dir.display());
    print!("{}", render_status(&targets));
    Ok(())
}

pub fn render_status(targets: &[Target]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<30} {:<14} {:<30} {:<8}",
        "REPOSITORY", "STATE", "RUNNER", "SERVICE"
    );
    let _ = writeln!(out, "{}", "-".repeat(85));

    for target in targets {
        let state = TargetState::observe(target);
        let runner = match state {
            TargetState::Configured => target
                .registered_name()
                .unwrap_or_else(|| "(unknown)".to_string()),
            _ if target.has_entry_point() => "(installed)".to_string(),
            _ => "-".to_string(),
        };
        let service = if target.has_service() { "yes" } else { "no" };

        let _ = writeln!(
            out,
            "{:<30} {:<14} {:<30} {:<8}",
            target.slug(),
            state.to_string(),
            runner,
            service
        );
    }

    out
}
