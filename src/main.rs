#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;

use runner_fleet::cli::{Cli, Commands};
use runner_fleet::config::Config;
use runner_fleet::{commands, logging};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cwd = std::env::current_dir()?;
    let base = Config::load(&cwd, cli.config.as_deref())?;

    let summary = match &cli.command {
        Commands::Up(cmd) => {
            let config = base.with_up_overrides(cmd);
            commands::up::execute(&config)?
        }
        Commands::Down(cmd) => {
            let config = base.with_target_overrides(&cmd.targets);
            commands::down::execute(&config)?
        }
        Commands::Status(cmd) => {
            let config = base.with_target_overrides(&cmd.targets);
            commands::status::execute(&config)?;
            return Ok(());
        }
    };

    if !summary.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
