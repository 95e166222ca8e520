use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "runner-fleet")]
#[command(
    about = "Provision one self-hosted GitHub Actions runner per repository",
    long_about = None
)]
#[command(version = crate::version::VERSION)]
#[command(after_help = "\
LAYOUT:
  <base-dir>/<repo>/             Runner install and registration for one repository
  <base-dir>/_cache/<version>/   Runner package shared by every repository

EXAMPLES:
  runner-fleet up --owner acme --repos api,web
  runner-fleet up --owner acme --repos api --labels gpu --force
  runner-fleet status --owner acme --repos api,web
  runner-fleet down --owner acme --repos web")]
pub struct Cli {
    /// Show debug logs
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of ./runner-fleet.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a runner for every repository that does not have one
    Up(UpCmd),

    /// Unregister runners and remove their services
    Down(DownCmd),

    /// Show local registration state without contacting GitHub
    Status(StatusCmd),
}

/// Which repositories to act on and where their runners live
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Account or organization owning the repositories
    #[arg(short = 'o', long)]
    pub owner: Option<String>,

    /// Repositories to manage (comma-separated or repeated)
    #[arg(short = 'r', long = "repos", value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Directory holding one runner directory per repository
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UpCmd {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Extra runner labels (comma-separated or repeated)
    #[arg(short = 'l', long = "labels", value_delimiter = ',')]
    pub labels: Vec<String>,

    /// actions/runner release to install
    #[arg(long = "runner-version")]
    pub runner_version: Option<String>,

    /// Work directory name inside each runner directory
    #[arg(long)]
    pub work_dir: Option<String>,

    /// Do not install or start the runner service
    #[arg(long)]
    pub no_service: bool,

    /// Remove and re-register runners that are already configured
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DownCmd {
    #[command(flatten)]
    pub targets: TargetArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatusCmd {
    #[command(flatten)]
    pub targets: TargetArgs,
}
