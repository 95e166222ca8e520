//! Boundary to the runner software installed in a target directory.
//!
//! Every operation names the directory it acts on; nothing here depends on
//! the process working directory.

pub mod scripts;

use crate::credentials::{RegistrationToken, RemovalToken};
use crate::error::Result;
use crate::target::LabelSet;
use std::path::Path;

pub use scripts::ScriptController;

/// Arguments for registering a runner
#[derive(Debug)]
pub struct ConfigureRequest {
    /// Repository URL the runner registers against
    pub url: String,
    pub token: RegistrationToken,
    pub name: String,
    pub labels: LabelSet,
    pub work_dir: String,
    /// Supersede an existing registration with the same name instead of failing
    pub replace: bool,
}

/// Runner lifecycle operations.
///
/// - `configure` with `replace` is idempotent per runner name.
/// - `remove` consumes a single-use removal token.
/// - Service operations may require elevated privileges; a privilege failure
///   on `install_service` is reported as `FleetError::ServiceInstall`.
pub trait AgentController {
    fn configure(&self, dir: &Path, request: ConfigureRequest) -> Result<()>;
    fn remove(&self, dir: &Path, token: RemovalToken) -> Result<()>;
    fn install_service(&self, dir: &Path) -> Result<()>;
    fn start_service(&self, dir: &Path) -> Result<()>;
    fn stop_service(&self, dir: &Path) -> Result<()>;
    fn uninstall_service(&self, dir: &Path) -> Result<()>;
}
