use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Pre-flight check failed: {0}")]
    Preflight(String),

    #[error("Failed to download runner {version}: {reason}")]
    Download { version: String, reason: String },

    #[error("Not authorized to manage runners for {target}: {reason}")]
    Authorization { target: String, reason: String },

    #[error("Control plane request failed for {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("Runner removal failed: {0}")]
    Removal(String),

    #[error("Runner configuration failed: {0}")]
    Configure(String),

    #[error("Service installation failed: {0}")]
    ServiceInstall(String),

    #[error("Service operation failed: {0}")]
    Service(String),

    #[error("Failed to extract {} into {}: {reason}", archive.display(), dest.display())]
    Extract {
        archive: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FleetError {
    /// Errors that invalidate every remaining target, not just the current one.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, FleetError::Download { .. })
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
