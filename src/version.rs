use crate::error::{FleetError, Result};
use semver::Version;

// Set by build.rs
pub const VERSION: &str = env!("RUNNER_FLEET_VERSION");

/// actions/runner release used when nothing else is configured
pub const DEFAULT_RUNNER_VERSION: &str = "2.321.0";

/// Platform suffix used in actions/runner release asset names
pub fn current_platform() -> Result<String> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_for(os: &str, arch: &str) -> Result<String> {
    match (os, arch) {
        ("linux", "x86_64") => Ok("linux-x64".to_string()),
        ("linux", "aarch64") => Ok("linux-arm64".to_string()),
        ("linux", "arm") => Ok("linux-arm".to_string()),
        ("macos", "x86_64") => Ok("osx-x64".to_string()),
        ("macos", "aarch64") => Ok("osx-arm64".to_string()),
        (os, arch) => Err(FleetError::Preflight(format!(
            "Unsupported platform: {}-{}",
            os, arch
        ))),
    }
}

/// Normalize a runner version: strip a leading `v` and require valid semver
pub fn parse_runner_version(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_start_matches('v');
    Version::parse(trimmed)
        .map(|v| v.to_string())
        .map_err(|e| FleetError::Preflight(format!("Invalid runner version '{}': {}", raw, e)))
}
