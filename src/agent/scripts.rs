use crate::agent::{AgentController, ConfigureRequest};
use crate::credentials::RemovalToken;
use crate::error::{FleetError, Result};
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

const CONFIG_SCRIPT: &str = "config.sh";
const SERVICE_SCRIPT: &str = "svc.sh";

/// Drives the `config.sh` / `svc.sh` scripts shipped in the runner package
pub struct ScriptController {
    sudo: bool,
}

impl ScriptController {
    /// `sudo` wraps service operations in `sudo -n`
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    /// Run a script from `dir` with `dir` as its working directory.
    /// `shown` is what gets logged in place of `args`.
    fn run(
        &self,
        dir: &Path,
        script: &str,
        args: &[&str],
        shown: &[&str],
        privileged: bool,
    ) -> std::result::Result<Output, String> {
        let script_path = dir.join(script);

        let mut cmd = if privileged && self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg(&script_path);
            cmd
        } else {
            Command::new(&script_path)
        };
        cmd.args(args).current_dir(dir);

        debug!(dir = %dir.display(), script, args = ?shown, "running runner script");
        let output = cmd
            .output()
            .map_err(|e| format!("failed to run {}: {}", script_path.display(), e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(script, "{}", stdout.trim_end());
        }

        if output.status.success() {
            Ok(output)
        } else {
            Err(failure_message(script, &output))
        }
    }

    fn service(&self, dir: &Path, action: &str) -> Result<()> {
        self.run(dir, SERVICE_SCRIPT, &[action], &[action], true)
            .map(|_| ())
            .map_err(|msg| FleetError::Service(format!("svc.sh {}: {}", action, msg)))
    }
}

impl AgentController for ScriptController {
    fn configure(&self, dir: &Path, request: ConfigureRequest) -> Result<()> {
        if request.token.token().is_expired() {
            return Err(FleetError::Configure(
                "registration token expired before use".to_string(),
            ));
        }

        let labels = request.labels.to_arg();
        let mut args = vec![
            "--unattended",
            "--url",
            request.url.as_str(),
            "--token",
            request.token.token().secret(),
            "--name",
            request.name.as_str(),
            "--work",
            request.work_dir.as_str(),
        ];
        if !labels.is_empty() {
            args.extend(["--labels", labels.as_str()]);
        }
        if request.replace {
            args.push("--replace");
        }

        let shown: Vec<&str> = args
            .iter()
            .enumerate()
            .map(|(i, a)| if i == 4 { "<redacted>" } else { *a })
            .collect();

        self.run(dir, CONFIG_SCRIPT, &args, &shown, false)
            .map(|_| ())
            .map_err(FleetError::Configure)
    }

    fn remove(&self, dir: &Path, token: RemovalToken) -> Result<()> {
        if token.token().is_expired() {
            return Err(FleetError::Removal(
                "removal token expired before use".to_string(),
            ));
        }

        let args = ["remove", "--token", token.token().secret()];
        self.run(
            dir,
            CONFIG_SCRIPT,
            &args,
            &["remove", "--token", "<redacted>"],
            false,
        )
        .map(|_| ())
        .map_err(FleetError::Removal)
    }

    fn install_service(&self, dir: &Path) -> Result<()> {
        self.run(dir, SERVICE_SCRIPT, &["install"], &["install"], true)
            .map(|_| ())
            .map_err(|msg| {
                if is_privilege_denial(&msg) {
                    FleetError::ServiceInstall(format!(
                        "insufficient privileges ({}). Re-run as root or pass --no-service",
                        msg
                    ))
                } else {
                    FleetError::ServiceInstall(msg)
                }
            })
    }

    fn start_service(&self, dir: &Path) -> Result<()> {
        self.service(dir, "start")
    }

    fn stop_service(&self, dir: &Path) -> Result<()> {
        self.service(dir, "stop")
    }

    fn uninstall_service(&self, dir: &Path) -> Result<()> {
        self.service(dir, "uninstall")
    }
}

fn failure_message(script: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    // config.sh reports most errors on stdout
    let detail = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .and_then(|s| s.lines().last())
        .unwrap_or("no output");

    match output.status.code() {
        Some(code) => format!("{} exited with status {}: {}", script, code, detail),
        None => format!("{} terminated by signal: {}", script, detail),
    }
}

fn is_privilege_denial(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "must be run as root",
        "needs to run as root",
        "permission denied",
        "a password is required",
        "operation not permitted",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}
