//! Short-lived registration and removal tokens from the control plane.
//!
//! Every call performs a fresh request. Tokens are not `Clone`: the agent
//! operation that consumes one takes it by value, so a token cannot be used
//! twice or shared between targets.

use crate::error::{FleetError, Result};
use crate::target::Target;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Lifetime assumed when the control plane does not report one
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// A credential value with its issue time and lifetime
pub struct IssuedToken {
    value: String,
    issued_at: DateTime<Utc>,
    ttl: Duration,
}

impl IssuedToken {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            issued_at,
            ttl,
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + self.ttl
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn secret(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Authorizes one new runner registration
#[derive(Debug)]
pub struct RegistrationToken(pub IssuedToken);

/// Authorizes one runner deregistration
#[derive(Debug)]
pub struct RemovalToken(pub IssuedToken);

impl RegistrationToken {
    pub fn token(&self) -> &IssuedToken {
        &self.0
    }
}

impl RemovalToken {
    pub fn token(&self) -> &IssuedToken {
        &self.0
    }
}

/// Issues tokens scoped to one target
pub trait CredentialBroker {
    fn issue_registration_token(&self, target: &Target) -> Result<RegistrationToken>;
    fn issue_removal_token(&self, target: &Target) -> Result<RemovalToken>;
}

/// Talks to the GitHub REST API through an authenticated `gh` CLI
pub struct GhCliBroker {
    program: PathBuf,
    hostname: Option<String>,
}

impl GhCliBroker {
    pub fn new(program: impl Into<PathBuf>, hostname: Option<String>) -> Self {
        Self {
            program: program.into(),
            hostname,
        }
    }

    fn request(&self, target: &Target, kind: &str) -> Result<IssuedToken> {
        let endpoint = format!(
            "repos/{}/{}/actions/runners/{}-token",
            target.owner, target.name, kind
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(["api", "--method", "POST"]);
        if let Some(host) = &self.hostname {
            cmd.args(["--hostname", host]);
        }
        cmd.args(["-H", "Accept: application/vnd.github+json", &endpoint]);

        debug!(repo = %target.slug(), kind, "requesting token");
        let output = cmd.output().map_err(|e| FleetError::Transport {
            target: target.slug(),
            reason: format!("failed to run {}: {}", self.program.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(target, stderr.trim()));
        }

        parse_token_response(
            target,
            &String::from_utf8_lossy(&output.stdout),
            Utc::now(),
        )
    }
}

impl CredentialBroker for GhCliBroker {
    fn issue_registration_token(&self, target: &Target) -> Result<RegistrationToken> {
        self.request(target, "registration").map(RegistrationToken)
    }

    fn issue_removal_token(&self, target: &Target) -> Result<RemovalToken> {
        self.request(target, "remove").map(RemovalToken)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    expires_at: Option<String>,
}

fn parse_token_response(target: &Target, body: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
    let transport = |reason: String| FleetError::Transport {
        target: target.slug(),
        reason,
    };

    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| transport(format!("unexpected token response: {}", e)))?;

    if response.token.trim().is_empty() {
        return Err(transport("control plane returned an empty token".to_string()));
    }

    let ttl = response
        .expires_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|expires| expires.with_timezone(&Utc) - now)
        .filter(|ttl| *ttl > Duration::zero())
        .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_TTL_SECS));

    Ok(IssuedToken::new(response.token, now, ttl))
}

fn classify_failure(target: &Target, stderr: &str) -> FleetError {
    let lower = stderr.to_lowercase();
    let denied = ["http 401", "http 403", "http 404", "admin rights", "not accessible"]
        .iter()
        .any(|needle| lower.contains(needle));

    let reason = if stderr.is_empty() {
        "gh api exited with an error".to_string()
    } else {
        stderr.to_string()
    };

    if denied {
        FleetError::Authorization {
            target: target.slug(),
            reason,
        }
    } else {
        FleetError::Transport {
            target: target.slug(),
            reason,
        }
    }
}
