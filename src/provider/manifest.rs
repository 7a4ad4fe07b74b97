//! Provider manifest and the providers built from it.
//!
//! A manifest declares one external command per contract operation:
//!
//! ```toml
//! [username]
//! command = ["pass", "show", "finance/portal/username"]
//!
//! [password]
//! command = ["pass", "show", "finance/portal/password"]
//!
//! [challenge]
//! command = ["/usr/local/bin/portal-pvq-answer"]
//! ```
//!
//! The challenge command receives the displayed question text as one extra
//! trailing argument. Commands print the secret to stdout; a trailing newline
//! is stripped.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};

use super::SecretProvider;

/// Parsed provider manifest, before contract verification.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderManifest {
    #[serde(default)]
    username: Option<OperationSpec>,
    #[serde(default)]
    password: Option<OperationSpec>,
    #[serde(default)]
    challenge: Option<OperationSpec>,
}

/// One contract operation backed by an external command.
#[derive(Debug, Clone, Deserialize)]
struct OperationSpec {
    command: Vec<String>,
}

impl ProviderManifest {
    /// Parse manifest text, attributing failures to `path`.
    pub fn parse(path: &Path, raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| Error::ProviderLoad {
            path: path.to_path_buf(),
            source: err.into(),
        })
    }

    /// Verify all three operations are declared and callable, then build the
    /// provider. The first missing operation is named in declaration order.
    pub fn into_provider(self, path: &Path) -> Result<ExecSecretProvider> {
        let username = require(path, "username", self.username)?;
        let password = require(path, "password", self.password)?;
        let challenge = require(path, "challenge", self.challenge)?;
        Ok(ExecSecretProvider {
            username,
            password,
            challenge,
        })
    }
}

fn require(path: &Path, operation: &'static str, spec: Option<OperationSpec>) -> Result<OperationSpec> {
    match spec {
        Some(spec) if !spec.command.is_empty() => Ok(spec),
        _ => Err(Error::ProviderContract {
            path: path.to_path_buf(),
            operation,
        }),
    }
}

/// Provider that obtains each secret by running the manifest's commands.
pub struct ExecSecretProvider {
    username: OperationSpec,
    password: OperationSpec,
    challenge: OperationSpec,
}

impl ExecSecretProvider {
    async fn run(
        &self,
        operation: &'static str,
        spec: &OperationSpec,
        extra_arg: Option<&str>,
    ) -> Result<SecretString> {
        let provider_error = |message: String| Error::Provider { operation, message };

        let (program, args) = spec
            .command
            .split_first()
            .ok_or_else(|| provider_error("empty command".to_string()))?;

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        if let Some(extra) = extra_arg {
            command.arg(extra);
        }

        let output = command
            .output()
            .await
            .map_err(|err| provider_error(format!("failed to run {program}: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(provider_error(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let value = String::from_utf8(output.stdout)
            .map_err(|_| provider_error("command output was not valid UTF-8".to_string()))?;
        let value = value.trim_end_matches(['\r', '\n']).to_string();
        Ok(SecretString::from(value))
    }
}

#[async_trait]
impl SecretProvider for ExecSecretProvider {
    async fn get_username(&self) -> Result<SecretString> {
        self.run("username", &self.username, None).await
    }

    async fn get_password(&self) -> Result<SecretString> {
        self.run("password", &self.password, None).await
    }

    async fn get_2fa_answer(&self, question: &str) -> Result<SecretString> {
        self.run("challenge", &self.challenge, Some(question)).await
    }
}

/// Provider backed by values supplied directly through configuration.
///
/// Used when the operator passes credentials at the process boundary instead
/// of installing a manifest. It carries no challenge answers; challenge
/// resolution must use the static answer map in that setup.
pub struct StaticSecretProvider {
    username: SecretString,
    password: SecretString,
}

impl StaticSecretProvider {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: SecretString::from(username.into()),
            password: SecretString::from(password.into()),
        }
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_username(&self) -> Result<SecretString> {
        Ok(SecretString::from(self.username.expose_secret().to_string()))
    }

    async fn get_password(&self) -> Result<SecretString> {
        Ok(SecretString::from(self.password.expose_secret().to_string()))
    }

    async fn get_2fa_answer(&self, _question: &str) -> Result<SecretString> {
        Err(Error::Provider {
            operation: "challenge",
            message: "static credentials carry no challenge answers".to_string(),
        })
    }
}
