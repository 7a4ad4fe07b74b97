//! Run configuration.
//!
//! Everything the run needs is resolved into this one struct at startup and
//! validated eagerly; components never read ambient process state themselves.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::export::ExportParameters;

/// Per-action pause applied by default when the browser window is visible.
pub const DEFAULT_SLOW_MO: Duration = Duration::from_millis(200);

/// Resolved configuration for a single export run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Portal entry URL.
    pub url: String,

    /// Optional proxy server for the browser session.
    pub proxy: Option<String>,

    /// Run the browser without a visible window.
    pub headless: bool,

    /// Per-action pause for watching a headful run.
    pub slow_mo: Option<Duration>,

    /// Directory that receives the exported artifact.
    pub download_dir: PathBuf,

    /// Provider manifest override. `None` uses the well-known per-user path.
    pub provider_location: Option<String>,

    /// Serialized challenge answer map. Presence selects static-map challenge
    /// resolution; absence delegates challenge answers to the provider.
    pub challenge_answers: Option<String>,

    /// Static login name. When absent, credentials come from the provider.
    pub username: Option<String>,

    /// Static password. When absent, credentials come from the provider.
    pub password: Option<String>,

    /// Export form parameters.
    pub export: ExportParameters,
}

impl Config {
    /// Reject option combinations that no component could satisfy later.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::configuration("portal URL must not be empty"));
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(Error::configuration(
                "username and password must be supplied together",
            ));
        }

        // Static credentials carry no challenge answers, so delegating
        // challenge resolution has nowhere to go.
        if self.username.is_some() && self.challenge_answers.is_none() {
            return Err(Error::configuration(
                "static credentials require a challenge answer map; \
                 supply one or switch to a secret provider",
            ));
        }

        Ok(())
    }

    /// The user's standard downloads location.
    pub fn default_download_dir() -> Result<PathBuf> {
        if let Some(dir) = dirs::download_dir() {
            return Ok(dir);
        }
        dirs::home_dir()
            .map(|home| home.join("Downloads"))
            .ok_or_else(|| {
                Error::configuration("could not determine a downloads directory; set one explicitly")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            url: "https://portal.example.test".to_string(),
            proxy: None,
            headless: true,
            slow_mo: None,
            download_dir: PathBuf::from("/tmp/exports"),
            provider_location: None,
            challenge_answers: None,
            username: None,
            password: None,
            export: ExportParameters {
                account: "C001".to_string(),
                format: "Excel".to_string(),
            },
        }
    }

    #[test]
    fn provider_only_config_is_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_url_is_rejected() {
        let config = Config {
            url: "  ".to_string(),
            ..base_config()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn username_without_password_is_rejected() {
        let config = Config {
            username: Some("user".to_string()),
            challenge_answers: Some("{\"questions\":[]}".to_string()),
            ..base_config()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn static_credentials_without_answer_map_are_rejected() {
        let config = Config {
            username: Some("user".to_string()),
            password: Some("pw".to_string()),
            ..base_config()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn static_credentials_with_answer_map_are_valid() {
        let config = Config {
            username: Some("user".to_string()),
            password: Some("pw".to_string()),
            challenge_answers: Some("{\"questions\":[]}".to_string()),
            ..base_config()
        };
        assert!(config.validate().is_ok());
    }
}
