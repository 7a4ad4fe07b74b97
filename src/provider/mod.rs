//! External secret providers.
//!
//! Credentials and challenge answers come from an out-of-process provider so
//! that no plaintext secret ever lives in rbsee's own configuration. The
//! provider is described by a manifest file that is security-validated before
//! a single byte of it is read; see [`loader`] for the rules.

mod loader;
mod manifest;

pub use loader::{load_provider, ProviderLocation, SecurityPosture, MANIFEST_SUFFIX};
pub use manifest::{ExecSecretProvider, ProviderManifest, StaticSecretProvider};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Result;

/// Capability set a provider must satisfy.
///
/// Operations may suspend; a provider typically shells out to an external
/// secret store. A provider failure surfaces as [`crate::Error::Provider`];
/// callers treat empty values as their own typed failures, never as data.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Login name for the portal.
    async fn get_username(&self) -> Result<SecretString>;

    /// Portal password.
    async fn get_password(&self) -> Result<SecretString>;

    /// Answer for a challenge question, given the exact displayed text.
    async fn get_2fa_answer(&self, question: &str) -> Result<SecretString>;
}
