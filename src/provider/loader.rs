//! Provider location resolution, security validation, and loading.
//!
//! The manifest names commands that run with the invoking user's authority,
//! so an attacker-writable or wrongly-owned manifest is equivalent to
//! arbitrary code execution as that user. Validation therefore runs to
//! completion before the file is ever read, and there is no degraded
//! fallback: resolve → validate → load, always in that order.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result, SecurityViolation};

use super::manifest::ProviderManifest;
use super::SecretProvider;

/// Required suffix for provider manifest files.
pub const MANIFEST_SUFFIX: &str = ".toml";

/// Manifest filename under the per-user configuration directory.
const DEFAULT_MANIFEST: &str = "secret-provider.toml";

/// File mode a manifest must carry: owner read+write, nothing else.
const ALLOWED_MODE: u32 = 0o600;

/// Permission bits granting write access to group or other.
const GROUP_OTHER_WRITE: u32 = 0o022;

/// A resolved provider manifest location.
///
/// Only absolute paths and explicit `file://` URLs are accepted; a
/// home-directory shorthand is rejected outright rather than expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLocation {
    path: PathBuf,
}

/// Read-only filesystem facts about a validated provider location.
#[derive(Debug, Clone, Copy)]
pub struct SecurityPosture {
    /// Uid owning the manifest; equals the process's effective uid.
    pub owner_uid: u32,
    /// Permission bits of the manifest (always [`ALLOWED_MODE`]).
    pub mode: u32,
}

impl ProviderLocation {
    /// Resolve a raw location input, or the well-known per-user default.
    pub fn resolve(raw: Option<&str>) -> Result<Self> {
        let path = match raw {
            None => default_manifest_path()?,
            Some(input) if input.starts_with('~') => {
                return Err(Error::configuration(format!(
                    "provider location {input:?} uses a home-directory shorthand; \
                     pass an absolute path or a file:// URL"
                )));
            }
            Some(input) if input.starts_with("file://") => {
                let url = url::Url::parse(input).map_err(|err| {
                    Error::configuration(format!("invalid provider URL {input:?}: {err}"))
                })?;
                url.to_file_path().map_err(|()| {
                    Error::configuration(format!(
                        "provider URL {input:?} does not reference a local file"
                    ))
                })?
            }
            Some(input) => {
                let path = PathBuf::from(input);
                if !path.is_absolute() {
                    return Err(Error::configuration(format!(
                        "provider location {input:?} is not absolute"
                    )));
                }
                path
            }
        };

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !name.ends_with(MANIFEST_SUFFIX) {
            return Err(Error::configuration(format!(
                "provider manifest {} must end in {MANIFEST_SUFFIX}",
                path.display()
            )));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check ownership, type, and permission bits of the manifest.
    ///
    /// Runs before the file is read; any violation is terminal.
    #[cfg(unix)]
    pub fn validate(&self) -> Result<SecurityPosture> {
        use std::os::unix::fs::MetadataExt;

        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(self.violation(SecurityViolation::NotFound));
            }
            Err(err) => {
                return Err(Error::Filesystem {
                    path: self.path.clone(),
                    source: err,
                });
            }
        };

        if !metadata.is_file() {
            return Err(self.violation(SecurityViolation::NotRegularFile));
        }

        let owner_uid = metadata.uid();
        let process_uid = process_euid();
        if owner_uid != process_uid {
            return Err(self.violation(SecurityViolation::WrongOwner {
                expected: process_uid,
                actual: owner_uid,
            }));
        }

        let mode = metadata.mode() & 0o777;
        if mode & GROUP_OTHER_WRITE != 0 {
            return Err(self.violation(SecurityViolation::GroupOrWorldWritable { mode }));
        }
        if mode != ALLOWED_MODE {
            return Err(self.violation(SecurityViolation::WrongMode { mode }));
        }

        Ok(SecurityPosture { owner_uid, mode })
    }

    #[cfg(not(unix))]
    pub fn validate(&self) -> Result<SecurityPosture> {
        Err(Error::configuration(
            "provider validation requires unix ownership and permission metadata",
        ))
    }

    /// Parse the manifest and build the provider it describes.
    ///
    /// Callers must validate first; [`load_provider`] enforces the order.
    pub fn load(&self) -> Result<Box<dyn SecretProvider>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| Error::ProviderLoad {
            path: self.path.clone(),
            source: err.into(),
        })?;
        let manifest = ProviderManifest::parse(&self.path, &raw)?;
        Ok(Box::new(manifest.into_provider(&self.path)?))
    }

    fn violation(&self, violation: SecurityViolation) -> Error {
        Error::SecurityValidation {
            path: self.path.clone(),
            violation,
        }
    }
}

/// Resolve, validate, and load a provider in the fixed order.
pub fn load_provider(raw: Option<&str>) -> Result<Box<dyn SecretProvider>> {
    let location = ProviderLocation::resolve(raw)?;
    location.validate()?;
    location.load()
}

fn default_manifest_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("rbsee").join(DEFAULT_MANIFEST))
        .ok_or_else(|| Error::configuration("could not determine the user configuration directory"))
}

#[cfg(unix)]
fn process_euid() -> u32 {
    // SAFETY: geteuid has no failure modes and touches no memory.
    unsafe { libc::geteuid() }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;

    fn manifest_at(dir: &Path, mode: u32, contents: &str) -> PathBuf {
        let path = dir.join("secret-provider.toml");
        fs::write(&path, contents).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    const VALID_MANIFEST: &str = r#"
[username]
command = ["echo", "user"]

[password]
command = ["echo", "pw"]

[challenge]
command = ["echo", "answer"]
"#;

    #[test]
    fn resolve_rejects_home_shorthand() {
        let err = ProviderLocation::resolve(Some("~/secret-provider.toml")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn resolve_rejects_relative_paths() {
        let err = ProviderLocation::resolve(Some("conf/secret-provider.toml")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn resolve_rejects_wrong_suffix() {
        let err = ProviderLocation::resolve(Some("/etc/rbsee/secret-provider.mjs")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn resolve_accepts_file_urls() {
        let location =
            ProviderLocation::resolve(Some("file:///etc/rbsee/secret-provider.toml")).unwrap();
        assert_eq!(
            location.path(),
            Path::new("/etc/rbsee/secret-provider.toml")
        );
    }

    #[test]
    fn resolve_defaults_to_per_user_manifest() {
        let location = ProviderLocation::resolve(None).unwrap();
        assert!(location.path().ends_with("rbsee/secret-provider.toml"));
    }

    #[test]
    fn validate_accepts_owner_only_mode() {
        let dir = TempDir::new().unwrap();
        let path = manifest_at(dir.path(), 0o600, VALID_MANIFEST);
        let location = ProviderLocation::resolve(path.to_str()).unwrap();

        let posture = location.validate().unwrap();
        assert_eq!(posture.mode, 0o600);
        assert_eq!(posture.owner_uid, process_euid());
    }

    #[test]
    fn validate_rejects_mode_644_as_wrong_mode() {
        let dir = TempDir::new().unwrap();
        let path = manifest_at(dir.path(), 0o644, VALID_MANIFEST);
        let location = ProviderLocation::resolve(path.to_str()).unwrap();

        let err = location.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::SecurityValidation {
                violation: SecurityViolation::WrongMode { mode: 0o644 },
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_group_writable_before_mode_check() {
        let dir = TempDir::new().unwrap();
        let path = manifest_at(dir.path(), 0o660, VALID_MANIFEST);
        let location = ProviderLocation::resolve(path.to_str()).unwrap();

        let err = location.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::SecurityValidation {
                violation: SecurityViolation::GroupOrWorldWritable { mode: 0o660 },
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret-provider.toml");
        let location = ProviderLocation::resolve(path.to_str()).unwrap();

        let err = location.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::SecurityValidation {
                violation: SecurityViolation::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret-provider.toml");
        fs::create_dir(&path).unwrap();
        let location = ProviderLocation::resolve(path.to_str()).unwrap();

        let err = location.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::SecurityValidation {
                violation: SecurityViolation::NotRegularFile,
                ..
            }
        ));
    }

    #[test]
    fn load_provider_never_parses_an_invalid_posture() {
        // The manifest body is deliberately not valid TOML: if validation did
        // not gate loading, this would surface as a parse error instead.
        let dir = TempDir::new().unwrap();
        let path = manifest_at(dir.path(), 0o644, "not valid toml {{{{");

        let err = load_provider(path.to_str()).unwrap_err();
        assert!(matches!(
            err,
            Error::SecurityValidation {
                violation: SecurityViolation::WrongMode { .. },
                ..
            }
        ));
    }

    #[test]
    fn load_provider_succeeds_on_a_valid_manifest() {
        let dir = TempDir::new().unwrap();
        let path = manifest_at(dir.path(), 0o600, VALID_MANIFEST);

        assert!(load_provider(path.to_str()).is_ok());
    }
}
