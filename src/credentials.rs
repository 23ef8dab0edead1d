//! Credential resolution.
//!
//! Every resource needs a project, a service account and a path to the
//! service account's access key. Each is taken from the resource definition
//! first and from an environment snapshot second; if neither has it, the
//! apply fails with an error naming both places.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, GceError, Result};

/// Environment variable holding the fallback project.
pub const ENV_PROJECT: &str = "GCE_PROJECT";

/// Environment variable holding the fallback service account.
pub const ENV_SERVICE_ACCOUNT: &str = "GCE_SERVICE_ACCOUNT";

/// Environment variable holding the fallback access key path.
pub const ENV_ACCESS_KEY_PATH: &str = "ACCESS_KEY_PATH";

/// Credential fields as declared on a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOptions {
    /// Project ID.
    #[serde(default)]
    pub project: Option<String>,
    /// Service account email.
    #[serde(default)]
    pub service_account: Option<String>,
    /// Path to the service account key file.
    #[serde(default)]
    pub access_key: Option<String>,
}

/// Resolved credentials used to build a provider connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Project ID.
    pub project: String,
    /// Service account email.
    pub service_account: String,
    /// Path to the service account key file.
    pub access_key_path: PathBuf,
}

/// A one-time capture of the credential environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    project: Option<String>,
    service_account: Option<String>,
    access_key_path: Option<String>,
}

impl EnvSnapshot {
    /// Captures the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Builds a snapshot from explicit key/value pairs.
    #[must_use]
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        Self {
            project: vars.get(ENV_PROJECT).cloned(),
            service_account: vars.get(ENV_SERVICE_ACCOUNT).cloned(),
            access_key_path: vars.get(ENV_ACCESS_KEY_PATH).cloned(),
        }
    }

    /// Captures the process environment after merging a `.env` file.
    ///
    /// Variables already set in the process take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn from_dotenv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::from_process());
        }

        let mut vars: HashMap<String, String> = HashMap::new();
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            GceError::Config(ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;
        for item in iter {
            let (key, value) = item.map_err(|e| {
                GceError::Config(ConfigError::ParseError {
                    message: format!("Invalid .env entry: {e}"),
                    location: Some(path.display().to_string()),
                })
            })?;
            vars.insert(key, value);
        }
        vars.extend(std::env::vars());

        Ok(Self::from_vars(vars))
    }
}

/// Resolves the project for a resource.
///
/// `prefix` is the config path of the resource, e.g. `resources.gceDisks.data`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredential`] if neither source provides it.
pub fn resolve_project(
    options: &CredentialOptions,
    env: &EnvSnapshot,
    prefix: &str,
) -> Result<String> {
    pick(options.project.as_ref(), env.project.as_ref(), prefix, "project", ENV_PROJECT)
}

/// Resolves the service account for a resource.
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredential`] if neither source provides it.
pub fn resolve_service_account(
    options: &CredentialOptions,
    env: &EnvSnapshot,
    prefix: &str,
) -> Result<String> {
    pick(
        options.service_account.as_ref(),
        env.service_account.as_ref(),
        prefix,
        "serviceAccount",
        ENV_SERVICE_ACCOUNT,
    )
}

/// Resolves the access key path for a resource.
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredential`] if neither source provides it.
pub fn resolve_access_key_path(
    options: &CredentialOptions,
    env: &EnvSnapshot,
    prefix: &str,
) -> Result<PathBuf> {
    pick(
        options.access_key.as_ref(),
        env.access_key_path.as_ref(),
        prefix,
        "accessKey",
        ENV_ACCESS_KEY_PATH,
    )
    .map(PathBuf::from)
}

/// Resolves all three credentials, in project, service account, key order.
///
/// # Errors
///
/// Returns the first [`ConfigError::MissingCredential`] encountered.
pub fn resolve(
    options: &CredentialOptions,
    env: &EnvSnapshot,
    prefix: &str,
) -> Result<Credentials> {
    Ok(Credentials {
        project: resolve_project(options, env, prefix)?,
        service_account: resolve_service_account(options, env, prefix)?,
        access_key_path: resolve_access_key_path(options, env, prefix)?,
    })
}

fn pick(
    declared: Option<&String>,
    fallback: Option<&String>,
    prefix: &str,
    option: &str,
    env_var: &str,
) -> Result<String> {
    declared
        .filter(|v| !v.is_empty())
        .or(fallback)
        .cloned()
        .ok_or_else(|| {
            GceError::Config(ConfigError::MissingCredential {
                option: format!("{prefix}.{option}"),
                env_var: env_var.to_string(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn options(project: Option<&str>) -> CredentialOptions {
        CredentialOptions {
            project: project.map(String::from),
            service_account: Some(String::from("sa@proj.iam.gserviceaccount.com")),
            access_key: Some(String::from("/keys/sa.pem")),
        }
    }

    #[test]
    fn test_definition_takes_precedence() {
        let env = EnvSnapshot::from_vars([(ENV_PROJECT, "env-project")]);
        let project = resolve_project(&options(Some("defn-project")), &env, "resources.gceDisks.d")
            .expect("project should resolve");
        assert_eq!(project, "defn-project");
    }

    #[test]
    fn test_environment_fallback() {
        let env = EnvSnapshot::from_vars([(ENV_PROJECT, "env-project")]);
        let creds = resolve(&options(None), &env, "resources.gceDisks.d").expect("should resolve");
        assert_eq!(creds.project, "env-project");
        assert_eq!(creds.access_key_path, PathBuf::from("/keys/sa.pem"));
    }

    #[test]
    fn test_missing_names_option_and_variable() {
        let env = EnvSnapshot::default();
        let err = resolve(&options(None), &env, "resources.gceNetworks.net")
            .expect_err("project is missing");
        assert_eq!(
            err.to_string(),
            "Configuration error: please set 'resources.gceNetworks.net.project' or $GCE_PROJECT"
        );
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let env = EnvSnapshot::from_vars([(ENV_PROJECT, "")]);
        assert!(resolve_project(&options(Some("")), &env, "p").is_err());
    }

    #[test]
    fn test_dotenv_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join(".env");
        let mut file = std::fs::File::create(&path).expect("create .env");
        writeln!(file, "GCE_SERVICE_ACCOUNT=dotenv@proj.iam.gserviceaccount.com").expect("write");

        let env = EnvSnapshot::from_dotenv(&path).expect("load .env");
        let account = resolve_service_account(&CredentialOptions::default(), &env, "p")
            .expect("service account from .env");
        // A real environment variable of the same name would win; CI does not set it.
        assert!(account.ends_with("@proj.iam.gserviceaccount.com"));
    }
}
