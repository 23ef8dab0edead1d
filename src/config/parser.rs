//! Configuration parser for loading deployment files.
//!
//! This module loads the YAML resource tree and the `.env` file that
//! usually sits next to it.

use crate::credentials::EnvSnapshot;
use crate::error::{ConfigError, GceError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DeployConfig;

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to find the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(GceError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GceError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployConfig> {
        debug!("Parsing YAML configuration");

        let config: DeployConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            GceError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Successfully parsed configuration for deployment: {}", config.deployment);
        Ok(config)
    }

    /// Captures the credential environment, merging the `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<EnvSnapshot> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        EnvSnapshot::from_dotenv(&env_path)
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["gce.deploy.yaml", "gce.deploy.yml", "deployment.yaml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(GceError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PortSpec, ResourceRef};

    #[test]
    fn test_parse_minimal_config() {
        let parser = ConfigParser::new();
        let config = parser.parse_yaml("resources: {}\n", None).expect("minimal config");
        assert_eq!(config.deployment, "default");
        assert!(config.resources.disks.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
deployment: web
resources:
  gceImages:
    bootstrap:
      sourceUri: gs://images/nixos.raw.tar.gz
  gceDisks:
    data:
      region: europe-west1-b
      size: 20
      diskType: ssd
      project: my-project
      image:
        name:
          resource: bootstrap
  gceNetworks:
    net:
      addressRange: 192.168.4.0/24
      firewall:
        ssh:
          allowed:
            tcp: [22]
        web:
          allowed:
            tcp: ["80", 443]
            icmp: null
          sourceTags: [lb]
  gceHTTPHealthChecks:
    hc:
      path: /healthz
  gceTargetPools:
    pool:
      region: europe-west1
      healthCheck:
        resource: hc
      machines: [web-1, web-2]
  gceForwardingRules:
    lb:
      region: europe-west1
      targetPool:
        resource: pool
      portRange: "80"
  gseBuckets:
    assets:
      location: EU
      versioning:
        enabled: true
"#;
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("full config");
        let res = &config.resources;

        assert_eq!(config.deployment, "web");
        let disk = &res.disks["data"];
        assert_eq!(disk.size, Some(20));
        assert_eq!(disk.credentials.project.as_deref(), Some("my-project"));
        assert_eq!(
            disk.image.name,
            Some(ResourceRef::Resource {
                resource: String::from("bootstrap")
            })
        );

        let web = &res.networks["net"].firewall["web"];
        assert_eq!(
            web.allowed["tcp"],
            Some(vec![PortSpec::Text(String::from("80")), PortSpec::Number(443)])
        );
        assert_eq!(web.allowed["icmp"], None);
        assert_eq!(res.target_pools["pool"].machines.len(), 2);
        assert_eq!(res.forwarding_rules["lb"].protocol, "TCP");
        assert!(res.buckets["assets"].versioning.enabled);
    }

    #[test]
    fn test_invalid_yaml_reports_location() {
        let err = ConfigParser::new()
            .parse_yaml("resources: [", Some(Path::new("broken.yaml")))
            .expect_err("invalid yaml");
        match err {
            GceError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("broken.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("gce.deploy.yaml"), "resources: {}\n").expect("write");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");

        let found = find_config_file(&nested).expect("found in parent");
        assert_eq!(found, dir.path().join("gce.deploy.yaml"));
    }
}
