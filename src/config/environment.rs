//! Environment settings: driver, dev domains, hosts and bootstrap.

use serde::{Deserialize, Serialize};

use crate::domain::hostplan::Host;

fn default_driver() -> String {
    "local".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ssh_user() -> String {
    "root".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// How workloads run: `local` (compose on this machine) or
    /// `remote` (compose on the environment's hosts).
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<DevConfig>,
    /// Statically declared hosts. Environments may instead rely on a
    /// cloud provider to enumerate hosts for `infra up`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<HostConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra: Option<InfraConfig>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            dev: None,
            hosts: Vec::new(),
            infra: None,
        }
    }
}

impl EnvironmentConfig {
    pub fn ssh_user(&self) -> String {
        self.infra
            .as_ref()
            .map(|i| i.ssh_user.clone())
            .unwrap_or_else(default_ssh_user)
    }
}

/// Local development settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default = "default_true")]
    pub https: bool,
}

/// A statically configured host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl HostConfig {
    /// The implicit host for environments that run everything on the
    /// operator's machine.
    pub fn local() -> Self {
        Self {
            id: "local".to_string(),
            name: "local".to_string(),
            role: "all".to_string(),
            public_ip: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn to_host(&self) -> Host {
        Host {
            logical_id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            public_ip: self.public_ip.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Infrastructure bootstrap settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
}
