use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::admin::Credentials;
use crate::docker::{ContainerSpec, DEFAULT_IMAGE, PortRequest};
use crate::wait::WaitPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub image: String,
    /// Address ports are published on. All interfaces when unset.
    pub ip: Option<String>,
    pub http: PortRequest,
    pub ssh: PortRequest,
    /// Container runtime binary.
    pub docker: String,
    pub poll_interval_ms: u64,
    /// Give up waiting for readiness after this long. Unbounded when unset.
    pub wait_timeout_secs: Option<u64>,
    pub username: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        let credentials = Credentials::default();
        Self {
            image: DEFAULT_IMAGE.to_string(),
            ip: None,
            http: PortRequest::Random,
            ssh: PortRequest::Random,
            docker: "docker".to_string(),
            poll_interval_ms: 100,
            wait_timeout_secs: None,
            username: credentials.username,
            password: credentials.password,
        }
    }
}

impl Config {
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec {
            image: self.image.clone(),
            bind_address: self.ip.clone(),
            http: self.http,
            ssh: self.ssh,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.wait_timeout_secs.map(Duration::from_secs),
            max_attempts: None,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}
