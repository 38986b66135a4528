/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use broker_reconciler::reconcile::CLUSTER_PLACEHOLDER;
use broker_reconciler::transport::{Endpoint, TransportOptions};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ReconcilerConfig {
    pub config_service: ConfigServiceConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    pub cluster_directory: ClusterDirectoryConfig,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigServiceConfig {
    pub host: String,
    #[serde(default = "default_config_service_port")]
    pub port: u16,
    #[serde(default)]
    pub cert_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BrokerConfig {
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Broker host name with `{cluster}` standing in for the sanitized cluster id.
    #[serde(default = "default_host_template")]
    pub host_template: String,
    #[serde(default)]
    pub cert_dir: Option<PathBuf>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            port: default_broker_port(),
            host_template: default_host_template(),
            cert_dir: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterDirectoryConfig {
    pub static_file: String,
    #[serde(default = "default_readiness_poll_secs")]
    pub readiness_poll_secs: u64,
}

fn default_config_service_port() -> u16 {
    5671
}

fn default_broker_port() -> u16 {
    5673
}

fn default_host_template() -> String {
    CLUSTER_PLACEHOLDER.to_string()
}

fn default_readiness_poll_secs() -> u64 {
    30
}

impl ReconcilerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json5(&contents)
    }

    pub fn from_json5(contents: &str) -> Result<Self, ConfigError> {
        let config: ReconcilerConfig =
            json5::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.config_service.host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "config-service.host must not be empty".to_string(),
            ));
        }
        if !self.broker.host_template.contains(CLUSTER_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "broker.host-template '{}' must contain {CLUSTER_PLACEHOLDER}",
                self.broker.host_template
            )));
        }
        if self.cluster_directory.readiness_poll_secs == 0 {
            return Err(ConfigError::Invalid(
                "cluster-directory.readiness-poll-secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn config_service_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.config_service.host, self.config_service.port)
    }

    pub fn config_service_options(&self) -> TransportOptions {
        TransportOptions::from_optional_cert_dir(self.config_service.cert_dir.as_deref())
    }

    pub fn broker_options(&self) -> TransportOptions {
        TransportOptions::from_optional_cert_dir(self.broker.cert_dir.as_deref())
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_secs(self.cluster_directory.readiness_poll_secs)
    }
}
