//! Station configuration.
use std::io::Write;
use std::path::Path;
use std::{fs, io};

use serde::Serialize as _;
use serde_json as json;
use thiserror::Error;

use crate::call::{self, Retry};
use crate::context::Context;
use crate::socket::{OptionSet, Role};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration JSON error: {0}")]
    Json(#[from] json::Error),
}

/// Station configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Who we are.
    pub station: StationConfig,
    /// Socket options, per role.
    #[serde(default)]
    pub sockets: SocketConfig,
    /// Receive retry budgets.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Station identity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConfig {
    /// Human-readable station name.
    pub name: String,
    /// Socket identity, also reported as the publisher of broadcasts.
    /// Defaults to the station name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity: String,
}

/// Socket options of each role.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketConfig {
    #[serde(default = "OptionSet::service")]
    pub service: OptionSet,
    #[serde(default = "OptionSet::client")]
    pub client: OptionSet,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            service: OptionSet::service(),
            client: OptionSet::client(),
        }
    }
}

impl SocketConfig {
    /// Options for the given role.
    pub fn get(&self, role: Role) -> &OptionSet {
        match role {
            Role::Service => &self.service,
            Role::Client => &self.client,
        }
    }
}

/// Receive attempts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Attempts made by string and binary receives.
    #[serde(default = "defaults::receive")]
    pub receive: usize,
    /// Attempts made by receives of unknown schema.
    #[serde(default = "defaults::unknown")]
    pub unknown: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            receive: defaults::receive(),
            unknown: defaults::unknown(),
        }
    }
}

impl RetryConfig {
    /// Policy of string and binary receives.
    pub fn receive(&self) -> Retry {
        Retry {
            attempts: self.receive,
            ..Retry::default()
        }
    }

    /// Policy of receives of unknown schema.
    pub fn unknown(&self) -> Retry {
        Retry {
            attempts: self.unknown,
            ..Retry::unknown()
        }
    }
}

mod defaults {
    pub fn receive() -> usize {
        super::call::DEFAULT_ATTEMPTS
    }

    pub fn unknown() -> usize {
        super::call::UNKNOWN_ATTEMPTS
    }
}

impl Config {
    /// Create a new, default configuration.
    pub fn new(name: impl ToString) -> Self {
        Self {
            station: StationConfig {
                name: name.to_string(),
                identity: String::new(),
            },
            sockets: SocketConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Initialize a new configuration. Fails if the path already exists.
    pub fn init(name: impl ToString, path: &Path) -> io::Result<Self> {
        let cfg = Config::new(name);
        cfg.write(path)?;
        Ok(cfg)
    }

    /// Load a configuration from the given path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg = json::from_reader(fs::File::open(path)?)?;

        Ok(cfg)
    }

    /// Write configuration to disk. Fails if the path already exists.
    pub fn write(&self, path: &Path) -> Result<(), io::Error> {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)?;
        let formatter = json::ser::PrettyFormatter::with_indent(b"  ");
        let mut serializer = json::Serializer::with_formatter(&file, formatter);

        self.serialize(&mut serializer)?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        Ok(())
    }

    /// Socket identity of this station.
    pub fn identity(&self) -> &str {
        if self.station.identity.is_empty() {
            &self.station.name
        } else {
            &self.station.identity
        }
    }

    /// A fresh context for an operation of this station.
    pub fn context(&self) -> Context {
        Context::new(self.identity())
    }
}
