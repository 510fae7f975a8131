use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use draglog_ledger::LedgerConfig;

use crate::error::{ClientError, ClientResult};

/// Where operations are served from. The two modes never mix: a local
/// client does not touch the network and a remote one does not write the
/// local log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Remote,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Local => f.write_str("local"),
            Mode::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for Mode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Mode::Local),
            "remote" => Ok(Mode::Remote),
            other => Err(ClientError::Config(format!("unknown mode: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub mode: Mode,
    /// Remote ledger API, used in remote mode.
    pub base_url: String,
    /// Store files, used in local mode.
    pub ledger: LedgerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Local,
            base_url: "http://localhost:8080".into(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> ClientResult<Self> {
        toml::from_str(text).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
