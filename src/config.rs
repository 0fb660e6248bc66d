use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::SequenceId;
use crate::error::OeisError;

pub const DEFAULT_CONFIG_FILE: &str = "oeis.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    pub fn bfile_url(&self, id: &SequenceId) -> String {
        let padded = format!("{:06}", id.number());
        format!(
            "{}/A{padded}/b{padded}.txt",
            self.base_url.trim_end_matches('/')
        )
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ClientConfig, OeisError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ClientConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| OeisError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ClientConfig, OeisError> {
        serde_json::from_str(content).map_err(|err| OeisError::ConfigParse(err.to_string()))
    }
}

fn default_search_url() -> String {
    "https://oeis.org/search".to_string()
}

fn default_base_url() -> String {
    "https://oeis.org".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_user_agent() -> String {
    format!("oeis-client/{}", env!("CARGO_PKG_VERSION"))
}
