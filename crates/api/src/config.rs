use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use helpdesk_core::DispatcherConfig;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Hosting settings plus the dispatcher's collaborator settings, read once at
/// process start.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub bind: String,
    pub database_url: Option<String>,
    pub kb_seed: Option<PathBuf>,
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<String>,
    pub api_key: Option<String>,
    pub dispatcher: DispatcherConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let dispatcher =
            DispatcherConfig::from_env().context("invalid dispatcher configuration")?;

        Ok(Self {
            bind: env_value("HELPDESK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            database_url: env_value("HELPDESK_DATABASE_URL"),
            kb_seed: env_value("HELPDESK_KB_SEED").map(PathBuf::from),
            mail_relay_url: env_value("HELPDESK_MAIL_RELAY_URL"),
            mail_relay_token: env_value("HELPDESK_MAIL_RELAY_TOKEN"),
            api_key: env_value("HELPDESK_API_KEY"),
            dispatcher,
        })
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
