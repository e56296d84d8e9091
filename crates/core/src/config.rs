use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TABLE_NAME_ENV: &str = "FAQ_TABLE_NAME";
pub const SUPPORT_ADDRESS_ENV: &str = "SUPPORT_EMAIL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid knowledge store table name {0:?}: expected 3-255 characters of [A-Za-z0-9_.-]")]
    InvalidTableName(String),
    #[error("invalid support address {0:?}: expected local@domain")]
    InvalidSupportAddress(String),
}

/// Collaborator settings for the dispatcher. Either field may be absent; the
/// dispatcher then answers with a fixed fallback instead of calling out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub store_table_name: Option<String>,
    pub support_address: Option<String>,
}

impl DispatcherConfig {
    pub fn new(
        store_table_name: Option<String>,
        support_address: Option<String>,
    ) -> Result<Self, ConfigError> {
        let store_table_name = non_blank(store_table_name);
        let support_address = non_blank(support_address);

        if let Some(table) = store_table_name.as_deref() {
            if !is_valid_table_name(table) {
                return Err(ConfigError::InvalidTableName(table.to_string()));
            }
        }
        if let Some(address) = support_address.as_deref() {
            if !is_valid_address(address) {
                return Err(ConfigError::InvalidSupportAddress(address.to_string()));
            }
        }

        Ok(Self {
            store_table_name,
            support_address,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(
            env::var(TABLE_NAME_ENV).ok(),
            env::var(SUPPORT_ADDRESS_ENV).ok(),
        )
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn is_valid_table_name(name: &str) -> bool {
    (3..=255).contains(&name.len())
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

fn is_valid_address(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.chars().any(char::is_whitespace)
        && !domain.contains('@')
}
