use std::env;
use std::path::PathBuf;

use dotenv::dotenv;
use log::info;
use thiserror::Error;

use crate::models::PostId;

pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3030";
pub const DEFAULT_PAGE_SIZE: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Server settings.
///
/// - `public_url`: where the site is reachable; used to build share links
/// - `page_size`: posts per feed page
/// - `database`: SQLite file to use instead of the in-memory store
#[derive(Debug, Clone)]
pub struct Config {
    pub public_url: String,
    pub page_size: u32,
    pub database: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            public_url: DEFAULT_PUBLIC_URL.to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            database: None,
        }
    }
}

impl Config {
    /// Reads `DISCUZE_PUBLIC_URL`, `DISCUZE_PAGE_SIZE` and `DISCUZE_DATABASE`,
    /// loading a local `.env` first when one exists.
    pub fn load_env_config() -> Result<Self, ConfigError> {
        if dotenv().is_ok() {
            info!("Loaded .env");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let page_size = match lookup("DISCUZE_PAGE_SIZE") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        key: "DISCUZE_PAGE_SIZE",
                        value,
                    })
                }
            },
            None => defaults.page_size,
        };
        Ok(Config {
            public_url: lookup("DISCUZE_PUBLIC_URL").unwrap_or(defaults.public_url),
            page_size,
            database: lookup("DISCUZE_DATABASE")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn share_link(&self, id: &PostId) -> String {
        share_link(&self.public_url, id)
    }
}

pub fn share_link(base_url: &str, id: &PostId) -> String {
    format!("{}/allposts/{}", base_url.trim_end_matches('/'), id)
}
