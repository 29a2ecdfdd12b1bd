use anyhow::{Context, Result};
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

pub const DEFAULT_OMDB_BASE: &str = "https://www.omdbapi.com/";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BIND: &str = "0.0.0.0:3146";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const REQUIRED_ENV: [&str; 1] = ["OMDB_API_KEY"];

#[derive(Debug, Clone)]
pub struct Config {
    pub omdb_api_key: String,
    pub omdb_base_url: String,
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let omdb_api_key = env::var("OMDB_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .context("OMDB_API_KEY not set")?;
        let omdb_base_url = non_empty("OMDB_BASE_URL").unwrap_or_else(|| DEFAULT_OMDB_BASE.into());
        let data_dir: PathBuf = non_empty("POPCORN_DATA_DIR")
            .unwrap_or_else(|| DEFAULT_DATA_DIR.into())
            .into();
        let bind_addr: SocketAddr = non_empty("POPCORN_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.into())
            .parse::<SocketAddr>()
            .context("POPCORN_BIND is not a socket address")?;
        let timeout_secs = match non_empty("OMDB_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("OMDB_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            omdb_api_key,
            omdb_base_url,
            data_dir,
            bind_addr,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}
