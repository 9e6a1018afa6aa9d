use crate::store::DEFAULT_CATEGORY;
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub category: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            non_empty("DATABASE_URL").context("Missing required environment variable: DATABASE_URL")?;
        let bind_raw = non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("BIND_ADDR '{}' is not a socket address", bind_raw))?;
        let category = non_empty("EPISODE_CATEGORY").unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Ok(Self {
            database_url,
            bind_addr,
            category,
        })
    }
}
