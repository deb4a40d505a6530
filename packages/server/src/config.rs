//! Server configuration from the environment
//!
//! - `NOTESAI_HOST`: bind address (default `127.0.0.1`)
//! - `NOTESAI_PORT`: port (default `4000`)
//! - `NOTESAI_DB_PATH`: database file (default `~/.notesai/database/notesai.db`)

use anyhow::Context;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; unparseable ports fall back to the
    /// default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("NOTESAI_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("NOTESAI_PORT") {
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid NOTESAI_PORT '{}'", raw);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let db_path = match lookup("NOTESAI_DB_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        Ok(Self {
            host,
            port,
            db_path,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn default_db_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".notesai").join("database").join("notesai.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_explicit_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("NOTESAI_HOST", "0.0.0.0"),
            ("NOTESAI_PORT", "8080"),
            ("NOTESAI_DB_PATH", "/tmp/notes.db"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.db_path, PathBuf::from("/tmp/notes.db"));
    }

    #[test]
    fn test_bad_port_uses_default() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("NOTESAI_PORT", "eighty"),
            ("NOTESAI_DB_PATH", "/tmp/notes.db"),
        ]))
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
    }
}
