//! DSN/config parsing (C12): turns a `mem://` or `file:` connection string into a
//! validated `DbConfig`.
//!
//! No teacher module does this (the teacher binds to a fixed TCP port from flat CLI
//! flags); this is new code written directly against spec §6 using the `url` crate's
//! query-string decoder, the way the pack's other embeddable-database examples parse
//! their connection strings.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TinySqlError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: Backend,
    pub tenant: String,
    pub autosave: bool,
    pub pool_readers: usize,
    pub pool_writers: usize,
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            tenant: "default".to_string(),
            autosave: false,
            pool_readers: 0,
            pool_writers: 1,
            busy_timeout: Duration::from_millis(0),
        }
    }
}

/// Parse a `mem://[?opts]` or `file:/path[?opts]` connection string.
pub fn parse_dsn(dsn: &str) -> Result<DbConfig> {
    let (scheme, rest) = dsn
        .split_once(':')
        .ok_or_else(|| TinySqlError::Parse(format!("invalid dsn '{}': missing scheme", dsn)))?;

    let mut config = DbConfig::default();

    let (body, query) = match rest.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (rest, None),
    };

    config.backend = match scheme {
        "mem" => {
            let trimmed = body.strip_prefix("//").unwrap_or(body);
            if !trimmed.is_empty() {
                return Err(TinySqlError::Parse(format!(
                    "mem:// dsn does not take a path component (got '{}')",
                    trimmed
                )));
            }
            Backend::Memory
        }
        "file" => {
            if body.is_empty() {
                return Err(TinySqlError::Parse("file: dsn requires a path".into()));
            }
            Backend::File(PathBuf::from(body))
        }
        other => return Err(TinySqlError::Parse(format!("unsupported dsn scheme '{}'", other))),
    };

    if let Some(query) = query {
        apply_options(&mut config, query)?;
    }

    Ok(config)
}

fn apply_options(config: &mut DbConfig, query: &str) -> Result<()> {
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "tenant" => config.tenant = value.to_string(),
            "autosave" => config.autosave = parse_truthy(&value),
            "pool_readers" | "read_pool" | "reader_pool" => {
                config.pool_readers = parse_capacity(&key, &value)?
            }
            "pool_writers" | "write_pool" | "writer_pool" => {
                config.pool_writers = parse_capacity(&key, &value)?
            }
            "busy_timeout" | "busytimeout" => config.busy_timeout = parse_duration(&value)?,
            other => {
                return Err(TinySqlError::Parse(format!("unrecognized dsn option '{}'", other)))
            }
        }
    }
    Ok(())
}

fn parse_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_capacity(key: &str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| TinySqlError::Parse(format!("dsn option '{}' must be a non-negative integer, got '{}'", key, value)))
}

/// Bare digits are milliseconds; otherwise a simple `<n>ms` / `<n>s` duration string.
fn parse_duration(value: &str) -> Result<Duration> {
    if let Ok(ms) = value.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    if let Some(stripped) = value.strip_suffix("ms") {
        let ms: u64 = stripped
            .parse()
            .map_err(|_| TinySqlError::Parse(format!("invalid busy_timeout duration '{}'", value)))?;
        return Ok(Duration::from_millis(ms));
    }
    if let Some(stripped) = value.strip_suffix('s') {
        let secs: u64 = stripped
            .parse()
            .map_err(|_| TinySqlError::Parse(format!("invalid busy_timeout duration '{}'", value)))?;
        return Ok(Duration::from_secs(secs));
    }
    Err(TinySqlError::Parse(format!("invalid busy_timeout duration '{}'", value)))
}
