//! Runtime settings for the sync engine.
//!
//! Every value has a default; environment variables override them. Parsing
//! goes through a `lookup` closure so it can be exercised without touching
//! the process environment.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;
use crate::{Error, Result};

const ENV_GRACE_MS: &str = "ROTA_SYNC_GRACE_MS";
const ENV_WHERE_IN_LIMIT: &str = "ROTA_SYNC_WHERE_IN_LIMIT";
const ENV_PAGE_SIZE: &str = "ROTA_SYNC_PAGE_SIZE";
const ENV_MAX_FAILURES: &str = "ROTA_SYNC_MAX_FAILURES";
const ENV_MEDIA_DIR: &str = "ROTA_SYNC_MEDIA_DIR";

/// Largest value list the remote store accepts in one `IN` query.
const DEFAULT_WHERE_IN_LIMIT: usize = 10;
const DEFAULT_PAGE_SIZE: usize = 200;
const DEFAULT_MAX_FAILURES: usize = 20;
const DEFAULT_MEDIA_DIR: &str = "media";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Extra margin a remote version needs over the local one to win (ms)
    pub conflict_grace_ms: i64,
    /// Route ids per remote `IN` query
    pub where_in_limit: usize,
    /// Local rows read per push page
    pub page_size: usize,
    /// Failure messages kept per report
    pub max_reported_failures: usize,
    /// Where downloaded photos are stored
    pub media_dir: PathBuf,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            conflict_grace_ms: 0,
            where_in_limit: DEFAULT_WHERE_IN_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            max_reported_failures: DEFAULT_MAX_FAILURES,
            media_dir: PathBuf::from(DEFAULT_MEDIA_DIR),
        }
    }
}

impl SyncSettings {
    /// Load settings from `ROTA_SYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        parse_settings(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn with_media_dir(mut self, media_dir: impl Into<PathBuf>) -> Self {
        self.media_dir = media_dir.into();
        self
    }
}

fn parse_settings(lookup: impl Fn(&str) -> Option<String>) -> Result<SyncSettings> {
    let defaults = SyncSettings::default();
    let value = |key: &str| normalize_text_option(lookup(key));

    let conflict_grace_ms = match value(ENV_GRACE_MS) {
        Some(raw) => parse_number::<i64>(ENV_GRACE_MS, &raw)?,
        None => defaults.conflict_grace_ms,
    };
    if conflict_grace_ms < 0 {
        return Err(Error::InvalidInput(format!(
            "{ENV_GRACE_MS} must not be negative"
        )));
    }

    Ok(SyncSettings {
        conflict_grace_ms,
        where_in_limit: positive(ENV_WHERE_IN_LIMIT, value(ENV_WHERE_IN_LIMIT), defaults.where_in_limit)?,
        page_size: positive(ENV_PAGE_SIZE, value(ENV_PAGE_SIZE), defaults.page_size)?,
        max_reported_failures: match value(ENV_MAX_FAILURES) {
            Some(raw) => parse_number(ENV_MAX_FAILURES, &raw)?,
            None => defaults.max_reported_failures,
        },
        media_dir: value(ENV_MEDIA_DIR).map_or(defaults.media_dir, PathBuf::from),
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a number, got '{raw}'")))
}

fn positive(key: &str, raw: Option<String>, default: usize) -> Result<usize> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match parse_number::<usize>(key, &raw)? {
        0 => Err(Error::InvalidInput(format!("{key} must be greater than zero"))),
        value => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = values
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn parse_settings_uses_defaults() {
        let settings = parse_settings(lookup(&[])).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.where_in_limit, 10);
        assert_eq!(settings.conflict_grace_ms, 0);
    }

    #[test]
    fn parse_settings_reads_overrides() {
        let settings = parse_settings(lookup(&[
            (ENV_GRACE_MS, "1500"),
            (ENV_WHERE_IN_LIMIT, " 30 "),
            (ENV_PAGE_SIZE, "50"),
            (ENV_MEDIA_DIR, "/var/lib/rota/media"),
        ]))
        .unwrap();

        assert_eq!(settings.conflict_grace_ms, 1500);
        assert_eq!(settings.where_in_limit, 30);
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.media_dir, PathBuf::from("/var/lib/rota/media"));
    }

    #[test]
    fn parse_settings_rejects_bad_values() {
        let err = parse_settings(lookup(&[(ENV_PAGE_SIZE, "0")])).unwrap_err();
        assert!(err.to_string().contains(ENV_PAGE_SIZE));

        let err = parse_settings(lookup(&[(ENV_GRACE_MS, "-5")])).unwrap_err();
        assert!(err.to_string().contains("negative"));

        let err = parse_settings(lookup(&[(ENV_WHERE_IN_LIMIT, "ten")])).unwrap_err();
        assert!(err.to_string().contains("ten"));
    }
}
