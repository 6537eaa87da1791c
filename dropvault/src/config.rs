//! Application configuration.
//!
//! Defaults live here as constants; deployment values come from the
//! environment (optionally a `.env` file) through [`Settings::from_env`].

use std::env;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Backend table holding file metadata records.
pub const FILE_TABLE: &str = "file";

/// Fields requested for every file record fetch.
pub const DEFAULT_FIELDS: &[&str] = &[
    "Id", "Name", "size", "type", "date", "status", "progress",
    "CreatedOn", "CreatedBy", "ModifiedOn", "Tags",
];

/// Rows shown per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Records scanned when computing storage usage.
pub const STORAGE_SCAN_LIMIT: u32 = 1000;

/// Account quota: 5 GiB.
pub const DEFAULT_STORAGE_QUOTA: u64 = 5 * 1024 * 1024 * 1024;

/// Default port for `dropvault serve`.
pub const DEFAULT_PORT: u16 = 3000;

/// Largest multipart body accepted by `POST /api/queue`: 100 MiB.
pub const MAX_UPLOAD_BODY: usize = 100 * 1024 * 1024;

/// Capacity of the notice broadcast channel.
pub const MAX_NOTICES: usize = 100;

/// Bounds and granularity of the simulated progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTiming {
    /// Shortest simulated upload.
    pub min_duration: Duration,
    /// Longest simulated upload.
    pub max_duration: Duration,
    /// Bytes that take one second to "transfer".
    pub bytes_per_second: u64,
    /// Ticks per simulated upload.
    pub steps: u32,
    /// Pause between backend confirmation and reaching 100%.
    pub settle_delay: Duration,
}

impl Default for ProgressTiming {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_secs(2),
            max_duration: Duration::from_secs(10),
            bytes_per_second: 100_000,
            steps: 50,
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Runtime settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the hosted record store (`DROPVAULT_API_URL`).
    pub api_url: Option<String>,
    /// Project identifier sent with every call (`DROPVAULT_PROJECT_ID`).
    pub project_id: String,
    /// Public key sent with every call (`DROPVAULT_PUBLIC_KEY`).
    pub public_key: String,
    /// Listing page size (`DROPVAULT_PAGE_SIZE`).
    pub page_size: u32,
    /// Account quota in bytes (`DROPVAULT_STORAGE_QUOTA`).
    pub storage_quota: u64,
    /// Signed-in user as JSON (`DROPVAULT_USER`).
    pub user_json: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: None,
            project_id: String::new(),
            public_key: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            storage_quota: DEFAULT_STORAGE_QUOTA,
            user_json: None,
        }
    }
}

impl Settings {
    /// Load settings, reading `.env` first when present.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let defaults = Self::default();

        let page_size = match lookup("DROPVAULT_PAGE_SIZE") {
            Some(raw) => {
                let size = parse_positive("DROPVAULT_PAGE_SIZE", &raw)?;
                u32::try_from(size).map_err(|_| ConfigError::Invalid {
                    name: "DROPVAULT_PAGE_SIZE",
                    message: format!("must be at most {}", u32::MAX),
                })?
            }
            None => defaults.page_size,
        };
        let storage_quota = match lookup("DROPVAULT_STORAGE_QUOTA") {
            Some(raw) => parse_positive("DROPVAULT_STORAGE_QUOTA", &raw)?,
            None => defaults.storage_quota,
        };

        Ok(Self {
            api_url: lookup("DROPVAULT_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            project_id: lookup("DROPVAULT_PROJECT_ID").unwrap_or_default(),
            public_key: lookup("DROPVAULT_PUBLIC_KEY").unwrap_or_default(),
            page_size,
            storage_quota,
            user_json: lookup("DROPVAULT_USER").filter(|raw| !raw.trim().is_empty()),
        })
    }

    /// The record-store URL, required for the HTTP backend.
    pub fn require_api_url(&self) -> ConfigResult<&str> {
        self.api_url
            .as_deref()
            .ok_or(ConfigError::Missing("DROPVAULT_API_URL"))
    }
}

fn parse_positive(name: &'static str, raw: &str) -> ConfigResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            message: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::Invalid {
            name,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.storage_quota, DEFAULT_STORAGE_QUOTA);
        assert!(settings.require_api_url().is_err());
    }

    #[test]
    fn test_reads_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DROPVAULT_API_URL", "https://records.example.com/"),
            ("DROPVAULT_PROJECT_ID", "proj-1"),
            ("DROPVAULT_PAGE_SIZE", "25"),
        ]))
        .unwrap();
        assert_eq!(settings.require_api_url().unwrap(), "https://records.example.com");
        assert_eq!(settings.project_id, "proj-1");
        assert_eq!(settings.page_size, 25);
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let err = Settings::from_lookup(lookup_from(&[("DROPVAULT_PAGE_SIZE", "0")])).unwrap_err();
        assert!(err.to_string().contains("DROPVAULT_PAGE_SIZE"));
    }

    #[test]
    fn test_rejects_page_size_beyond_u32() {
        let err = Settings::from_lookup(lookup_from(&[("DROPVAULT_PAGE_SIZE", "4294967296")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { name: "DROPVAULT_PAGE_SIZE", .. }
        ));

        let settings =
            Settings::from_lookup(lookup_from(&[("DROPVAULT_PAGE_SIZE", "4294967295")])).unwrap();
        assert_eq!(settings.page_size, u32::MAX);
    }
}
