use once_cell::sync::Lazy;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_TOKEN_URL: &str = "https://auth.reltio.com/oauth/token";
pub const DEFAULT_CRM_LINK_BASE: &str = "https://reltio.lightning.force.com/lightning/r";

/// Documents per submission request. Defaults to `30`.
pub static SUBMISSION_CHUNK_SIZE: Lazy<usize> = Lazy::new(|| {
    std::env::var("SUBMISSION_CHUNK_SIZE")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(30)
});

/// key: submission -> timeout for the first attempt of a chunk
pub static SUBMISSION_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("SUBMISSION_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(120)
});

/// key: submission -> timeout for the single resend after reauthentication
pub static SUBMISSION_RETRY_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("SUBMISSION_RETRY_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(200)
});

/// key: submission -> pause before reauthenticating a failed chunk
pub static SUBMISSION_REAUTH_PAUSE_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("SUBMISSION_REAUTH_PAUSE_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(10)
});

/// key: submission -> delay between consecutive chunks
pub static SUBMISSION_PACING_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("SUBMISSION_PACING_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(4)
});

/// When set to a truthy value, entity posts ask the store to merge into existing
/// attributes instead of replacing them. Defaults to `false`.
pub static SUBMISSION_PARTIAL_OVERRIDE: Lazy<bool> = Lazy::new(|| {
    std::env::var("SUBMISSION_PARTIAL_OVERRIDE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// Base of the CRM deep links written into contract and package documents.
pub static CRM_LINK_BASE: Lazy<String> = Lazy::new(|| {
    read_optional_env("CRM_LINK_BASE").unwrap_or_else(|| DEFAULT_CRM_LINK_BASE.to_string())
});

/// Optional directory of `<kind>.json` files overriding the built-in templates.
pub static TEMPLATE_DIR: Lazy<Option<PathBuf>> =
    Lazy::new(|| read_optional_env("TEMPLATE_DIR").map(PathBuf::from));

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_required_env(key: &'static str) -> Result<String, ConfigError> {
    read_optional_env(key).ok_or(ConfigError::Missing(key))
}

/// Values a sync run cannot start without.
#[derive(Clone)]
pub struct SyncConfig {
    /// Tenant API base of the master-data store, e.g. `https://host/reltio/api/<tenant>`.
    pub store_url: url::Url,
    pub token_url: url::Url,
    /// Base64 `client:secret` pair sent as the Basic credential.
    pub store_credential: String,
    pub subscriptions_path: PathBuf,
    pub packages_path: PathBuf,
    /// Label prefixed to notification subjects.
    pub project_name: String,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("store_url", &self.store_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("store_credential", &"<redacted>")
            .field("subscriptions_path", &self.subscriptions_path)
            .field("packages_path", &self.packages_path)
            .field("project_name", &self.project_name)
            .finish()
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_url = parse_url("R360_URL", read_required_env("R360_URL")?)?;
        let token_url = parse_url(
            "TOKEN_URL",
            read_optional_env("TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
        )?;
        let store_credential = read_required_env("STORE_CREDENTIAL")?;
        let subscriptions_path = PathBuf::from(read_required_env("SUBSCRIPTIONS_PATH")?);
        let packages_path = PathBuf::from(read_required_env("PACKAGES_PATH")?);
        let environment = read_optional_env("SYNC_ENV").unwrap_or_else(|| "dev".to_string());

        Ok(Self {
            store_url,
            token_url,
            store_credential,
            subscriptions_path,
            packages_path,
            project_name: format!("subscription-sync ({environment})"),
        })
    }
}

fn parse_url(key: &'static str, raw: String) -> Result<url::Url, ConfigError> {
    url::Url::parse(&raw).map_err(|_| ConfigError::Invalid { key, value: raw })
}
