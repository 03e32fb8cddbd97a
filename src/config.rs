use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MedAgent";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the assessment service base URL.
pub const API_URL_ENV: &str = "MEDAGENT_API_URL";

/// Environment variable overriding the per-request timeout (seconds).
pub const API_TIMEOUT_ENV: &str = "MEDAGENT_API_TIMEOUT_SECS";

/// Base URL used when `MEDAGENT_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:8001/api";

/// Request timeout used when `MEDAGENT_API_TIMEOUT_SECS` is not set or invalid.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medagent_lib=info,warn"
}

/// Get the application data directory.
/// ~/MedAgent/ on all platforms, falling back to the working directory
/// when no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the local state mirror database.
pub fn mirror_db_path() -> PathBuf {
    app_data_dir().join("mirror.db")
}

/// Remote assessment service settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL including the `/api` prefix, without trailing slash.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ServiceConfig {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }

    /// Build from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(API_URL_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs = match lookup(API_TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    tracing::warn!(value = %raw, "Ignoring invalid API timeout, using default");
                    DEFAULT_TIMEOUT_SECS
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        Self::new(&base_url, timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("MedAgent"));
    }

    #[test]
    fn mirror_db_under_app_data() {
        let path = mirror_db_path();
        assert!(path.starts_with(app_data_dir()));
        assert!(path.ends_with("mirror.db"));
    }

    #[test]
    fn app_name_is_medagent() {
        assert_eq!(APP_NAME, "MedAgent");
    }

    #[test]
    fn lookup_without_values_uses_defaults() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn lookup_reads_url_and_trims_trailing_slash() {
        let config = ServiceConfig::from_lookup(|key| match key {
            API_URL_ENV => Some("https://assess.example.org/api/".into()),
            API_TIMEOUT_ENV => Some("12".into()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://assess.example.org/api");
        assert_eq!(config.timeout_secs, 12);
    }

    #[test]
    fn blank_url_falls_back_to_default() {
        let config = ServiceConfig::from_lookup(|key| match key {
            API_URL_ENV => Some("   ".into()),
            _ => None,
        });
        assert_eq!(config.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn invalid_timeout_falls_back_to_default() {
        for raw in ["abc", "0", "-5"] {
            let config = ServiceConfig::from_lookup(|key| match key {
                API_TIMEOUT_ENV => Some(raw.to_string()),
                _ => None,
            });
            assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS, "raw = {raw}");
        }
    }
}
