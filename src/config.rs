use crate::error::{AppError, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const KEY_API_URL: &str = "EXPENSE_API_URL";
const KEY_ACCESS_TOKEN: &str = "EXPENSE_ACCESS_TOKEN";
const KEY_REFRESH_TOKEN: &str = "EXPENSE_REFRESH_TOKEN";
const KEY_TIMEOUT: &str = "EXPENSE_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            refresh_token: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = non_empty(KEY_API_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "{} must be an http(s) URL, got '{}'",
                KEY_API_URL, api_base_url
            )));
        }

        let request_timeout_secs = match non_empty(KEY_TIMEOUT) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(AppError::Config(format!(
                        "{} must be a positive integer, got '{}'",
                        KEY_TIMEOUT, raw
                    )));
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_base_url,
            access_token: non_empty(KEY_ACCESS_TOKEN),
            refresh_token: non_empty(KEY_REFRESH_TOKEN),
            request_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_reads_all_keys() {
        let config = Config::from_lookup(lookup(&[
            ("EXPENSE_API_URL", "https://api.example.com/api/v1/"),
            ("EXPENSE_ACCESS_TOKEN", "abc"),
            ("EXPENSE_REFRESH_TOKEN", "def"),
            ("EXPENSE_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com/api/v1");
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.refresh_token.as_deref(), Some("def"));
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_blank_tokens_are_ignored() {
        let config = Config::from_lookup(lookup(&[("EXPENSE_ACCESS_TOKEN", "  ")])).unwrap();
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn test_rejects_bad_timeout() {
        for raw in ["0", "soon", "-3"] {
            let result = Config::from_lookup(lookup(&[("EXPENSE_REQUEST_TIMEOUT_SECS", raw)]));
            assert!(matches!(result, Err(AppError::Config(_))), "accepted {}", raw);
        }
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = Config::from_lookup(lookup(&[("EXPENSE_API_URL", "localhost:8000")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
