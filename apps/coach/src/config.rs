use anyhow::{ensure, Context, Result};

use crate::service_client::DEFAULT_SERVICE_URL;

const DEFAULT_WORDS_PER_MINUTE: u32 = 160;

/// Application configuration loaded from environment variables.
/// Every setting has a default; malformed values fail startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service_url: String,
    pub rust_log: String,
    pub speech_words_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let speech_words_per_minute = match lookup("SPEECH_WORDS_PER_MINUTE") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .context("SPEECH_WORDS_PER_MINUTE must be a positive integer")?,
            None => DEFAULT_WORDS_PER_MINUTE,
        };
        ensure!(
            speech_words_per_minute > 0,
            "SPEECH_WORDS_PER_MINUTE must be greater than zero"
        );

        Ok(Config {
            service_url: lookup("INTERVIEW_SERVICE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            speech_words_per_minute,
        })
    }
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
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.service_url, "http://localhost:8000");
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.speech_words_per_minute, 160);
    }

    #[test]
    fn test_values_from_environment() {
        let config = Config::from_lookup(lookup(&[
            ("INTERVIEW_SERVICE_URL", "http://coach.internal:9000"),
            ("RUST_LOG", "debug"),
            ("SPEECH_WORDS_PER_MINUTE", " 200 "),
        ]))
        .unwrap();
        assert_eq!(config.service_url, "http://coach.internal:9000");
        assert_eq!(config.rust_log, "debug");
        assert_eq!(config.speech_words_per_minute, 200);
    }

    #[test]
    fn test_bad_words_per_minute_fails() {
        let err = Config::from_lookup(lookup(&[("SPEECH_WORDS_PER_MINUTE", "fast")])).unwrap_err();
        assert!(err.to_string().contains("SPEECH_WORDS_PER_MINUTE"));
        assert!(Config::from_lookup(lookup(&[("SPEECH_WORDS_PER_MINUTE", "0")])).is_err());
    }
}
