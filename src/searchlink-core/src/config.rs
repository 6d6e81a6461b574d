use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pool::{Endpoint, EndpointPool, MAX_REVIVAL_DELAY};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Base URLs of the service nodes, e.g. `http://search-1:9200`
    pub urls: Vec<String>,

    /// Seconds to wait for each attempt before treating it as failed; fractions allowed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Other nodes to try, in series, after a timeout or connection failure
    #[serde(default)]
    pub max_retries: u32,

    /// Seconds to keep a failed node out of rotation; fractions allowed
    #[serde(default = "default_revival_delay_secs")]
    pub revival_delay_secs: f64,

    #[serde(default)]
    pub insecure_skip_verify: bool,

    // Opaque credentials, sent as HTTP basic auth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_timeout_secs() -> f64 {
    60.0
}

fn default_revival_delay_secs() -> f64 {
    300.0
}

impl ClientConfig {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.urls.is_empty() {
            anyhow::bail!("at least one service URL is required");
        }
        for url in &self.urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("service URL {url:?} must start with http:// or https://");
            }
        }
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            anyhow::bail!("timeout_secs must be a positive number, got {}", self.timeout_secs);
        }
        let max_delay = MAX_REVIVAL_DELAY.as_secs_f64();
        if !(self.revival_delay_secs >= 0.0 && self.revival_delay_secs <= max_delay) {
            anyhow::bail!(
                "revival_delay_secs must be between 0 and {max_delay}, got {}",
                self.revival_delay_secs
            );
        }
        Ok(())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_revival_delay(mut self, delay: Duration) -> Self {
        self.revival_delay_secs = delay.as_secs_f64();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Per-attempt timeout. Falls back to the default when the field is out
    /// of range; `validate` reports that case.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_timeout_secs()))
    }

    /// Revival delay, clamped to [`MAX_REVIVAL_DELAY`]
    pub fn revival_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.revival_delay_secs)
            .map(|delay| delay.min(MAX_REVIVAL_DELAY))
            .unwrap_or(MAX_REVIVAL_DELAY)
    }

    /// Endpoints with trailing slashes stripped, in configured order
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.urls.iter().map(|u| Endpoint::new(u.as_str())).collect()
    }

    pub fn build_pool(&self) -> EndpointPool {
        EndpointPool::new(self.endpoints(), self.revival_delay())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://localhost:9200".to_string()],
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            revival_delay_secs: default_revival_delay_secs(),
            insecure_skip_verify: false,
            username: None,
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"urls": ["http://one.example.com:9200/"]}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.revival_delay(), Duration::from_secs(300));
        assert!(config.username.is_none());
        assert_eq!(config.endpoints()[0].as_str(), "http://one.example.com:9200");
    }

    #[test]
    fn test_validate_rejects_empty_and_schemeless() {
        assert!(ClientConfig::new(Vec::<String>::new()).validate().is_err());
        assert!(ClientConfig::new(["localhost:9200"]).validate().is_err());
        assert!(ClientConfig::new(["https://a:9200", "http://b:9200"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new(["http://a:9200"])
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(2)
            .with_revival_delay(Duration::from_secs(30));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.build_pool().revival_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_sub_second_durations_survive() {
        let config = ClientConfig::new(["http://a:9200"])
            .with_timeout(Duration::from_millis(500))
            .with_revival_delay(Duration::from_millis(1500));
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert_eq!(config.revival_delay(), Duration::from_millis(1500));
        assert!(config.validate().is_ok());

        let config: ClientConfig =
            serde_json::from_str(r#"{"urls": ["http://a:9200"], "timeout_secs": 0.25}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_unusable_durations() {
        let base = ClientConfig::new(["http://a:9200"]);
        assert!(base.clone().with_timeout(Duration::ZERO).validate().is_err());

        let mut config = base.clone();
        config.timeout_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.revival_delay_secs = -1.0;
        assert!(config.validate().is_err());

        assert!(base.with_revival_delay(Duration::ZERO).validate().is_ok());
    }

    #[test]
    fn test_huge_revival_delay_is_rejected_and_never_panics() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"urls": ["http://a:9200"], "revival_delay_secs": 18446744073709551615}"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
        assert_eq!(config.revival_delay(), MAX_REVIVAL_DELAY);

        let pool = config.build_pool();
        let endpoint = Endpoint::new("http://a:9200");
        assert!(pool.mark_dead_at(&endpoint, std::time::Instant::now()));
        assert_eq!(pool.dead_len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(ClientConfig::load("/nonexistent/searchlink.json").is_err());
    }
}
