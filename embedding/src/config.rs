use std::time::Duration;

/// Connection settings for an Azure OpenAI embedding deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub api_key: String,
    /// Name of the embedding model deployment on the resource.
    pub deployment: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl AzureOpenAiConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: "2024-02-01".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Endpoint cannot be empty".to_string());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err("Endpoint must start with http:// or https://".to_string());
        }
        if self.api_key.is_empty() {
            return Err("API key cannot be empty".to_string());
        }
        if self.deployment.is_empty() {
            return Err("Deployment name cannot be empty".to_string());
        }
        if self.api_version.is_empty() {
            return Err("API version cannot be empty".to_string());
        }
        if self.timeout.is_zero() {
            return Err("Timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Connection settings for the Gemini embedding API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Fully qualified model name, e.g. `models/text-embedding-004`.
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "models/text-embedding-004".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("API key cannot be empty".to_string());
        }
        if self.model.is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }
        if self.timeout.is_zero() {
            return Err("Timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Exponential backoff schedule for retrying transient embedding failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay randomized in either direction to avoid
    /// synchronized retries. Zero disables jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Delay before retry number `attempt` (zero-based), doubling each time
    /// up to `max_delay`, with optional jitter applied.
    pub fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let exponential = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt));
        let capped = exponential.min(self.max_delay);

        if self.jitter_factor > 0.0 {
            let jitter_range = capped.as_millis() as f64 * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            let adjusted = (capped.as_millis() as f64 + jitter).max(0.0) as u64;
            Duration::from_millis(adjusted)
        } else {
            capped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_config_validates_complete_settings() {
        let config = AzureOpenAiConfig::new(
            "https://example.openai.azure.com",
            "secret",
            "text-embedding-3-small",
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.api_version, "2024-02-01");
    }

    #[test]
    fn test_azure_config_rejects_bad_endpoint() {
        let config = AzureOpenAiConfig::new("example.openai.azure.com", "secret", "deploy");
        let err = config.validate().unwrap_err();
        assert!(err.contains("http"), "unexpected message: {err}");

        let config = AzureOpenAiConfig::new("", "secret", "deploy");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_azure_config_rejects_missing_credentials() {
        let config = AzureOpenAiConfig::new("https://example.openai.azure.com", "", "deploy");
        assert!(config.validate().is_err());

        let config = AzureOpenAiConfig::new("https://example.openai.azure.com", "secret", "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gemini_config_defaults() {
        let config = GeminiConfig::new("secret");
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "models/text-embedding-004");
        assert_eq!(config.base_url, "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn test_gemini_config_builders() {
        let config = GeminiConfig::new("secret")
            .with_model("models/text-embedding-005")
            .with_base_url("http://localhost:9090")
            .with_timeout(Duration::from_secs(5));
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "models/text-embedding-005");
        assert_eq!(config.base_url, "http://localhost:9090");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_gemini_config_rejects_empty_key() {
        let config = GeminiConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_grows_exponentially_without_jitter() {
        let config = RetryConfig::default()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter_factor(0.0);

        assert_eq!(config.calculate_retry_delay(0), Duration::from_millis(100));
        assert_eq!(config.calculate_retry_delay(1), Duration::from_millis(200));
        assert_eq!(config.calculate_retry_delay(2), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_delay_is_capped_at_max() {
        let config = RetryConfig::default()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter_factor(0.0);

        assert_eq!(config.calculate_retry_delay(20), config.max_delay);
    }

    #[test]
    fn test_retry_delay_jitter_stays_in_range() {
        let config = RetryConfig::default().with_base_delay(Duration::from_millis(1000));

        for attempt in 0..3 {
            let base = RetryConfig {
                jitter_factor: 0.0,
                ..config.clone()
            }
            .calculate_retry_delay(attempt);
            let jittered = config.calculate_retry_delay(attempt);
            let bound = base.as_millis() as f64 * config.jitter_factor;
            let delta = (jittered.as_millis() as f64 - base.as_millis() as f64).abs();
            assert!(
                delta <= bound + 1.0,
                "jitter {delta}ms outside expected bound {bound}ms"
            );
        }
    }
}
