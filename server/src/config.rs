use crate::qdrant::{QdrantClient, QdrantConfig};
use embedding::{
    AzureOpenAiConfig, AzureOpenAiProvider, EmbeddingProvider, GeminiConfig, GeminiProvider,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Invalid settings: {message}")]
    Invalid { message: String },
}

/// Which hosted embedding service backs query and document embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Azure,
    Gemini,
}

impl ProviderKind {
    /// Each provider writes to its own collection, since vectors from
    /// different models are not comparable.
    pub fn default_collection(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "taiwan_food_menu_azure",
            ProviderKind::Gemini => "taiwan_food_menu",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "azure" => Ok(ProviderKind::Azure),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(format!(
                "unknown embedding provider '{other}', expected 'azure' or 'gemini'"
            )),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Azure => write!(f, "azure"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// Runtime settings, resolved from environment variables over built-in
/// defaults. Credentials are optional here: the service starts without them
/// and reports the missing pieces on each search instead.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub worker_threads: usize,
    /// Zero disables the per-request timeout.
    pub request_timeout_secs: u64,
    pub provider_kind: ProviderKind,
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
    pub google_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub collection_name: String,
    pub score_threshold: f32,
    pub search_limit: usize,
    pub menu_source: String,
    pub menu_db_path: PathBuf,
    pub menu_file_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            worker_threads: 8,
            request_timeout_secs: 0,
            provider_kind: ProviderKind::Azure,
            azure_endpoint: None,
            azure_api_key: None,
            azure_deployment: None,
            azure_api_version: None,
            google_api_key: None,
            gemini_model: None,
            qdrant_url: None,
            qdrant_api_key: None,
            collection_name: ProviderKind::Azure.default_collection().to_string(),
            score_threshold: 0.65,
            search_limit: 1,
            menu_source: "sqlite".to_string(),
            menu_db_path: PathBuf::from("menu.db"),
            menu_file_path: PathBuf::from("menu.jsonl"),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(var: &str) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(var) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| SettingsError::InvalidValue {
                var: var.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

impl Settings {
    /// Resolve settings from the environment. Malformed values are startup
    /// errors; absent values fall back to defaults.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Some(port) = parse_env::<u16>("PORT")? {
            settings.port = port;
        }
        if let Some(threads) = parse_env::<usize>("WORKER_THREADS")? {
            settings.worker_threads = threads;
        }
        if let Some(timeout) = parse_env::<u64>("REQUEST_TIMEOUT_SECS")? {
            settings.request_timeout_secs = timeout;
        }
        if let Some(raw) = env_var("EMBEDDING_PROVIDER") {
            settings.provider_kind =
                raw.parse()
                    .map_err(|reason: String| SettingsError::InvalidValue {
                        var: "EMBEDDING_PROVIDER".to_string(),
                        value: raw.clone(),
                        reason,
                    })?;
        }

        settings.azure_endpoint = env_var("AZURE_OPENAI_ENDPOINT");
        settings.azure_api_key = env_var("AZURE_OPENAI_API_KEY");
        settings.azure_deployment = env_var("AZURE_OPENAI_EMBEDDING_DEPLOYMENT");
        settings.azure_api_version = env_var("AZURE_OPENAI_API_VERSION");
        settings.google_api_key = env_var("GOOGLE_API_KEY");
        settings.gemini_model = env_var("GEMINI_EMBEDDING_MODEL");
        settings.qdrant_url = env_var("QDRANT_URL");
        settings.qdrant_api_key = env_var("QDRANT_API_KEY");

        settings.collection_name = env_var("COLLECTION_NAME")
            .unwrap_or_else(|| settings.provider_kind.default_collection().to_string());

        if let Some(threshold) = parse_env::<f32>("SCORE_THRESHOLD")? {
            settings.score_threshold = threshold;
        }
        if let Some(limit) = parse_env::<usize>("SEARCH_LIMIT")? {
            settings.search_limit = limit;
        }
        if let Some(source) = env_var("MENU_SOURCE") {
            settings.menu_source = source;
        }
        if let Some(path) = env_var("MENU_DB_PATH") {
            settings.menu_db_path = PathBuf::from(path);
        }
        if let Some(path) = env_var("MENU_FILE_PATH") {
            settings.menu_file_path = PathBuf::from(path);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.port == 0 {
            return Err(SettingsError::Invalid {
                message: "port must be between 1 and 65535".to_string(),
            });
        }
        if self.worker_threads == 0 {
            return Err(SettingsError::Invalid {
                message: "worker_threads must be at least 1".to_string(),
            });
        }
        if self.search_limit == 0 {
            return Err(SettingsError::Invalid {
                message: "search_limit must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(SettingsError::Invalid {
                message: format!(
                    "score_threshold must be within [0.0, 1.0], got {}",
                    self.score_threshold
                ),
            });
        }
        if self.collection_name.is_empty() {
            return Err(SettingsError::Invalid {
                message: "collection_name cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs > 0 {
            Some(Duration::from_secs(self.request_timeout_secs))
        } else {
            None
        }
    }

    /// Azure settings are complete when endpoint, key, and deployment are
    /// all present. The API version has a default and may be omitted.
    pub fn azure_config(&self) -> Option<AzureOpenAiConfig> {
        match (
            &self.azure_endpoint,
            &self.azure_api_key,
            &self.azure_deployment,
        ) {
            (Some(endpoint), Some(api_key), Some(deployment)) => {
                let mut config =
                    AzureOpenAiConfig::new(endpoint.clone(), api_key.clone(), deployment.clone());
                if let Some(version) = &self.azure_api_version {
                    config = config.with_api_version(version.clone());
                }
                Some(config)
            }
            _ => None,
        }
    }

    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        self.google_api_key.as_ref().map(|api_key| {
            let mut config = GeminiConfig::new(api_key.clone());
            if let Some(model) = &self.gemini_model {
                config = config.with_model(model.clone());
            }
            config
        })
    }

    /// Build the configured embedding provider. Returns `None` when the
    /// provider's settings are incomplete or construction fails, so the
    /// service can keep running in a degraded state.
    pub fn embedding_provider(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        match self.provider_kind {
            ProviderKind::Azure => match self.azure_config() {
                Some(config) => match AzureOpenAiProvider::new(config) {
                    Ok(provider) => {
                        info!("Azure OpenAI embedding client initialized");
                        Some(Arc::new(provider))
                    }
                    Err(e) => {
                        warn!("Failed to initialize Azure OpenAI client: {e}");
                        None
                    }
                },
                None => {
                    warn!("Azure OpenAI settings are incomplete; embedding is disabled");
                    None
                }
            },
            ProviderKind::Gemini => match self.gemini_config() {
                Some(config) => match GeminiProvider::new(config) {
                    Ok(provider) => {
                        info!("Gemini embedding client initialized");
                        Some(Arc::new(provider))
                    }
                    Err(e) => {
                        warn!("Failed to initialize Gemini client: {e}");
                        None
                    }
                },
                None => {
                    warn!("GOOGLE_API_KEY is not set; embedding is disabled");
                    None
                }
            },
        }
    }

    /// Build the Qdrant client, or `None` when QDRANT_URL is unset or the
    /// client cannot be constructed.
    pub fn qdrant_client(&self) -> Option<QdrantClient> {
        match &self.qdrant_url {
            Some(url) => {
                let mut config = QdrantConfig::new(url.clone());
                if let Some(api_key) = &self.qdrant_api_key {
                    config = config.with_api_key(api_key.clone());
                }
                match QdrantClient::new(config) {
                    Ok(client) => {
                        info!("Qdrant client initialized for {url}");
                        Some(client)
                    }
                    Err(e) => {
                        warn!("Failed to initialize Qdrant client: {e}");
                        None
                    }
                }
            }
            None => {
                warn!("QDRANT_URL is not set; vector search is disabled");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        "PORT",
        "WORKER_THREADS",
        "REQUEST_TIMEOUT_SECS",
        "EMBEDDING_PROVIDER",
        "AZURE_OPENAI_ENDPOINT",
        "AZURE_OPENAI_API_KEY",
        "AZURE_OPENAI_EMBEDDING_DEPLOYMENT",
        "AZURE_OPENAI_API_VERSION",
        "GOOGLE_API_KEY",
        "GEMINI_EMBEDDING_MODEL",
        "QDRANT_URL",
        "QDRANT_API_KEY",
        "COLLECTION_NAME",
        "SCORE_THRESHOLD",
        "SEARCH_LIMIT",
        "MENU_SOURCE",
        "MENU_DB_PATH",
        "MENU_FILE_PATH",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_environment_is_empty() {
        clear_env();
        let settings = Settings::load().unwrap();

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.worker_threads, 8);
        assert_eq!(settings.request_timeout_secs, 0);
        assert_eq!(settings.request_timeout(), None);
        assert_eq!(settings.provider_kind, ProviderKind::Azure);
        assert_eq!(settings.collection_name, "taiwan_food_menu_azure");
        assert_eq!(settings.score_threshold, 0.65);
        assert_eq!(settings.search_limit, 1);
        assert_eq!(settings.menu_source, "sqlite");
    }

    #[test]
    #[serial]
    fn test_port_resolves_from_environment() {
        clear_env();
        std::env::set_var("PORT", "9000");
        let settings = Settings::load().unwrap();
        assert_eq!(settings.port, 9000);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_malformed_port_is_a_startup_error() {
        clear_env();
        std::env::set_var("PORT", "not-a-number");
        let err = Settings::load().unwrap_err();
        match err {
            SettingsError::InvalidValue { var, value, .. } => {
                assert_eq!(var, "PORT");
                assert_eq!(value, "not-a-number");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
        clear_env();
    }

    #[test]
    #[serial]
    fn test_gemini_provider_switches_default_collection() {
        clear_env();
        std::env::set_var("EMBEDDING_PROVIDER", "gemini");
        let settings = Settings::load().unwrap();
        assert_eq!(settings.provider_kind, ProviderKind::Gemini);
        assert_eq!(settings.collection_name, "taiwan_food_menu");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_collection_override_beats_provider_default() {
        clear_env();
        std::env::set_var("EMBEDDING_PROVIDER", "gemini");
        std::env::set_var("COLLECTION_NAME", "menu_test");
        let settings = Settings::load().unwrap();
        assert_eq!(settings.collection_name, "menu_test");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unknown_provider_is_rejected() {
        clear_env();
        std::env::set_var("EMBEDDING_PROVIDER", "openai");
        let err = Settings::load().unwrap_err();
        assert!(
            err.to_string().contains("openai"),
            "unexpected error: {err}"
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_request_timeout_enabled_when_positive() {
        clear_env();
        std::env::set_var("REQUEST_TIMEOUT_SECS", "30");
        let settings = Settings::load().unwrap();
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_worker_threads_rejected() {
        clear_env();
        std::env::set_var("WORKER_THREADS", "0");
        assert!(Settings::load().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_score_threshold_out_of_range_rejected() {
        clear_env();
        std::env::set_var("SCORE_THRESHOLD", "1.5");
        assert!(Settings::load().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_azure_config_requires_endpoint_key_and_deployment() {
        clear_env();
        let mut settings = Settings::default();
        assert!(settings.azure_config().is_none());

        settings.azure_endpoint = Some("https://example.openai.azure.com".to_string());
        settings.azure_api_key = Some("secret".to_string());
        assert!(settings.azure_config().is_none());

        settings.azure_deployment = Some("embed-dep".to_string());
        let config = settings.azure_config().unwrap();
        assert_eq!(config.api_version, "2024-02-01");

        settings.azure_api_version = Some("2024-06-01".to_string());
        let config = settings.azure_config().unwrap();
        assert_eq!(config.api_version, "2024-06-01");
    }

    #[test]
    #[serial]
    fn test_embedding_provider_none_when_unconfigured() {
        clear_env();
        let settings = Settings::default();
        assert!(settings.embedding_provider().is_none());
        assert!(settings.qdrant_client().is_none());
    }

    #[test]
    #[serial]
    fn test_embedding_provider_built_from_complete_settings() {
        clear_env();
        let mut settings = Settings::default();
        settings.azure_endpoint = Some("https://example.openai.azure.com".to_string());
        settings.azure_api_key = Some("secret".to_string());
        settings.azure_deployment = Some("embed-dep".to_string());

        let provider = settings.embedding_provider().unwrap();
        assert_eq!(provider.provider_name(), "azure-openai");
    }
}
