//! Model registry for managing available LLM providers

use super::ollama::DEFAULT_OLLAMA_URL;
use super::{LlmService, LoggingService, OllamaService, OpenAIService};
use std::collections::HashMap;
use std::sync::Arc;

/// Model used by every persona in the original deployments
pub const DEFAULT_MODEL: &str = "llama3.2";

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Ollama,
    OpenAI,
}

impl Provider {
    /// Get the display name for this provider
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama",
            Provider::OpenAI => "OpenAI",
        }
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub ollama_base_url: String,
    /// Local models served by Ollama; always registered since no key is needed
    pub ollama_models: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_models: Vec<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_models: vec![DEFAULT_MODEL.to_string()],
            openai_api_key: None,
            openai_base_url: None,
            openai_models: vec!["gpt-4o-mini".to_string()],
            default_model: None,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or(defaults.ollama_base_url),
            ollama_models: std::env::var("OLLAMA_MODELS")
                .ok()
                .map_or(defaults.ollama_models, |v| split_list(&v)),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            openai_models: std::env::var("OPENAI_MODELS")
                .ok()
                .map_or(defaults.openai_models, |v| split_list(&v)),
            default_model: std::env::var("DEFAULT_MODEL").ok(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

struct RegisteredModel {
    provider: Provider,
    service: Arc<dyn LlmService>,
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, RegisteredModel>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services = HashMap::new();

        for model in &config.ollama_models {
            let service = OllamaService::new(&config.ollama_base_url, model.clone());
            services.insert(
                model.clone(),
                RegisteredModel {
                    provider: Provider::Ollama,
                    service: Arc::new(LoggingService::new(Arc::new(service))),
                },
            );
        }

        // In direct mode, don't allow empty keys
        if let Some(api_key) = config.openai_api_key.as_ref().filter(|k| !k.is_empty()) {
            for model in &config.openai_models {
                let service = OpenAIService::new(
                    api_key.clone(),
                    model.clone(),
                    config.openai_base_url.as_deref(),
                );
                services.entry(model.clone()).or_insert(RegisteredModel {
                    provider: Provider::OpenAI,
                    service: Arc::new(LoggingService::new(Arc::new(service))),
                });
            }
        }

        let default_model = config
            .default_model
            .clone()
            .filter(|m| services.contains_key(m))
            .or_else(|| config.ollama_models.first().cloned())
            .or_else(|| {
                let mut ids: Vec<_> = services.keys().cloned().collect();
                ids.sort();
                ids.into_iter().next()
            })
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Registry wrapping a single service, used by tests and embedders
    #[cfg(test)]
    pub fn with_service(service: Arc<dyn LlmService>) -> Self {
        let id = service.model_id().to_string();
        let mut services = HashMap::new();
        services.insert(
            id.clone(),
            RegisteredModel {
                provider: Provider::Ollama,
                service,
            },
        );
        Self {
            services,
            default_model: id,
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).map(|m| m.service.clone())
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Get detailed information about available models
    pub fn available_model_info(&self) -> Vec<crate::api::ModelInfo> {
        let mut infos: Vec<_> = self
            .services
            .iter()
            .map(|(id, model)| crate::api::ModelInfo {
                id: id.clone(),
                provider: model.provider.display_name().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}
