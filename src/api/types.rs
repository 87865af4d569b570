//! API request and response types

use crate::persona::{PersonaDefinition, PersonaTheme};
use crate::runtime::SessionView;
use serde::{Deserialize, Serialize};

/// Request to create a new session
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub persona: String,
    /// Registered model ID; the registry default when omitted
    #[serde(default)]
    pub model: Option<String>,
}

/// Request to submit user text
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

/// Persona display data; the system instruction stays server-side
#[derive(Debug, Serialize)]
pub struct PersonaInfo {
    pub id: String,
    pub name: String,
    pub title: String,
    pub input_label: String,
    pub hint: String,
    pub fact_label: String,
    pub farewell: String,
    pub theme: PersonaTheme,
    pub has_facts: bool,
}

impl From<&PersonaDefinition> for PersonaInfo {
    fn from(p: &PersonaDefinition) -> Self {
        Self {
            id: p.id().to_string(),
            name: p.name().to_string(),
            title: p.title().to_string(),
            input_label: p.input_label().to_string(),
            hint: p.hint().to_string(),
            fact_label: p.fact_label().to_string(),
            farewell: p.farewell().to_string(),
            theme: p.theme().clone(),
            has_facts: !p.facts().is_empty(),
        }
    }
}

/// Response with the persona list
#[derive(Debug, Serialize)]
pub struct PersonaListResponse {
    pub personas: Vec<PersonaInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Response with a random fact, `null` when the persona has none
#[derive(Debug, Serialize)]
pub struct FactResponse {
    pub fact: Option<String>,
}

/// Response with a single session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionView,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Model information for API response
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
