//! Global application settings
//!
//! A single record with id `"settings"`, created with defaults the first
//! time it is read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SETTINGS_ID: &str = "settings";
pub const DEFAULT_LM_STUDIO_URL: &str = "http://localhost:1234/v1";

/// Which inference engine the assistant should use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiEngineKind {
    /// In-browser engine
    #[default]
    Webllm,
    /// LM Studio or another OpenAI-compatible server
    Lmstudio,
}

impl AiEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiEngineKind::Webllm => "webllm",
            AiEngineKind::Lmstudio => "lmstudio",
        }
    }
}

impl fmt::Display for AiEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webllm" => Ok(AiEngineKind::Webllm),
            "lmstudio" => Ok(AiEngineKind::Lmstudio),
            other => Err(format!("Unknown AI engine '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub ai_engine: AiEngineKind,
    pub lm_studio_url: String,
    pub lm_studio_model: Option<String>,
    pub preferred_model: Option<String>,
    pub fallback_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// Defaults written on first read
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            ai_engine: AiEngineKind::Webllm,
            lm_studio_url: DEFAULT_LM_STUDIO_URL.to_string(),
            lm_studio_model: None,
            preferred_model: None,
            fallback_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Effective engine: the chosen one, or LM Studio when the in-browser
    /// engine is selected and fallback is allowed. `None` when no server
    /// engine may be used.
    pub fn server_engine(&self) -> Option<AiEngineKind> {
        match self.ai_engine {
            AiEngineKind::Lmstudio => Some(AiEngineKind::Lmstudio),
            AiEngineKind::Webllm if self.fallback_enabled => Some(AiEngineKind::Lmstudio),
            AiEngineKind::Webllm => None,
        }
    }
}

/// Partial settings update; upserts the record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_engine: Option<AiEngineKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_studio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_studio_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_enabled: Option<bool>,
}

impl SettingsUpdate {
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(engine) = self.ai_engine {
            settings.ai_engine = engine;
        }
        if let Some(url) = self.lm_studio_url.as_ref().filter(|u| !u.is_empty()) {
            settings.lm_studio_url = url.clone();
        }
        if let Some(model) = &self.lm_studio_model {
            settings.lm_studio_model = Some(model.clone());
        }
        if let Some(model) = &self.preferred_model {
            settings.preferred_model = Some(model.clone());
        }
        if let Some(enabled) = self.fallback_enabled {
            settings.fallback_enabled = enabled;
        }
    }
}
