use crate::ai::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub prefs_path: PathBuf,
    pub backend: BackendConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Supabase { url: String, anon_key: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = var("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);
        let prefs_path = var("APP_PREFS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/preferences.json"));

        let backend = match (var("SUPABASE_URL"), var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => BackendConfig::Supabase { url, anon_key },
            _ => BackendConfig::Memory,
        };

        let ai = AiConfig {
            api_key: var("GEMINI_API_KEY"),
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                var("AI_TIMEOUT_SECS")
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(15),
            ),
        };

        Self {
            port,
            prefs_path,
            backend,
            ai,
        }
    }
}
