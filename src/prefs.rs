use crate::errors::AppError;
use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::error;

/// Locally persisted user preferences.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default)]
    pub language: Language,
}

pub async fn load_preferences(path: &Path) -> Preferences {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(prefs) => prefs,
            Err(err) => {
                error!("failed to parse preferences file: {err}");
                Preferences::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
        Err(err) => {
            error!("failed to read preferences file: {err}");
            Preferences::default()
        }
    }
}

pub async fn persist_preferences(path: &Path, prefs: &Preferences) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(prefs).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir()
            .join(format!("iterabits_prefs_{}_{nanos}", std::process::id()))
            .join(name)
    }

    #[tokio::test]
    async fn missing_file_defaults_to_polish() {
        let prefs = load_preferences(&temp_path("absent.json")).await;
        assert_eq!(prefs.language, Language::Pl);
    }

    #[tokio::test]
    async fn language_survives_a_restart() {
        let path = temp_path("prefs.json");
        let prefs = Preferences {
            language: Language::En,
        };
        persist_preferences(&path, &prefs).await.unwrap();
        assert_eq!(load_preferences(&path).await, prefs);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_default() {
        let path = temp_path("corrupt.json");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, b"{ not json").await.unwrap();
        assert_eq!(load_preferences(&path).await, Preferences::default());
    }
}
