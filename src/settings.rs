use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::acquisition::DEFAULT_JPEG_QUALITY;

pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PromptLanguage {
    En,
    Fr,
}

impl Default for PromptLanguage {
    fn default() -> Self {
        PromptLanguage::En
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Facing {
    /// Outward/rear sensor.
    Environment,
    User,
}

impl Default for Facing {
    fn default() -> Self {
        Facing::Environment
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InferenceSettings {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub language: PromptLanguage,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".into(),
            model: "gemini-2.5-flash".into(),
            request_timeout_secs: 60,
            language: PromptLanguage::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraSettings {
    pub facing: Facing,
    pub preview_fps: u32,
    pub first_frame_timeout_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            facing: Facing::default(),
            preview_fps: 15,
            first_frame_timeout_ms: 5_000,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub inference: InferenceSettings,
    pub camera: CameraSettings,
}

/// Read-only settings loaded once at startup. Nothing is ever written back.
pub struct SettingsStore {
    path: PathBuf,
    data: AppSettings,
}

impl SettingsStore {
    pub fn load(path: PathBuf) -> Self {
        let data = match read_settings(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => AppSettings::default(),
            Err(err) => {
                log::warn!("Ignoring unreadable settings file: {err:#}");
                AppSettings::default()
            }
        };

        Self { path, data }
    }

    pub fn get(&self) -> AppSettings {
        self.data.clone()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

fn read_settings(path: &PathBuf) -> Result<Option<AppSettings>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    let settings = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
    Ok(Some(settings))
}

/// The one environment contract: the inference service credential.
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json"));
        let settings = store.get();
        assert_eq!(settings.inference.model, "gemini-2.5-flash");
        assert_eq!(settings.camera.jpeg_quality, 85);
        assert_eq!(settings.camera.facing, Facing::Environment);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "inference": { "language": "fr" }, "camera": { "facing": "user" } }"#,
        )
        .unwrap();

        let settings = SettingsStore::load(path).get();
        assert_eq!(settings.inference.language, PromptLanguage::Fr);
        assert_eq!(settings.inference.request_timeout_secs, 60);
        assert_eq!(settings.camera.facing, Facing::User);
        assert_eq!(settings.camera.preview_fps, 15);
    }

    #[test]
    fn test_corrupt_file_falls_back_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::load(path.clone());
        assert_eq!(store.get().inference.model, "gemini-2.5-flash");
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
