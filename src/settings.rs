//! User settings consumed by the page controller.
//!
//! The controller only reads settings. It re-reads them at the start of every
//! cycle, so changes made by the user (new endpoint, auto mode switched off)
//! take effect without restarting it.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

pub const KEY_ENDPOINT: &str = "endpoint";
pub const KEY_DEFAULT_TARGET: &str = "defaultTarget";
pub const KEY_AUTO_TRANSLATE: &str = "autoTranslate";

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TARGET: &str = "vi";

/// Asynchronous read-only key/value source.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `Ok(None)` when the key was never set.
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Snapshot of the settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: String,
    pub default_target: String,
    pub auto_translate: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_target: DEFAULT_TARGET.to_string(),
            auto_translate: false,
        }
    }
}

impl Settings {
    /// Read every key from `store`, falling back to defaults for missing,
    /// blank or unreadable values.
    pub async fn load(store: &dyn SettingsStore) -> Settings {
        let defaults = Settings::default();

        let endpoint = read(store, KEY_ENDPOINT)
            .await
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or(defaults.endpoint);
        let default_target = read(store, KEY_DEFAULT_TARGET)
            .await
            .unwrap_or(defaults.default_target);
        let auto_translate = match read(store, KEY_AUTO_TRANSLATE).await {
            Some(raw) => matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"),
            None => defaults.auto_translate,
        };

        Settings {
            endpoint,
            default_target,
            auto_translate,
        }
    }
}

async fn read(store: &dyn SettingsStore, key: &str) -> Option<String> {
    match store.get(key).await {
        Ok(value) => value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        Err(e) => {
            warn!("Failed to read setting '{}', using default: {}", key, e);
            None
        }
    }
}

/// In-process settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemorySettings::set`].
    pub fn with(self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        Ok(values.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl SettingsStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("storage unavailable")
        }
    }

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let settings = Settings::load(&MemorySettings::new()).await;
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.endpoint, "http://127.0.0.1:8000");
        assert_eq!(settings.default_target, "vi");
        assert!(!settings.auto_translate);
    }

    #[tokio::test]
    async fn test_stored_values_win() {
        let store = MemorySettings::new()
            .with(KEY_ENDPOINT, "https://translate.example.com/")
            .with(KEY_DEFAULT_TARGET, "fr")
            .with(KEY_AUTO_TRANSLATE, "true");

        let settings = Settings::load(&store).await;

        assert_eq!(settings.endpoint, "https://translate.example.com");
        assert_eq!(settings.default_target, "fr");
        assert!(settings.auto_translate);
    }

    #[tokio::test]
    async fn test_blank_values_fall_back() {
        let store = MemorySettings::new().with(KEY_DEFAULT_TARGET, "   ");
        assert_eq!(Settings::load(&store).await.default_target, "vi");
    }

    #[tokio::test]
    async fn test_changes_are_seen_on_next_load() {
        let store = MemorySettings::new().with(KEY_AUTO_TRANSLATE, "true");
        assert!(Settings::load(&store).await.auto_translate);

        store.set(KEY_AUTO_TRANSLATE, "false");
        assert!(!Settings::load(&store).await.auto_translate);

        store.remove(KEY_AUTO_TRANSLATE);
        assert!(!Settings::load(&store).await.auto_translate);
    }

    #[tokio::test]
    async fn test_unreadable_store_uses_defaults() {
        assert_eq!(Settings::load(&BrokenStore).await, Settings::default());
    }
}
