//! File-backed settings provider.
//!
//! Loads `settings.toml` lazily, caches it, and writes sanitized updates
//! atomically.

use crate::paths::AsaPaths;
use crate::storage::AtomicFile;
use asa_core::config::{Settings, SettingsProvider};
use asa_core::error::{AsaError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Settings read from a TOML file.
///
/// A missing file yields [`Settings::default`]; an unreadable one is logged
/// and also falls back to defaults so the relay keeps answering.
#[derive(Clone)]
pub struct FileSettingsProvider {
    /// Cached settings. Uses RwLock for thread-safe lazy loading.
    cache: Arc<RwLock<Option<Settings>>>,
    path: PathBuf,
}

impl FileSettingsProvider {
    /// Uses `settings.toml` in the resolved config directory.
    pub fn new(base_path: Option<&Path>) -> Result<Self> {
        let path = AsaPaths::new(base_path)
            .settings_file()
            .map_err(|e| AsaError::config(format!("Failed to get settings path: {e}")))?;
        Ok(Self::with_path(path))
    }

    /// Uses an explicit settings file.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            cache: Arc::new(RwLock::new(None)),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file, bypassing the cache. Hand-edited values are
    /// sanitized the same way as saved ones.
    pub fn load(&self) -> Result<Settings> {
        Ok(AtomicFile::<Settings>::toml(self.path.clone())
            .load()?
            .unwrap_or_default()
            .sanitized())
    }

    /// Sanitizes and persists `settings`, then refreshes the cache.
    pub fn save(&self, settings: Settings) -> Result<Settings> {
        let sanitized = settings.sanitized();
        AtomicFile::<Settings>::toml(self.path.clone()).save(&sanitized)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        self.store_cache(Some(sanitized.clone()));
        tracing::info!("[Settings] Saved settings to {:?}", self.path);
        Ok(sanitized)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        self.store_cache(None);
    }

    fn store_cache(&self, value: Option<Settings>) {
        match self.cache.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    fn cached(&self) -> Option<Settings> {
        match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SettingsProvider for FileSettingsProvider {
    fn settings(&self) -> Settings {
        if let Some(cached) = self.cached() {
            return cached;
        }

        let loaded = self.load().unwrap_or_else(|err| {
            tracing::error!("[Settings] Failed to load {:?}: {}", self.path, err);
            Settings::default()
        });

        self.store_cache(Some(loaded.clone()));
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FileSettingsProvider::new(Some(temp_dir.path())).unwrap();

        let settings = provider.settings();
        assert_eq!(settings, Settings::default());
        assert!(provider.api_key().is_none());
    }

    #[test]
    fn test_save_sanitizes_and_reloads() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FileSettingsProvider::new(Some(temp_dir.path())).unwrap();

        let saved = provider
            .save(Settings {
                api_key: "  key-123  ".to_string(),
                display_types: vec!["posts".into(), "nope".into()],
                ..Settings::default()
            })
            .unwrap();
        assert_eq!(saved.api_key, "key-123");
        assert_eq!(saved.display_types, vec!["posts"]);

        let fresh = FileSettingsProvider::new(Some(temp_dir.path())).unwrap();
        assert_eq!(fresh.api_key(), Some("key-123".to_string()));
        assert_eq!(fresh.settings().display_types, vec!["posts"]);
    }

    #[test]
    fn test_cache_until_invalidated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "api_key = \"first\"\n").unwrap();

        let provider = FileSettingsProvider::with_path(path.clone());
        assert_eq!(provider.api_key(), Some("first".to_string()));

        std::fs::write(&path, "api_key = \"second\"\n").unwrap();
        assert_eq!(provider.api_key(), Some("first".to_string()));

        provider.invalidate_cache();
        assert_eq!(provider.api_key(), Some("second".to_string()));
    }

    #[test]
    fn test_hand_edited_file_is_sanitized() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "api_key = \"k\"\nhistory_limit = 0\nprimary_color = \"red\"\ndisplay_types = [\"posts\", \"bogus\"]\n",
        )
        .unwrap();

        let provider = FileSettingsProvider::with_path(path);
        let settings = provider.settings();

        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.primary_color, "#333333");
        assert_eq!(settings.display_types, vec!["posts"]);
        assert_eq!(provider.history_limit(), 50);
        assert_eq!(settings.widget_settings().history_limit, 50);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "api_key = [unterminated").unwrap();

        let provider = FileSettingsProvider::with_path(path);
        assert!(provider.load().is_err());
        assert_eq!(provider.settings(), Settings::default());
    }
}
