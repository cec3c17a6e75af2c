//! Atomic file persistence for settings (TOML) and client-local state (JSON).
//!
//! Writes go to a sibling temp file that is fsynced and renamed over the
//! target, so readers see either the old or the new content, never a mix.

use asa_core::error::{AsaError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// On-disk encoding of an [`AtomicFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
}

impl FileFormat {
    fn decode<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        match self {
            FileFormat::Toml => Ok(toml::from_str(content)?),
            FileFormat::Json => Ok(serde_json::from_str(content)?),
        }
    }

    fn encode<T: Serialize>(self, data: &T) -> Result<String> {
        match self {
            FileFormat::Toml => Ok(toml::to_string_pretty(data)?),
            FileFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        }
    }
}

/// A typed handle to a file that is replaced atomically on every save.
pub struct AtomicFile<T> {
    path: PathBuf,
    format: FileFormat,
    _phantom: PhantomData<T>,
}

impl<T> AtomicFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf, format: FileFormat) -> Self {
        Self {
            path,
            format,
            _phantom: PhantomData,
        }
    }

    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, FileFormat::Toml)
    }

    pub fn json(path: PathBuf) -> Self {
        Self::new(path, FileFormat::Json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and decodes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and decoded
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        self.format.decode(&content).map(Some)
    }

    /// Encodes `data` and replaces the file atomically.
    pub fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let encoded = self.format.encode(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(encoded.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under an exclusive lock.
    ///
    /// `default_value` is used when the file is missing. A file that fails to
    /// decode is treated the same way, so a corrupt store heals on next write.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut data = match self.load() {
            Ok(Some(data)) => data,
            Ok(None) => default_value,
            Err(err) if err.is_serialization() => {
                tracing::warn!("[Storage] Replacing unreadable file {:?}: {}", self.path, err);
                default_value
            }
            Err(err) => return Err(err),
        };

        f(&mut data);
        self.save(&data)
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| AsaError::io("Path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| AsaError::io("Path has no file name"))?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive lock guard, released on drop.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| AsaError::io(format!("Failed to acquire lock: {e}")))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_toml_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicFile::<Sample>::toml(temp_dir.path().join("sample.toml"));

        let sample = Sample {
            name: "widget".to_string(),
            count: 3,
        };
        file.save(&sample).unwrap();

        assert_eq!(file.load().unwrap(), Some(sample));
        assert!(!temp_dir.path().join(".sample.toml.tmp").exists());
    }

    #[test]
    fn test_missing_and_empty_files_load_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let file = AtomicFile::<Sample>::json(path.clone());
        assert!(file.load().unwrap().is_none());

        fs::write(&path, "   \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_update_recovers_from_corrupt_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let file = AtomicFile::<BTreeMap<String, String>>::json(path);
        file.update(BTreeMap::new(), |map| {
            map.insert("k".to_string(), "v".to_string());
        })
        .unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.get("k").map(String::as_str), Some("v"));
    }
}
