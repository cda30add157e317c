/*
 * The string-keyed key/value store holding the user's mutable preferences: the
 * selected drive, the sketchbook subpath, the granted tree root, the last temporary
 * name, the recent-projects blob and the update policy switches.
 *
 * `JsonPreferenceStore` keeps the values in memory and writes the whole map through
 * to a flat JSON object on every change (temp file + rename). `MemoryPreferenceStore`
 * never touches disk.
 */
use crate::core::path_utils;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub const STORAGE_DRIVE_PREF: &str = "pref_sketchbook_drive";
pub const SKETCHBOOK_LOCATION_PREF: &str = "pref_sketchbook_location";
pub const PERMISSIONED_ROOT_PREF: &str = "pref_sketchbook_location_saf";
pub const LAST_TEMPORARY_NAME_PREF: &str = "last_temporary_sketch_name";
pub const RECENT_PROJECTS_PREF: &str = "recent";
pub const UPDATE_EXAMPLES_PREF: &str = "update_examples";
pub const UPDATE_EXAMPLES_METERED_PREF: &str = "update_examples_mobile_data";

const PREFERENCES_FILENAME: &str = "preferences.json";

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Preference I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Preference file is malformed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Could not determine the application directory for preferences")]
    NoConfigDirectory,
}

pub type Result<T> = std::result::Result<T, PreferenceError>;

pub trait PreferenceStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn put_string(&self, key: &str, value: &str) -> Result<()>;
    fn get_bool(&self, key: &str, default: bool) -> bool;
    fn put_bool(&self, key: &str, value: bool) -> Result<()>;
    fn contains(&self, key: &str) -> bool;
}

fn lock_values(values: &Mutex<Map<String, Value>>) -> MutexGuard<'_, Map<String, Value>> {
    values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_string(&self, key: &str) -> Option<String> {
        lock_values(&self.values)
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        lock_values(&self.values).insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        lock_values(&self.values)
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        lock_values(&self.values).insert(key.to_string(), Value::Bool(value));
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        lock_values(&self.values).contains_key(key)
    }
}

pub struct JsonPreferenceStore {
    file_path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonPreferenceStore {
    /*
     * Opens the store backed by `file_path`. A missing or empty file starts an empty
     * store; a file that is not a JSON object is reported as an error rather than
     * being overwritten on the next write.
     */
    pub fn open(file_path: PathBuf) -> Result<Self> {
        let values = if file_path.exists() {
            let contents = fs::read_to_string(&file_path)?;
            if contents.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str::<Map<String, Value>>(&contents)?
            }
        } else {
            log::debug!("JsonPreferenceStore: {file_path:?} does not exist yet, starting empty.");
            Map::new()
        };
        log::debug!(
            "JsonPreferenceStore: Opened {file_path:?} with {} entries.",
            values.len()
        );
        Ok(JsonPreferenceStore {
            file_path,
            values: Mutex::new(values),
        })
    }

    pub fn open_for_app(app_name: &str) -> Result<Self> {
        let dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(PreferenceError::NoConfigDirectory)?;
        Self::open(dir.join(PREFERENCES_FILENAME))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn flush(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        let tmp_file = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_file, content)?;
        fs::rename(&tmp_file, &self.file_path)?;
        log::trace!("JsonPreferenceStore: Flushed {} entries.", values.len());
        Ok(())
    }

    fn put_value(&self, key: &str, value: Value) -> Result<()> {
        let mut values = lock_values(&self.values);
        values.insert(key.to_string(), value);
        self.flush(&values)
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get_string(&self, key: &str) -> Option<String> {
        lock_values(&self.values)
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.put_value(key, Value::String(value.to_string()))
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        lock_values(&self.values)
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put_value(key, Value::Bool(value))
    }

    fn contains(&self, key: &str) -> bool {
        lock_values(&self.values).contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_defaults_and_overwrites() {
        let store = MemoryPreferenceStore::new();
        assert!(!store.contains(UPDATE_EXAMPLES_PREF));
        assert!(store.get_bool(UPDATE_EXAMPLES_PREF, true));

        store.put_bool(UPDATE_EXAMPLES_PREF, false).unwrap();
        store.put_string(RECENT_PROJECTS_PREF, "a").unwrap();
        store.put_string(RECENT_PROJECTS_PREF, "b").unwrap();

        assert!(!store.get_bool(UPDATE_EXAMPLES_PREF, true));
        assert_eq!(store.get_string(RECENT_PROJECTS_PREF).as_deref(), Some("b"));
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let store = MemoryPreferenceStore::new();
        store.put_string(UPDATE_EXAMPLES_PREF, "yes").unwrap();
        assert!(store.get_bool(UPDATE_EXAMPLES_PREF, true));
        assert!(store.contains(UPDATE_EXAMPLES_PREF));
    }

    #[test]
    fn test_json_store_persists_across_reopen() -> Result<()> {
        // Arrange
        let dir = tempdir().unwrap();
        let file = dir.path().join("nested").join(PREFERENCES_FILENAME);

        // Act
        {
            let store = JsonPreferenceStore::open(file.clone())?;
            store.put_string(STORAGE_DRIVE_PREF, "/media/card")?;
            store.put_bool(UPDATE_EXAMPLES_METERED_PREF, true)?;
        }
        let reopened = JsonPreferenceStore::open(file.clone())?;

        // Assert
        assert_eq!(
            reopened.get_string(STORAGE_DRIVE_PREF).as_deref(),
            Some("/media/card")
        );
        assert!(reopened.get_bool(UPDATE_EXAMPLES_METERED_PREF, false));
        assert!(!file.with_extension("json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_json_store_rejects_non_object_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(PREFERENCES_FILENAME);
        fs::write(&file, "[1, 2, 3]").unwrap();

        assert!(matches!(
            JsonPreferenceStore::open(file),
            Err(PreferenceError::Serde(_))
        ));
    }
}
