use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings key holding the persisted recent-files list.
pub const RECENT_FILES_KEY: &str = "RecentFiles";
/// Settings key holding the folder the open dialog starts in.
pub const LAST_OPEN_FOLDER_KEY: &str = "LastOpenFolder";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error on settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Flat string key-value store backing recent files and small preferences.
///
/// Implementations use interior mutability: everything runs on the single
/// dispatch thread and the store is shared through `Rc<dyn SettingsStore>`.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory store, for embedding without persistence and for tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RefCell<BTreeMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

/// Settings persisted to `~/.config/markpad/settings.json` (or the platform
/// equivalent). Every `set` writes the file through.
#[derive(Debug)]
pub struct JsonSettings {
    path: PathBuf,
    values: RefCell<BTreeMap<String, String>>,
}

impl JsonSettings {
    /// Open the store at `path`. A missing file starts empty; an unreadable or
    /// corrupt one is logged and also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = if path.exists() {
            match read_settings(&path) {
                Ok(values) => values,
                Err(e) => {
                    log::warn!("Ignoring settings at {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Self {
            path,
            values: RefCell::new(values),
        }
    }

    pub fn open_default() -> Self {
        Self::open(default_settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*self.values.borrow())?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        if let Err(e) = self.save() {
            log::warn!("Failed to save settings to {}: {}", self.path.display(), e);
        }
    }
}

fn read_settings(path: &Path) -> Result<BTreeMap<String, String>, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("markpad")
        .join("settings.json")
}
