//! Most-recently-used list of opened documents.
//!
//! The list is stored as a single string under [`RECENT_FILES_KEY`], entries
//! joined by NUL (the one character no platform allows inside a path). It is
//! re-read from the settings store on every access so there is exactly one
//! owner of the persisted form.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::paths::{display_name, normalize_path, paths_equal};
use crate::settings::{SettingsStore, RECENT_FILES_KEY};

pub const MAX_RECENT_FILES: usize = 30;
pub const RECENT_FILES_SEPARATOR: char = '\0';

/// A recent file plus the metadata the start page shows for it.
///
/// Serialized in the shape the start page script expects.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecentFileEntry {
    pub path: String,
    pub name: String,
    pub modified_date: String,
    pub exists: bool,
}

impl RecentFileEntry {
    fn describe(path: &Path) -> Self {
        let exists = path.exists();
        let modified_date = if exists {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map(|t| DateTime::<Local>::from(t).format("%b %-d, %Y").to_string())
                .unwrap_or_default()
        } else {
            "File not found".to_string()
        };
        Self {
            path: path.to_string_lossy().to_string(),
            name: display_name(path),
            modified_date,
            exists,
        }
    }
}

pub struct RecentFiles {
    settings: Rc<dyn SettingsStore>,
}

impl RecentFiles {
    pub fn new(settings: Rc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// The stored list, normalized and de-duplicated (first occurrence wins).
    pub fn get(&self) -> Vec<PathBuf> {
        let Some(stored) = self.settings.get(RECENT_FILES_KEY) else {
            return Vec::new();
        };

        let mut files: Vec<PathBuf> = Vec::new();
        for raw in stored.split(RECENT_FILES_SEPARATOR) {
            if raw.is_empty() {
                continue;
            }
            let path = normalize_path(Path::new(raw));
            if !files.iter().any(|f| paths_equal(f, &path)) {
                files.push(path);
            }
        }
        files
    }

    /// Move `path` to the front, dropping any case-insensitive duplicate and
    /// anything past [`MAX_RECENT_FILES`].
    pub fn add(&self, path: &Path) {
        let path = normalize_path(path);
        let mut files = self.get();
        files.retain(|f| !paths_equal(f, &path));
        files.insert(0, path);
        files.truncate(MAX_RECENT_FILES);
        self.save(&files);
    }

    /// Remove `path` (case-insensitive). Returns whether anything changed.
    pub fn remove(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        let mut files = self.get();
        let before = files.len();
        files.retain(|f| !paths_equal(f, &path));
        if files.len() == before {
            return false;
        }
        self.save(&files);
        true
    }

    /// Remove the entry at `index`. Out-of-range indexes are ignored.
    pub fn remove_at(&self, index: usize) -> bool {
        let mut files = self.get();
        if index >= files.len() {
            return false;
        }
        files.remove(index);
        self.save(&files);
        true
    }

    /// Drop entries whose file no longer exists. Returns whether anything changed.
    pub fn remove_missing(&self) -> bool {
        let files = self.get();
        let existing: Vec<PathBuf> = files.iter().filter(|f| f.exists()).cloned().collect();
        if existing.len() == files.len() {
            return false;
        }
        log::info!(
            "Pruned {} missing recent file(s)",
            files.len() - existing.len()
        );
        self.save(&existing);
        true
    }

    pub fn clear(&self) {
        self.save(&[]);
    }

    pub fn entries(&self) -> Vec<RecentFileEntry> {
        self.get()
            .iter()
            .map(|p| RecentFileEntry::describe(p))
            .collect()
    }

    fn save(&self, files: &[PathBuf]) {
        let separator = RECENT_FILES_SEPARATOR.to_string();
        let joined = files
            .iter()
            .map(|f| f.to_string_lossy())
            .collect::<Vec<_>>()
            .join(separator.as_str());
        self.settings.set(RECENT_FILES_KEY, &joined);
    }
}
