use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use markpad_core::paths::{display_name, paths_equal};

pub type TabId = String;

/// One open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub file_path: Option<PathBuf>,
    pub file_name: String,
    pub dirty: bool,
}

impl Tab {
    pub fn untitled(id: TabId, name: String) -> Self {
        Self {
            id,
            file_path: None,
            file_name: name,
            dirty: false,
        }
    }

    pub fn for_file(id: TabId, path: PathBuf) -> Self {
        Self {
            id,
            file_name: display_name(&path),
            file_path: Some(path),
            dirty: false,
        }
    }
}

/// Which tab has focus. `StartPage` is the state with no document focused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveTab {
    #[default]
    StartPage,
    Tab(TabId),
}

/// Source of fresh tab ids.
pub trait TabIdSource {
    fn new_id(&self) -> TabId;
}

/// Eight hex characters of a v4 uuid.
pub struct UuidTabIds;

impl TabIdSource for UuidTabIds {
    fn new_id(&self) -> TabId {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }
}

/// What [`TabRegistry::remove`] took out, and where focus went if the
/// removed tab had it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub tab: Tab,
    pub reassigned: Option<ActiveTab>,
}

/// Authoritative record of open tabs, in insertion order.
///
/// Invariants kept here rather than by callers: `active` always names a
/// present tab or the start page, and no two tabs share a path
/// (case-insensitive).
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: IndexMap<TabId, Tab>,
    active: ActiveTab,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tabs.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Tab> {
        self.tabs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Tab> {
        self.tabs.get_mut(id)
    }

    pub fn tabs(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.values()
    }

    pub fn ids(&self) -> Vec<TabId> {
        self.tabs.keys().cloned().collect()
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&Tab> {
        self.tabs.values().find(|t| {
            t.file_path
                .as_deref()
                .is_some_and(|p| paths_equal(p, path))
        })
    }

    /// Add `tab`. Refused (returning `false`) when its id is taken or its
    /// path is already open in another tab.
    pub fn insert(&mut self, tab: Tab) -> bool {
        if self.tabs.contains_key(&tab.id) {
            log::error!("Refusing to register duplicate tab id {}", tab.id);
            return false;
        }
        if let Some(path) = tab.file_path.as_deref() {
            if self.find_by_path(path).is_some() {
                log::error!("Refusing second tab for {}", path.display());
                return false;
            }
        }
        self.tabs.insert(tab.id.clone(), tab);
        true
    }

    pub fn active(&self) -> &ActiveTab {
        &self.active
    }

    pub fn active_id(&self) -> Option<&str> {
        match &self.active {
            ActiveTab::Tab(id) => Some(id.as_str()),
            ActiveTab::StartPage => None,
        }
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_id().and_then(|id| self.tabs.get(id))
    }

    /// Focus `id`. Unknown ids leave the registry untouched.
    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.tabs.contains_key(id) {
            return false;
        }
        self.active = ActiveTab::Tab(id.to_string());
        true
    }

    pub fn show_start_page(&mut self) {
        self.active = ActiveTab::StartPage;
    }

    /// Remove `id`. If it was active, focus moves to the first remaining tab,
    /// or to the start page when none remain.
    pub fn remove(&mut self, id: &str) -> Option<Removal> {
        let tab = self.tabs.shift_remove(id)?;
        let reassigned = if self.active_id() == Some(id) {
            self.active = match self.tabs.keys().next() {
                Some(next) => ActiveTab::Tab(next.clone()),
                None => ActiveTab::StartPage,
            };
            Some(self.active.clone())
        } else {
            None
        };
        Some(Removal { tab, reassigned })
    }
}
