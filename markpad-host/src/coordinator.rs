//! Tab lifecycle: open, save and close flows, and handling of surface events.
//!
//! The coordinator is the only thing that mutates the [`TabRegistry`]. Every
//! flow that awaits (a prompt, a dialog, a content fetch) re-reads the
//! registry afterwards, since other events may have been handled meanwhile.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use markpad_core::paths::{display_name, normalize_path, paths_equal};
use markpad_core::recent::RecentFiles;
use markpad_core::settings::{SettingsStore, LAST_OPEN_FOLDER_KEY};
use markpad_editor::bridge::MessageBridge;
use markpad_editor::protocol::{
    HostAction, StartPageAction, SurfaceCall, SurfaceEvent, SurfaceQuery, TabMenuAction,
    START_PAGE_TAB_ID,
};

use crate::document::{read_document, write_document};
use crate::insertion::{CaretEditor, InsertOutcome, InsertionAdapter};
use crate::registry::{ActiveTab, Tab, TabId, TabIdSource, TabRegistry, UuidTabIds};
use crate::ui::{HostUi, SaveChoice, SavePathRequest};

const UNTITLED_EXTENSION: &str = "md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    Cancelled,
    Failed,
    NoActiveTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    Cancelled,
    NotFound,
    AlreadyClosing,
}

/// Steps of closing one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseState {
    PromptPending,
    Saving,
    Removing,
}

/// One row of the "View" menu tab list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSummary {
    pub id: TabId,
    pub label: String,
    pub tooltip: String,
    pub active: bool,
}

pub struct TabCoordinator {
    registry: RefCell<TabRegistry>,
    bridge: Rc<MessageBridge>,
    recent: RecentFiles,
    settings: Rc<dyn SettingsStore>,
    ui: Rc<dyn HostUi>,
    ids: Box<dyn TabIdSource>,
    insertion: Option<InsertionAdapter>,
    untitled_counter: Cell<u32>,
    closing: RefCell<HashSet<TabId>>,
}

impl TabCoordinator {
    pub fn new(
        bridge: Rc<MessageBridge>,
        settings: Rc<dyn SettingsStore>,
        ui: Rc<dyn HostUi>,
    ) -> Self {
        Self {
            registry: RefCell::new(TabRegistry::new()),
            bridge,
            recent: RecentFiles::new(settings.clone()),
            settings,
            ui,
            ids: Box::new(UuidTabIds),
            insertion: None,
            untitled_counter: Cell::new(0),
            closing: RefCell::new(HashSet::new()),
        }
    }

    pub fn with_id_source(mut self, ids: Box<dyn TabIdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_caret_editor(mut self, editor: Rc<dyn CaretEditor>) -> Self {
        self.insertion = Some(InsertionAdapter::new(editor));
        self
    }

    pub fn registry(&self) -> Ref<'_, TabRegistry> {
        self.registry.borrow()
    }

    pub fn recent_files(&self) -> &RecentFiles {
        &self.recent
    }

    // ----- Opening -----

    /// Create an empty, untitled tab and focus it.
    pub fn new_document(&self) -> TabId {
        let id = self.allocate_id();
        let n = self.untitled_counter.get() + 1;
        self.untitled_counter.set(n);
        let name = format!("Untitled {}", n);

        {
            let mut registry = self.registry.borrow_mut();
            registry.insert(Tab::untitled(id.clone(), name.clone()));
            registry.set_active(&id);
        }
        self.bridge.invoke(&SurfaceCall::AddTab {
            id: id.clone(),
            name,
            content: String::new(),
            path: None,
        });
        id
    }

    /// Open `path` in a tab, or focus the tab that already has it.
    pub fn open_path(&self, path: &Path) -> Option<TabId> {
        let path = normalize_path(path);

        let existing = self
            .registry
            .borrow()
            .find_by_path(&path)
            .map(|t| t.id.clone());
        if let Some(id) = existing {
            self.switch_to(&id);
            self.promote_recent(&path);
            return Some(id);
        }

        if !path.is_file() {
            self.ui.warn(
                "File Not Found",
                &format!("The file could not be found:\n{}", path.display()),
            );
            if self.recent.remove(&path) {
                self.refresh_recent_files();
            }
            return None;
        }

        let content = match read_document(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("{}", e);
                self.ui.warn("Open Failed", &e.to_string());
                return None;
            }
        };

        let id = self.allocate_id();
        let tab = Tab::for_file(id.clone(), path.clone());
        let name = tab.file_name.clone();
        {
            let mut registry = self.registry.borrow_mut();
            registry.insert(tab);
            registry.set_active(&id);
        }
        if let Some(folder) = path.parent() {
            self.settings
                .set(LAST_OPEN_FOLDER_KEY, &folder.to_string_lossy());
        }
        self.bridge.invoke(&SurfaceCall::AddTab {
            id: id.clone(),
            name,
            content,
            path: Some(path.to_string_lossy().to_string()),
        });
        self.promote_recent(&path);
        log::info!("Opened {}", path.display());
        Some(id)
    }

    /// Ask the user for a file, starting in the last folder a file was
    /// opened from, and open it.
    pub async fn open_with_dialog(&self) -> Option<TabId> {
        let initial_dir = self
            .settings
            .get(LAST_OPEN_FOLDER_KEY)
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());
        let path = self.ui.choose_open_path(initial_dir.as_deref()).await?;
        self.open_path(&path)
    }

    /// Re-read the active tab's file, replacing the surface content.
    pub fn reload_active(&self) -> bool {
        let Some((id, Some(path))) = self.active_snapshot() else {
            return false;
        };
        let content = match read_document(&path) {
            Ok(content) => content,
            Err(e) => {
                self.ui.warn("Reload Failed", &e.to_string());
                return false;
            }
        };
        self.bridge.invoke(&SurfaceCall::LoadContent {
            content,
            file_name: path.to_string_lossy().to_string(),
        });
        self.set_dirty(&id, false);
        true
    }

    // ----- Focus and dirty state -----

    pub fn switch_to(&self, id: &str) -> bool {
        if !self.registry.borrow_mut().set_active(id) {
            return false;
        }
        self.bridge
            .invoke(&SurfaceCall::SwitchToTab { id: id.to_string() });
        true
    }

    pub fn set_dirty(&self, id: &str, dirty: bool) -> bool {
        {
            let mut registry = self.registry.borrow_mut();
            let Some(tab) = registry.get_mut(id) else {
                return false;
            };
            tab.dirty = dirty;
        }
        self.bridge.invoke(&SurfaceCall::SetTabDirty {
            id: id.to_string(),
            dirty,
        });
        true
    }

    // ----- Saving -----

    /// Save the active tab. A tab without a file goes through [`Self::save_as`].
    pub async fn save(&self) -> SaveOutcome {
        let Some((id, path)) = self.active_snapshot() else {
            return SaveOutcome::NoActiveTab;
        };
        let Some(path) = path else {
            return self.save_as().await;
        };

        let Some(content) = self.fetch_active_content(&id).await else {
            return SaveOutcome::Failed;
        };
        if let Err(e) = write_document(&path, &content) {
            log::warn!("{}", e);
            self.ui.warn("Save Failed", &e.to_string());
            return SaveOutcome::Failed;
        }
        self.finish_save(&id, &path, false)
    }

    /// Save the active tab under a path chosen by the user.
    pub async fn save_as(&self) -> SaveOutcome {
        let Some((id, _)) = self.active_snapshot() else {
            return SaveOutcome::NoActiveTab;
        };
        let Some(request) = self.save_path_request(&id) else {
            return SaveOutcome::NoActiveTab;
        };
        let Some(target) = self.ui.choose_save_path(&request).await else {
            return SaveOutcome::Cancelled;
        };
        let target = normalize_path(&target);

        if self.refuse_open_elsewhere(&id, &target) {
            return SaveOutcome::Failed;
        }

        let Some(content) = self.fetch_active_content(&id).await else {
            return SaveOutcome::Failed;
        };
        if let Err(e) = write_document(&target, &content) {
            log::warn!("{}", e);
            self.ui.warn("Save Failed", &e.to_string());
            return SaveOutcome::Failed;
        }
        self.finish_save(&id, &target, true)
    }

    fn finish_save(&self, id: &str, path: &Path, rebind: bool) -> SaveOutcome {
        let path_text = path.to_string_lossy().to_string();
        {
            let mut registry = self.registry.borrow_mut();
            let Some(tab) = registry.get_mut(id) else {
                // Closed while the write was in flight; the file is on disk anyway.
                return SaveOutcome::Saved(path.to_path_buf());
            };
            tab.dirty = false;
            if rebind {
                tab.file_path = Some(path.to_path_buf());
                tab.file_name = display_name(path);
            }
        }
        if rebind {
            self.bridge.invoke(&SurfaceCall::UpdateTab {
                id: id.to_string(),
                name: display_name(path),
                path: path_text.clone(),
            });
        }
        self.bridge.invoke(&SurfaceCall::SetTabDirty {
            id: id.to_string(),
            dirty: false,
        });
        self.bridge.invoke(&SurfaceCall::ReceiveMessage {
            kind: "fileSaved".to_string(),
            data: path_text,
        });
        self.promote_recent(path);
        log::info!("Saved {}", path.display());
        SaveOutcome::Saved(path.to_path_buf())
    }

    /// Content of the active tab, provided `id` is still the active tab both
    /// before and after the round trip.
    async fn fetch_active_content(&self, id: &str) -> Option<String> {
        if !self.is_active(id) {
            log::warn!("Tab {} lost focus before its content was read", id);
            self.warn_focus_lost(id);
            return None;
        }
        let content = self
            .bridge
            .invoke_for_result(&SurfaceQuery::EditorContent)
            .await;
        if !self.is_active(id) {
            log::warn!("Tab {} lost focus while its content was read", id);
            self.warn_focus_lost(id);
            return None;
        }
        if content.is_none() {
            self.ui.warn(
                "Save Failed",
                "Could not read the document contents from the editor.",
            );
        }
        content
    }

    fn warn_focus_lost(&self, id: &str) {
        let name = self.tab_name(id).unwrap_or_else(|| id.to_string());
        self.ui.warn(
            "Save Failed",
            &format!(
                "{} was not saved because another tab was focused while saving.",
                name
            ),
        );
    }

    fn save_path_request(&self, id: &str) -> Option<SavePathRequest> {
        let registry = self.registry.borrow();
        let tab = registry.get(id)?;
        let suggested_dir = match &tab.file_path {
            Some(path) => path.parent().map(Path::to_path_buf),
            None => self.settings.get(LAST_OPEN_FOLDER_KEY).map(PathBuf::from),
        };
        let suggested_name = match &tab.file_path {
            Some(_) => tab.file_name.clone(),
            None => format!("{}.{}", tab.file_name, UNTITLED_EXTENSION),
        };
        Some(SavePathRequest {
            suggested_dir,
            suggested_name,
        })
    }

    fn open_elsewhere(&self, id: &str, path: &Path) -> bool {
        self.registry.borrow().tabs().any(|t| {
            t.id != id
                && t.file_path
                    .as_deref()
                    .is_some_and(|p| paths_equal(p, path))
        })
    }

    /// Warn and return `true` if saving `id` to `path` would give the file two tabs.
    fn refuse_open_elsewhere(&self, id: &str, path: &Path) -> bool {
        if !self.open_elsewhere(id, path) {
            return false;
        }
        self.ui.warn(
            "Save Failed",
            &format!("{} is already open in another tab.", display_name(path)),
        );
        true
    }

    // ----- Closing -----

    /// Close one tab, asking about unsaved changes first.
    pub async fn close_tab(&self, id: &str) -> CloseOutcome {
        let Some(dirty) = self.registry.borrow().get(id).map(|t| t.dirty) else {
            return CloseOutcome::NotFound;
        };
        if !self.closing.borrow_mut().insert(id.to_string()) {
            log::debug!("Close of {} already in progress", id);
            return CloseOutcome::AlreadyClosing;
        }
        let outcome = self.run_close(id, dirty).await;
        self.closing.borrow_mut().remove(id);
        outcome
    }

    async fn run_close(&self, id: &str, dirty: bool) -> CloseOutcome {
        let mut state = if dirty {
            CloseState::PromptPending
        } else {
            CloseState::Removing
        };
        loop {
            state = match state {
                CloseState::PromptPending => {
                    let Some(name) = self.tab_name(id) else {
                        return CloseOutcome::NotFound;
                    };
                    let choice = self.ui.confirm_save(&name).await;
                    if !self.registry.borrow().contains(id) {
                        return CloseOutcome::NotFound;
                    }
                    match choice {
                        SaveChoice::Cancel => return CloseOutcome::Cancelled,
                        SaveChoice::Discard => CloseState::Removing,
                        SaveChoice::Save => CloseState::Saving,
                    }
                }
                CloseState::Saving => {
                    let saved = if self.is_active(id) {
                        matches!(self.save().await, SaveOutcome::Saved(_))
                    } else {
                        self.save_background(id).await
                    };
                    if !self.registry.borrow().contains(id) {
                        return CloseOutcome::NotFound;
                    }
                    if !saved {
                        return CloseOutcome::Cancelled;
                    }
                    CloseState::Removing
                }
                CloseState::Removing => {
                    return if self.remove_tab(id) {
                        CloseOutcome::Closed
                    } else {
                        CloseOutcome::NotFound
                    };
                }
            };
        }
    }

    /// Write a tab that is not focused, fetching its content by id. A tab
    /// without a file gets a save dialog of its own.
    async fn save_background(&self, id: &str) -> bool {
        let Some(content) = self
            .bridge
            .invoke_for_result(&SurfaceQuery::TabContent { id: id.to_string() })
            .await
        else {
            let name = self.tab_name(id).unwrap_or_else(|| id.to_string());
            self.ui.warn(
                "Save Failed",
                &format!("Could not read the contents of {} from the editor.", name),
            );
            return false;
        };

        let bound = self
            .registry
            .borrow()
            .get(id)
            .map(|t| t.file_path.clone());
        let path = match bound {
            None => return false,
            Some(Some(path)) => path,
            Some(None) => {
                let Some(request) = self.save_path_request(id) else {
                    return false;
                };
                let Some(target) = self.ui.choose_save_path(&request).await else {
                    return false;
                };
                let target = normalize_path(&target);
                if self.refuse_open_elsewhere(id, &target) {
                    return false;
                }
                target
            }
        };

        if let Err(e) = write_document(&path, &content) {
            log::warn!("{}", e);
            self.ui.warn("Save Failed", &e.to_string());
            return false;
        }
        self.promote_recent(&path);
        log::info!("Saved {}", path.display());
        true
    }

    fn remove_tab(&self, id: &str) -> bool {
        let removal = self.registry.borrow_mut().remove(id);
        let Some(removal) = removal else {
            return false;
        };
        self.bridge
            .invoke(&SurfaceCall::RemoveTab { id: id.to_string() });
        match removal.reassigned {
            Some(ActiveTab::Tab(next)) => {
                self.bridge.invoke(&SurfaceCall::SwitchToTab { id: next });
            }
            Some(ActiveTab::StartPage) => self.show_start_page(),
            None => {}
        }
        true
    }

    /// Close every tab except `keep`, one at a time. Returns how many closed.
    pub async fn close_others(&self, keep: &str) -> usize {
        let ids: Vec<TabId> = self
            .registry
            .borrow()
            .ids()
            .into_iter()
            .filter(|id| id != keep)
            .collect();
        self.close_each(ids).await
    }

    pub async fn close_all(&self) -> usize {
        let ids = self.registry.borrow().ids();
        self.close_each(ids).await
    }

    async fn close_each(&self, ids: Vec<TabId>) -> usize {
        let mut closed = 0;
        for id in ids {
            if self.close_tab(&id).await == CloseOutcome::Closed {
                closed += 1;
            }
        }
        closed
    }

    // ----- Start page and recent files -----

    pub fn show_start_page(&self) {
        self.registry.borrow_mut().show_start_page();
        self.bridge.invoke(&SurfaceCall::AddStartPageTab);
        self.refresh_recent_files();
    }

    /// Push the current recent-files list to the start page.
    pub fn refresh_recent_files(&self) {
        if !self.bridge.is_ready() {
            return;
        }
        self.bridge.invoke(&SurfaceCall::PopulateRecentFiles {
            entries: self.recent.entries(),
        });
    }

    pub fn remove_recent_at(&self, index: usize) -> bool {
        let removed = self.recent.remove_at(index);
        if removed {
            self.refresh_recent_files();
        }
        removed
    }

    pub fn remove_missing_recent(&self) -> bool {
        let removed = self.recent.remove_missing();
        if removed {
            self.refresh_recent_files();
        }
        removed
    }

    pub fn clear_recent_files(&self) {
        self.recent.clear();
        self.refresh_recent_files();
    }

    fn promote_recent(&self, path: &Path) {
        self.recent.add(path);
        self.refresh_recent_files();
    }

    // ----- Misc -----

    pub async fn insert_into_editor(&self) -> Option<InsertOutcome> {
        let Some(adapter) = &self.insertion else {
            self.ui
                .warn("Insert Failed", "No external editor is connected.");
            return None;
        };
        Some(
            adapter
                .insert_active_content(&self.bridge, self.ui.as_ref())
                .await,
        )
    }

    pub fn tab_list(&self) -> Vec<TabSummary> {
        let registry = self.registry.borrow();
        let active = registry.active_id();
        registry
            .tabs()
            .map(|t| TabSummary {
                id: t.id.clone(),
                label: if t.dirty {
                    format!("* {}", t.file_name)
                } else {
                    t.file_name.clone()
                },
                tooltip: t
                    .file_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Unsaved file".to_string()),
                active: active == Some(t.id.as_str()),
            })
            .collect()
    }

    pub fn copy_path(&self, id: &str) -> bool {
        let Some(path) = self.tab_path(id) else {
            return false;
        };
        self.ui.copy_to_clipboard(&path.to_string_lossy());
        true
    }

    pub fn reveal_in_folder(&self, id: &str) -> bool {
        match self.tab_path(id) {
            Some(path) if path.exists() => {
                self.ui.reveal_in_folder(&path);
                true
            }
            _ => false,
        }
    }

    // ----- Surface events -----

    /// Decode a raw surface message and handle it on the local task set.
    pub fn dispatch(self: &Rc<Self>, raw: &str) {
        let Some(event) = SurfaceEvent::decode(raw) else {
            return;
        };
        let this = Rc::clone(self);
        tokio::task::spawn_local(async move {
            this.handle_event(event).await;
        });
    }

    pub async fn handle_event(&self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Ready => {
                if self.bridge.is_ready() {
                    return;
                }
                self.bridge.set_ready(true);
                log::info!("Surface ready");
                if self.registry.borrow().is_empty() {
                    self.show_start_page();
                }
            }
            SurfaceEvent::TabSwitched { tab_id: Some(id) } => {
                // The surface already shows the tab; only the registry follows.
                let mut registry = self.registry.borrow_mut();
                if id == START_PAGE_TAB_ID {
                    registry.show_start_page();
                } else if !registry.set_active(&id) {
                    log::debug!("tabSwitched for unknown tab {}", id);
                }
            }
            SurfaceEvent::DocumentClicked => self.ui.close_menus(),
            SurfaceEvent::CloseTabRequested { tab_id: Some(id) } => {
                self.close_tab(&id).await;
            }
            SurfaceEvent::TabDirtyChanged {
                tab_id: Some(id),
                is_dirty: Some(dirty),
            } => {
                self.set_dirty(&id, dirty);
            }
            SurfaceEvent::ContextMenuAction {
                action: Some(action),
                tab_id: Some(id),
            } => self.handle_tab_menu(action, &id).await,
            SurfaceEvent::StartPageAction {
                action: Some(action),
            } => self.handle_start_page(action).await,
            SurfaceEvent::PerformAction {
                action: Some(action),
            } => self.handle_host_action(action).await,
            SurfaceEvent::Unknown { event_type } => {
                log::debug!("Ignoring surface event {}", event_type);
            }
            other => log::debug!("Ignoring incomplete surface event {:?}", other),
        }
    }

    async fn handle_tab_menu(&self, action: TabMenuAction, id: &str) {
        if !self.registry.borrow().contains(id) {
            return;
        }
        match action {
            TabMenuAction::Close => {
                self.close_tab(id).await;
            }
            TabMenuAction::CloseOthers => {
                self.close_others(id).await;
            }
            TabMenuAction::CloseAll => {
                self.close_all().await;
            }
            TabMenuAction::Save => {
                if self.is_active(id) {
                    self.save().await;
                }
            }
            TabMenuAction::SaveAs => {
                if self.is_active(id) {
                    self.save_as().await;
                }
            }
            TabMenuAction::CopyPath => {
                self.copy_path(id);
            }
            TabMenuAction::OpenContainingFolder => {
                self.reveal_in_folder(id);
            }
        }
    }

    async fn handle_start_page(&self, action: StartPageAction) {
        match action {
            StartPageAction::NewFile => {
                self.new_document();
            }
            StartPageAction::OpenFile => {
                self.open_with_dialog().await;
            }
            StartPageAction::OpenRecentFile {
                file_path: Some(path),
            } => {
                self.open_path(Path::new(&path));
            }
            StartPageAction::RemoveRecentFile { index: Some(index) } => {
                self.remove_recent_at(index);
            }
            StartPageAction::RemoveMissingFiles => {
                self.remove_missing_recent();
            }
            other => log::debug!("Ignoring incomplete start page action {:?}", other),
        }
    }

    async fn handle_host_action(&self, action: HostAction) {
        match action {
            HostAction::NewFile => {
                self.new_document();
            }
            HostAction::OpenFile => {
                self.open_with_dialog().await;
            }
            HostAction::SaveFile => {
                self.save().await;
            }
            HostAction::SaveFileAs => {
                self.save_as().await;
            }
            HostAction::InsertToEditor => {
                self.insert_into_editor().await;
            }
            HostAction::ShowStartPage => self.show_start_page(),
            HostAction::ShowAbout => self.bridge.invoke(&SurfaceCall::ShowAboutDialog),
            HostAction::Reload => {
                self.reload_active();
            }
        }
    }

    // ----- Helpers -----

    fn allocate_id(&self) -> TabId {
        loop {
            let id = self.ids.new_id();
            if !self.registry.borrow().contains(&id) {
                return id;
            }
            log::debug!("Tab id {} already in use, drawing another", id);
        }
    }

    fn active_snapshot(&self) -> Option<(TabId, Option<PathBuf>)> {
        self.registry
            .borrow()
            .active_tab()
            .map(|t| (t.id.clone(), t.file_path.clone()))
    }

    fn is_active(&self, id: &str) -> bool {
        self.registry.borrow().active_id() == Some(id)
    }

    fn tab_name(&self, id: &str) -> Option<String> {
        self.registry.borrow().get(id).map(|t| t.file_name.clone())
    }

    fn tab_path(&self, id: &str) -> Option<PathBuf> {
        self.registry.borrow().get(id).and_then(|t| t.file_path.clone())
    }
}
