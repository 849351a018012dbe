use serde_json::{Map, Value};

use markpad_core::recent::RecentFileEntry;

use crate::escape::{escape_script_string, normalize_line_endings};

/// The tab id the surface reports when its start page is selected.
pub const START_PAGE_TAB_ID: &str = "startPage";

// ---------------------------------------------------------------------------
// Calls: host → surface (evaluated as script)
// ---------------------------------------------------------------------------

/// One argument of a surface function call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    /// Escaped and double-quoted.
    Str(String),
    /// The bare `null` token, used for an absent path.
    Null,
    Bool(bool),
    /// Pre-serialized JSON, emitted verbatim.
    Json(String),
}

impl ScriptArg {
    fn optional(value: Option<&str>) -> Self {
        match value {
            Some(s) => ScriptArg::Str(s.to_string()),
            None => ScriptArg::Null,
        }
    }

    fn render(&self) -> String {
        match self {
            ScriptArg::Str(s) => format!("\"{}\"", escape_script_string(s)),
            ScriptArg::Null => "null".to_string(),
            ScriptArg::Bool(b) => b.to_string(),
            ScriptArg::Json(json) => json.clone(),
        }
    }
}

/// Render `function(arg1,arg2,...)`.
pub fn render_call(function: &str, args: &[ScriptArg]) -> String {
    let args = args
        .iter()
        .map(ScriptArg::render)
        .collect::<Vec<_>>()
        .join(",");
    format!("{}({})", function, args)
}

/// Fire-and-forget calls that keep the surface's tab strip in sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    AddTab {
        id: String,
        name: String,
        content: String,
        path: Option<String>,
    },
    SwitchToTab {
        id: String,
    },
    RemoveTab {
        id: String,
    },
    UpdateTab {
        id: String,
        name: String,
        path: String,
    },
    SetTabDirty {
        id: String,
        dirty: bool,
    },
    LoadContent {
        content: String,
        file_name: String,
    },
    ReceiveMessage {
        kind: String,
        data: String,
    },
    AddStartPageTab,
    PopulateRecentFiles {
        entries: Vec<RecentFileEntry>,
    },
    ShowAboutDialog,
}

impl SurfaceCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            SurfaceCall::AddTab { .. } => "addTab",
            SurfaceCall::SwitchToTab { .. } => "switchToTab",
            SurfaceCall::RemoveTab { .. } => "removeTab",
            SurfaceCall::UpdateTab { .. } => "updateTab",
            SurfaceCall::SetTabDirty { .. } => "setTabDirty",
            SurfaceCall::LoadContent { .. } => "loadContent",
            SurfaceCall::ReceiveMessage { .. } => "receiveMessage",
            SurfaceCall::AddStartPageTab => "addStartPageTab",
            SurfaceCall::PopulateRecentFiles { .. } => "populateRecentFiles",
            SurfaceCall::ShowAboutDialog => "showAboutDialog",
        }
    }

    fn args(&self) -> Vec<ScriptArg> {
        match self {
            SurfaceCall::AddTab {
                id,
                name,
                content,
                path,
            } => vec![
                ScriptArg::Str(id.clone()),
                ScriptArg::Str(name.clone()),
                ScriptArg::Str(normalize_line_endings(content)),
                ScriptArg::optional(path.as_deref()),
            ],
            SurfaceCall::SwitchToTab { id } | SurfaceCall::RemoveTab { id } => {
                vec![ScriptArg::Str(id.clone())]
            }
            SurfaceCall::UpdateTab { id, name, path } => vec![
                ScriptArg::Str(id.clone()),
                ScriptArg::Str(name.clone()),
                ScriptArg::Str(path.clone()),
            ],
            SurfaceCall::SetTabDirty { id, dirty } => {
                vec![ScriptArg::Str(id.clone()), ScriptArg::Bool(*dirty)]
            }
            SurfaceCall::LoadContent { content, file_name } => vec![
                ScriptArg::Str(normalize_line_endings(content)),
                ScriptArg::Str(file_name.clone()),
            ],
            SurfaceCall::ReceiveMessage { kind, data } => {
                vec![ScriptArg::Str(kind.clone()), ScriptArg::Str(data.clone())]
            }
            SurfaceCall::PopulateRecentFiles { entries } => {
                let json = serde_json::to_string(entries).unwrap_or_else(|e| {
                    log::error!("Failed to serialize recent files: {}", e);
                    "[]".to_string()
                });
                vec![ScriptArg::Json(json)]
            }
            SurfaceCall::AddStartPageTab | SurfaceCall::ShowAboutDialog => Vec::new(),
        }
    }

    pub fn to_script(&self) -> String {
        render_call(self.function_name(), &self.args())
    }
}

/// Round-trip calls whose string result is read back.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceQuery {
    /// Content of whichever tab the surface currently shows.
    EditorContent,
    /// Content of a specific, possibly background, tab.
    TabContent { id: String },
}

impl SurfaceQuery {
    pub fn function_name(&self) -> &'static str {
        match self {
            SurfaceQuery::EditorContent => "getEditorContent",
            SurfaceQuery::TabContent { .. } => "getTabContent",
        }
    }

    pub fn to_script(&self) -> String {
        match self {
            SurfaceQuery::EditorContent => render_call(self.function_name(), &[]),
            SurfaceQuery::TabContent { id } => {
                render_call(self.function_name(), &[ScriptArg::Str(id.clone())])
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Events: surface → host (posted as JSON messages)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabMenuAction {
    Close,
    CloseOthers,
    CloseAll,
    Save,
    SaveAs,
    CopyPath,
    OpenContainingFolder,
}

impl TabMenuAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "Close" => Some(TabMenuAction::Close),
            "CloseOthers" => Some(TabMenuAction::CloseOthers),
            "CloseAll" => Some(TabMenuAction::CloseAll),
            "Save" => Some(TabMenuAction::Save),
            "SaveAs" => Some(TabMenuAction::SaveAs),
            "CopyPath" => Some(TabMenuAction::CopyPath),
            "OpenContainingFolder" => Some(TabMenuAction::OpenContainingFolder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPageAction {
    NewFile,
    OpenFile,
    OpenRecentFile { file_path: Option<String> },
    RemoveRecentFile { index: Option<usize> },
    RemoveMissingFiles,
}

/// Toolbar-style actions the surface can ask the host to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    NewFile,
    OpenFile,
    SaveFile,
    SaveFileAs,
    InsertToEditor,
    ShowStartPage,
    ShowAbout,
    Reload,
}

impl HostAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "newFile" => Some(HostAction::NewFile),
            "openFile" => Some(HostAction::OpenFile),
            "saveFile" => Some(HostAction::SaveFile),
            "saveFileAs" => Some(HostAction::SaveFileAs),
            "insertToEditor" => Some(HostAction::InsertToEditor),
            "showStartPage" => Some(HostAction::ShowStartPage),
            "showAbout" => Some(HostAction::ShowAbout),
            "reload" => Some(HostAction::Reload),
            _ => None,
        }
    }
}

/// A decoded surface message.
///
/// Every field the surface may omit is an `Option`: a missing, empty or
/// non-scalar field decodes to `None` and handlers treat that as absent.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Ready,
    TabSwitched {
        tab_id: Option<String>,
    },
    DocumentClicked,
    CloseTabRequested {
        tab_id: Option<String>,
    },
    TabDirtyChanged {
        tab_id: Option<String>,
        is_dirty: Option<bool>,
    },
    ContextMenuAction {
        action: Option<TabMenuAction>,
        tab_id: Option<String>,
    },
    StartPageAction {
        action: Option<StartPageAction>,
    },
    PerformAction {
        action: Option<HostAction>,
    },
    Unknown {
        event_type: String,
    },
}

impl SurfaceEvent {
    /// Decode a raw message. Returns `None` when there is nothing to act on
    /// (not JSON, or no `type`); never fails otherwise.
    pub fn decode(raw: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Failed to parse surface message: {} (json: {})", e, raw);
                return None;
            }
        };
        // Messages posted as a JSON string wrap the actual object.
        let value = match value {
            Value::String(inner) => match serde_json::from_str(&inner) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("Failed to parse wrapped surface message: {}", e);
                    return None;
                }
            },
            other => other,
        };
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let event_type = value.get("type")?.as_str()?;
        let data = EventData::new(value.get("data"));

        let event = match event_type {
            "ready" => SurfaceEvent::Ready,
            "tabSwitched" => SurfaceEvent::TabSwitched {
                tab_id: data.text("tabId"),
            },
            "documentClicked" => SurfaceEvent::DocumentClicked,
            "closeTabRequested" => SurfaceEvent::CloseTabRequested {
                tab_id: data.text("tabId"),
            },
            "tabDirtyChanged" => SurfaceEvent::TabDirtyChanged {
                tab_id: data.text("tabId"),
                is_dirty: data.flag("isDirty"),
            },
            "contextMenuAction" => SurfaceEvent::ContextMenuAction {
                action: data.text("action").and_then(|a| TabMenuAction::parse(&a)),
                tab_id: data.text("tabId"),
            },
            "startPageAction" => SurfaceEvent::StartPageAction {
                action: data.start_page_action(),
            },
            "performAction" => SurfaceEvent::PerformAction {
                action: data.text("action").and_then(|a| HostAction::parse(&a)),
            },
            other => SurfaceEvent::Unknown {
                event_type: other.to_string(),
            },
        };
        Some(event)
    }
}

/// Field access over the flat `data` object of a message.
struct EventData<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> EventData<'a> {
    fn new(data: Option<&'a Value>) -> Self {
        Self {
            fields: data.and_then(Value::as_object),
        }
    }

    fn scalar(&self, key: &str) -> Option<&'a Value> {
        self.fields?
            .get(key)
            .filter(|v| v.is_string() || v.is_boolean() || v.is_number())
    }

    fn text(&self, key: &str) -> Option<String> {
        let text = match self.scalar(key)? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    fn flag(&self, key: &str) -> Option<bool> {
        match self.scalar(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn index(&self, key: &str) -> Option<usize> {
        match self.scalar(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn start_page_action(&self) -> Option<StartPageAction> {
        match self.text("action")?.as_str() {
            "newFile" => Some(StartPageAction::NewFile),
            "openFile" => Some(StartPageAction::OpenFile),
            "openRecentFile" => Some(StartPageAction::OpenRecentFile {
                file_path: self.text("filePath"),
            }),
            "removeRecentFile" => Some(StartPageAction::RemoveRecentFile {
                index: self.index("index"),
            }),
            "removeMissingFiles" => Some(StartPageAction::RemoveMissingFiles),
            _ => None,
        }
    }
}
