//! Recording fakes shared by the host tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::sync::oneshot;

use markpad_editor::bridge::{ScriptFuture, Surface};

use crate::insertion::{CaretEditor, InsertResult};
use crate::ui::{HostUi, SaveChoice, SavePathRequest};

pub async fn run_local<F: Future>(f: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(f).await
}

/// Surface that records every script and answers from a table keyed by the
/// exact script text. Anything unanswered evaluates to `null`.
#[derive(Default)]
pub struct RecordingSurface {
    scripts: RefCell<Vec<String>>,
    replies: RefCell<HashMap<String, String>>,
    /// When set, the next script's reply waits for this. The script itself is
    /// recorded straight away.
    pub reply_gate: RefCell<Option<oneshot::Receiver<()>>>,
}

impl RecordingSurface {
    pub fn reply_content(&self, script: &str, content: &str) {
        let encoded = serde_json::to_string(content).unwrap();
        self.replies.borrow_mut().insert(script.to_string(), encoded);
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.borrow().clone()
    }

    pub fn calls_to(&self, function: &str) -> Vec<String> {
        let prefix = format!("{}(", function);
        self.scripts
            .borrow()
            .iter()
            .filter(|s| s.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.scripts.borrow_mut().clear();
    }
}

impl Surface for RecordingSurface {
    fn evaluate(&self, script: String) -> ScriptFuture {
        let reply = self
            .replies
            .borrow()
            .get(&script)
            .cloned()
            .unwrap_or_else(|| "null".to_string());
        self.scripts.borrow_mut().push(script);
        let gate = self.reply_gate.borrow_mut().take();
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(reply)
        })
    }
}

/// Scripted answers for prompts and dialogs, plus a record of everything shown.
/// Prompts with no scripted answer are cancelled.
#[derive(Default)]
pub struct FakeUi {
    pub choices: RefCell<VecDeque<SaveChoice>>,
    pub save_paths: RefCell<VecDeque<Option<PathBuf>>>,
    pub open_paths: RefCell<VecDeque<Option<PathBuf>>>,
    pub prompts: RefCell<Vec<String>>,
    pub save_requests: RefCell<Vec<SavePathRequest>>,
    pub open_requests: RefCell<Vec<Option<PathBuf>>>,
    pub warnings: RefCell<Vec<(String, String)>>,
    pub clipboard: RefCell<Vec<String>>,
    pub revealed: RefCell<Vec<PathBuf>>,
    /// When set, the next `confirm_save` waits for this before answering.
    pub prompt_gate: RefCell<Option<oneshot::Receiver<()>>>,
}

impl FakeUi {
    pub fn answer(&self, choice: SaveChoice) {
        self.choices.borrow_mut().push_back(choice);
    }

    pub fn save_to(&self, path: Option<PathBuf>) {
        self.save_paths.borrow_mut().push_back(path);
    }
}

#[async_trait::async_trait(?Send)]
impl HostUi for FakeUi {
    async fn confirm_save(&self, file_name: &str) -> SaveChoice {
        self.prompts.borrow_mut().push(file_name.to_string());
        let gate = self.prompt_gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.choices
            .borrow_mut()
            .pop_front()
            .unwrap_or(SaveChoice::Cancel)
    }

    async fn choose_save_path(&self, request: &SavePathRequest) -> Option<PathBuf> {
        self.save_requests.borrow_mut().push(request.clone());
        self.save_paths.borrow_mut().pop_front().flatten()
    }

    async fn choose_open_path(&self, initial_dir: Option<&Path>) -> Option<PathBuf> {
        self.open_requests
            .borrow_mut()
            .push(initial_dir.map(Path::to_path_buf));
        self.open_paths.borrow_mut().pop_front().flatten()
    }

    fn warn(&self, title: &str, message: &str) {
        self.warnings
            .borrow_mut()
            .push((title.to_string(), message.to_string()));
    }

    fn copy_to_clipboard(&self, text: &str) {
        self.clipboard.borrow_mut().push(text.to_string());
    }

    fn reveal_in_folder(&self, path: &Path) {
        self.revealed.borrow_mut().push(path.to_path_buf());
    }
}

pub struct FakeCaret {
    result: InsertResult,
    pub inserted: RefCell<Vec<String>>,
}

impl FakeCaret {
    pub fn new(result: InsertResult) -> Self {
        Self {
            result,
            inserted: RefCell::new(Vec::new()),
        }
    }
}

impl CaretEditor for FakeCaret {
    fn insert_text_at_caret(&self, text: &str) -> InsertResult {
        self.inserted.borrow_mut().push(text.to_string());
        self.result.clone()
    }
}
