//! Newline-delimited JSON transport for running the host without a window.
//!
//! Outgoing (stdout), one object per line:
//! `{"eval":script}` for calls whose result is unused, `{"eval":script,"id":n}`
//! for round trips, and `warning` / `clipboard` / `reveal` / `insert`
//! notifications from the headless UI.
//!
//! Incoming (stdin): surface events, plus `scriptResult` / `scriptError`
//! messages that complete a round trip by id.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use markpad_editor::bridge::{BridgeError, ScriptFuture, Surface};

use crate::cli::HeadlessOptions;
use crate::insertion::{CaretEditor, InsertResult};
use crate::ui::{HostUi, SaveChoice, SavePathRequest};

/// Sending half of the stdout queue. Sends never block, so messages leave in
/// the order they were queued.
#[derive(Clone)]
pub struct Outbox(mpsc::UnboundedSender<Value>);

impl Outbox {
    pub fn send(&self, message: Value) {
        if self.0.send(message).is_err() {
            log::warn!("stdout writer has stopped, dropping message");
        }
    }
}

pub fn outbox() -> (Outbox, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox(tx), rx)
}

/// Drain `messages` into `writer`, one JSON object per line, until every
/// [`Outbox`] is dropped.
pub async fn write_lines<W: AsyncWrite + Unpin>(
    mut messages: mpsc::UnboundedReceiver<Value>,
    writer: &mut W,
) -> std::io::Result<()> {
    while let Some(message) = messages.recv().await {
        let mut line = message.to_string();
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

type Reply = oneshot::Sender<Result<String, BridgeError>>;

pub struct StdioSurface {
    out: Outbox,
    next_id: Cell<u64>,
    pending: RefCell<HashMap<u64, Reply>>,
    closed: Cell<bool>,
}

impl StdioSurface {
    pub fn new(out: Outbox) -> Self {
        Self {
            out,
            next_id: Cell::new(1),
            pending: RefCell::new(HashMap::new()),
            closed: Cell::new(false),
        }
    }

    /// Complete a round trip if `line` is a `scriptResult` or `scriptError`.
    /// Returns `false` for anything else, which the caller treats as an event.
    pub fn complete(&self, line: &str) -> bool {
        let Ok(message) = serde_json::from_str::<Value>(line) else {
            return false;
        };
        let outcome = match message.get("type").and_then(Value::as_str) {
            // The raw result keeps its JSON encoding; the bridge decodes it.
            Some("scriptResult") => {
                let value = message.pointer("/data/value").cloned().unwrap_or(Value::Null);
                Ok(value.to_string())
            }
            Some("scriptError") => {
                let text = message
                    .pointer("/data/message")
                    .and_then(Value::as_str)
                    .unwrap_or("script error");
                Err(BridgeError::Script(text.to_string()))
            }
            _ => return false,
        };

        let Some(id) = message.pointer("/data/id").and_then(Value::as_u64) else {
            log::warn!("Script completion without an id: {}", line);
            return true;
        };
        let reply = self.pending.borrow_mut().remove(&id);
        match reply {
            Some(reply) => {
                let _ = reply.send(outcome);
            }
            None => log::warn!("Completion for unknown script id {}", id),
        }
        true
    }

    /// Fail every outstanding round trip and refuse new ones.
    pub fn disconnect(&self) {
        self.closed.set(true);
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if !pending.is_empty() {
            log::debug!("Abandoning {} pending script(s)", pending.len());
        }
    }
}

impl Surface for StdioSurface {
    fn evaluate(&self, script: String) -> ScriptFuture {
        if self.closed.get() {
            return Box::pin(async { Err(BridgeError::Disconnected) });
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().insert(id, tx);
        self.out.send(json!({ "eval": script, "id": id }));
        Box::pin(async move { rx.await.unwrap_or(Err(BridgeError::Disconnected)) })
    }

    fn post(&self, script: String) -> ScriptFuture {
        if self.closed.get() {
            return Box::pin(async { Err(BridgeError::Disconnected) });
        }
        self.out.send(json!({ "eval": script }));
        Box::pin(async { Ok("null".to_string()) })
    }
}

pub struct HeadlessUi {
    out: Outbox,
    options: HeadlessOptions,
}

impl HeadlessUi {
    pub fn new(out: Outbox, options: HeadlessOptions) -> Self {
        Self { out, options }
    }
}

#[async_trait::async_trait(?Send)]
impl HostUi for HeadlessUi {
    async fn confirm_save(&self, file_name: &str) -> SaveChoice {
        log::info!(
            "\"{}\" has unsaved changes, answering {:?}",
            file_name,
            self.options.unsaved
        );
        self.options.unsaved
    }

    async fn choose_save_path(&self, request: &SavePathRequest) -> Option<PathBuf> {
        let dir = self.options.save_dir.as_ref()?;
        Some(dir.join(&request.suggested_name))
    }

    async fn choose_open_path(&self, _initial_dir: Option<&Path>) -> Option<PathBuf> {
        log::info!("No open dialog without a window; use openRecentFile instead");
        None
    }

    fn warn(&self, title: &str, message: &str) {
        self.out
            .send(json!({ "warning": { "title": title, "message": message } }));
    }

    fn copy_to_clipboard(&self, text: &str) {
        self.out.send(json!({ "clipboard": text }));
    }

    fn reveal_in_folder(&self, path: &Path) {
        self.out
            .send(json!({ "reveal": path.to_string_lossy() }));
    }
}

/// Caret editor that hands inserted text to whoever reads stdout.
pub struct StdoutCaret {
    out: Outbox,
}

impl StdoutCaret {
    pub fn new(out: Outbox) -> Self {
        Self { out }
    }
}

impl CaretEditor for StdoutCaret {
    fn insert_text_at_caret(&self, text: &str) -> InsertResult {
        self.out.send(json!({ "insert": text }));
        InsertResult::succeeded()
    }
}
