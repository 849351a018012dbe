//! Pushing the active document into an external editor.

use std::rc::Rc;

use markpad_editor::bridge::MessageBridge;
use markpad_editor::protocol::SurfaceQuery;

use crate::ui::HostUi;

/// What the external editor reports back after an insertion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertResult {
    pub success: bool,
    pub error_message: Option<String>,
}

impl InsertResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// An editor that can take text at its caret.
pub trait CaretEditor {
    fn insert_text_at_caret(&self, text: &str) -> InsertResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    NoContent,
    Failed(String),
}

pub struct InsertionAdapter {
    editor: Rc<dyn CaretEditor>,
}

impl InsertionAdapter {
    pub fn new(editor: Rc<dyn CaretEditor>) -> Self {
        Self { editor }
    }

    /// Fetch the active document from the surface and hand it to the editor.
    /// A failure is shown to the user with the editor's own message.
    pub async fn insert_active_content(
        &self,
        bridge: &MessageBridge,
        ui: &dyn HostUi,
    ) -> InsertOutcome {
        let Some(content) = bridge.invoke_for_result(&SurfaceQuery::EditorContent).await else {
            log::debug!("No editor content to insert");
            return InsertOutcome::NoContent;
        };

        let result = self.editor.insert_text_at_caret(&content);
        if result.success {
            return InsertOutcome::Inserted;
        }
        let message = result
            .error_message
            .unwrap_or_else(|| "unknown error".to_string());
        ui.warn("Insert Failed", &format!("Could not insert text: {}", message));
        InsertOutcome::Failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run_local, FakeCaret, FakeUi, RecordingSurface};

    fn ready_bridge(surface: &Rc<RecordingSurface>) -> MessageBridge {
        let bridge = MessageBridge::new(surface.clone());
        bridge.set_ready(true);
        bridge
    }

    #[tokio::test]
    async fn inserts_active_content() {
        run_local(async {
            let surface = Rc::new(RecordingSurface::default());
            surface.reply_content("getEditorContent()", "# Notes\nbody");
            let caret = Rc::new(FakeCaret::new(InsertResult::succeeded()));
            let ui = FakeUi::default();

            let adapter = InsertionAdapter::new(caret.clone());
            let outcome = adapter
                .insert_active_content(&ready_bridge(&surface), &ui)
                .await;

            assert_eq!(outcome, InsertOutcome::Inserted);
            assert_eq!(*caret.inserted.borrow(), vec!["# Notes\nbody".to_string()]);
            assert!(ui.warnings.borrow().is_empty());
        })
        .await;
    }

    #[tokio::test]
    async fn failure_message_is_shown_verbatim() {
        run_local(async {
            let surface = Rc::new(RecordingSurface::default());
            surface.reply_content("getEditorContent()", "text");
            let caret = Rc::new(FakeCaret::new(InsertResult::failed(
                "No document is open in the editor",
            )));
            let ui = FakeUi::default();

            let outcome = InsertionAdapter::new(caret)
                .insert_active_content(&ready_bridge(&surface), &ui)
                .await;

            assert_eq!(
                outcome,
                InsertOutcome::Failed("No document is open in the editor".to_string())
            );
            let warnings = ui.warnings.borrow();
            assert_eq!(warnings.len(), 1);
            assert_eq!(
                warnings[0].1,
                "Could not insert text: No document is open in the editor"
            );
        })
        .await;
    }

    #[tokio::test]
    async fn nothing_happens_without_content() {
        run_local(async {
            let surface = Rc::new(RecordingSurface::default());
            let caret = Rc::new(FakeCaret::new(InsertResult::succeeded()));
            let ui = FakeUi::default();

            let outcome = InsertionAdapter::new(caret.clone())
                .insert_active_content(&ready_bridge(&surface), &ui)
                .await;

            assert_eq!(outcome, InsertOutcome::NoContent);
            assert!(caret.inserted.borrow().is_empty());
            assert!(ui.warnings.borrow().is_empty());
        })
        .await;
    }
}
