use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::escape::decode_script_result;
use crate::protocol::{SurfaceCall, SurfaceQuery};

/// Completion of one script evaluation: the raw, still-encoded result.
pub type ScriptFuture = Pin<Box<dyn Future<Output = Result<String, BridgeError>>>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("surface disconnected before replying")]
    Disconnected,
}

/// The rendering surface as seen from the host: something that evaluates
/// script strings and eventually yields their result.
pub trait Surface {
    /// Hand `script` to the surface.
    ///
    /// The script must be dispatched before this returns. Only the result is
    /// awaited through the returned future, so scripts reach the surface in
    /// the order `evaluate` was called.
    fn evaluate(&self, script: String) -> ScriptFuture;

    /// Hand over a script whose result nobody reads. Transports that can
    /// skip the reply override this; the default waits like `evaluate`.
    fn post(&self, script: String) -> ScriptFuture {
        self.evaluate(script)
    }
}

/// Where transit failures of fire-and-forget calls end up.
pub trait ErrorSink {
    fn report(&self, function: &str, error: &BridgeError);
}

pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, function: &str, error: &BridgeError) {
        log::warn!("Surface call {} failed: {}", function, error);
    }
}

/// Host side of the message channel.
///
/// Until [`MessageBridge::set_ready`] is called every call is dropped without
/// error; nothing is queued. Fire-and-forget completions are observed on
/// `tokio::task::spawn_local`, so [`MessageBridge::invoke`] must run inside a
/// `LocalSet`.
pub struct MessageBridge {
    surface: Rc<dyn Surface>,
    ready: Cell<bool>,
    errors: Rc<dyn ErrorSink>,
}

impl MessageBridge {
    pub fn new(surface: Rc<dyn Surface>) -> Self {
        Self {
            surface,
            ready: Cell::new(false),
            errors: Rc::new(LogErrorSink),
        }
    }

    pub fn with_error_sink(mut self, errors: Rc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    /// Send `call` and forget it. Failures go to the error sink.
    pub fn invoke(&self, call: &SurfaceCall) {
        if !self.ready.get() {
            log::debug!("Surface not ready, dropping {}", call.function_name());
            return;
        }
        let pending = self.surface.post(call.to_script());
        let errors = self.errors.clone();
        let function = call.function_name();
        tokio::task::spawn_local(async move {
            if let Err(e) = pending.await {
                errors.report(function, &e);
            }
        });
    }

    /// Evaluate `query` and decode its string result.
    ///
    /// `None` covers every way of not getting a value: surface not ready,
    /// transit failure (reported to the error sink) or a `null` result.
    pub async fn invoke_for_result(&self, query: &SurfaceQuery) -> Option<String> {
        if !self.ready.get() {
            log::debug!("Surface not ready, dropping {}", query.function_name());
            return None;
        }
        match self.surface.evaluate(query.to_script()).await {
            Ok(raw) => decode_script_result(&raw),
            Err(e) => {
                self.errors.report(query.function_name(), &e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedSurface {
        scripts: RefCell<Vec<String>>,
        replies: RefCell<VecDeque<Result<String, BridgeError>>>,
    }

    impl Surface for ScriptedSurface {
        fn evaluate(&self, script: String) -> ScriptFuture {
            self.scripts.borrow_mut().push(script);
            let reply = self
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok("null".to_string()));
            Box::pin(async move { reply })
        }
    }

    #[derive(Default)]
    struct CountingSink {
        reports: RefCell<Vec<String>>,
    }

    impl ErrorSink for CountingSink {
        fn report(&self, function: &str, _error: &BridgeError) {
            self.reports.borrow_mut().push(function.to_string());
        }
    }

    async fn run_local<F: Future>(f: F) -> F::Output {
        tokio::task::LocalSet::new().run_until(f).await
    }

    #[tokio::test]
    async fn calls_before_ready_are_dropped() {
        run_local(async {
            let surface = Rc::new(ScriptedSurface::default());
            let bridge = MessageBridge::new(surface.clone());

            bridge.invoke(&SurfaceCall::AddStartPageTab);
            let content = bridge.invoke_for_result(&SurfaceQuery::EditorContent).await;

            assert_eq!(content, None);
            assert!(surface.scripts.borrow().is_empty());
        })
        .await;
    }

    #[tokio::test]
    async fn invoke_dispatches_in_call_order() {
        run_local(async {
            let surface = Rc::new(ScriptedSurface::default());
            let bridge = MessageBridge::new(surface.clone());
            bridge.set_ready(true);

            bridge.invoke(&SurfaceCall::SetTabDirty {
                id: "t1".to_string(),
                dirty: true,
            });
            bridge.invoke(&SurfaceCall::RemoveTab {
                id: "t1".to_string(),
            });

            assert_eq!(
                *surface.scripts.borrow(),
                vec![
                    "setTabDirty(\"t1\",true)".to_string(),
                    "removeTab(\"t1\")".to_string()
                ]
            );
        })
        .await;
    }

    #[tokio::test]
    async fn transit_failures_go_to_the_sink() {
        run_local(async {
            let surface = Rc::new(ScriptedSurface::default());
            surface
                .replies
                .borrow_mut()
                .push_back(Err(BridgeError::Script("boom".to_string())));
            surface
                .replies
                .borrow_mut()
                .push_back(Err(BridgeError::Disconnected));
            let sink = Rc::new(CountingSink::default());
            let bridge = MessageBridge::new(surface.clone()).with_error_sink(sink.clone());
            bridge.set_ready(true);

            bridge.invoke(&SurfaceCall::ShowAboutDialog);
            let content = bridge
                .invoke_for_result(&SurfaceQuery::TabContent {
                    id: "t1".to_string(),
                })
                .await;
            assert_eq!(content, None);

            // Let the spawned completion observer run.
            tokio::task::yield_now().await;

            let reports = sink.reports.borrow();
            assert_eq!(reports.len(), 2);
            assert!(reports.contains(&"showAboutDialog".to_string()));
            assert!(reports.contains(&"getTabContent".to_string()));
        })
        .await;
    }

    #[tokio::test]
    async fn results_are_unquoted_and_unescaped() {
        run_local(async {
            let surface = Rc::new(ScriptedSurface::default());
            surface
                .replies
                .borrow_mut()
                .push_back(Ok("\"# Notes\\n\\tC:\\\\dir\"".to_string()));
            let bridge = MessageBridge::new(surface.clone());
            bridge.set_ready(true);

            let content = bridge.invoke_for_result(&SurfaceQuery::EditorContent).await;
            assert_eq!(content.as_deref(), Some("# Notes\n\tC:\\dir"));
            assert_eq!(*surface.scripts.borrow(), vec!["getEditorContent()".to_string()]);
        })
        .await;
    }
}
