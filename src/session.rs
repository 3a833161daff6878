//! Chat session: at most one streaming answer at a time, progress delivered
//! over a channel.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::AnswerSource;
use crate::config::AssemblerConfig;
use crate::error::{AssemblerError, Result};
use crate::interpreter::ToolActivity;
use crate::message::{new_message_id, ChatMessage};
use crate::stream::{read_stream, StreamBuffer, StreamUpdate};
use crate::toggle::{CollapseReconciler, SharedToggleStore, ToggleStore};
use crate::wire::AgentRequest;

/// Progress of the active answer, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { message_id: String },
    /// `content` is everything accumulated so far, ready for a full re-parse.
    Progress { message_id: String, delta: String, content: String },
    Tool { message_id: String, activity: ToolActivity },
    Finished { message: ChatMessage },
    Failed { message_id: String, error: String },
}

struct ActiveStream {
    message_id: String,
    task: JoinHandle<()>,
}

pub struct ChatSession {
    source: Arc<dyn AnswerSource>,
    config: AssemblerConfig,
    store: SharedToggleStore,
    reconciler: Arc<Mutex<CollapseReconciler>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: Option<ActiveStream>,
}

impl ChatSession {
    pub fn new(
        source: Arc<dyn AnswerSource>,
        config: AssemblerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let store = ToggleStore::new(config.special_language.clone()).shared();
        let reconciler = CollapseReconciler::new(Arc::clone(&store), config.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            source,
            config,
            store,
            reconciler: Arc::new(Mutex::new(reconciler)),
            events: tx,
            active: None,
        };
        (session, rx)
    }

    pub fn toggle_store(&self) -> SharedToggleStore {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }

    /// Start streaming the answer to `request`. Returns the new message id.
    pub fn send(&mut self, request: AgentRequest) -> Result<String> {
        if let Some(active) = self.active.as_ref().filter(|a| !a.task.is_finished()) {
            return Err(AssemblerError::StreamActive(active.message_id.clone()));
        }
        if let Ok(mut reconciler) = self.reconciler.lock() {
            reconciler.cancel();
        }

        let message_id = new_message_id();
        let source = Arc::clone(&self.source);
        let reconciler = Arc::clone(&self.reconciler);
        let events = self.events.clone();
        let id = message_id.clone();

        let task = tokio::spawn(async move {
            let _ = events.send(SessionEvent::Started { message_id: id.clone() });
            let mut buffer = StreamBuffer::new(id.clone());

            let outcome = match source.open(request).await {
                Ok(chunks) => {
                    read_stream(&mut buffer, chunks, |buf, update| {
                        let event = match update {
                            StreamUpdate::Delta(delta) => SessionEvent::Progress {
                                message_id: buf.message_id().to_string(),
                                delta: delta.clone(),
                                content: buf.accumulated_content().to_string(),
                            },
                            StreamUpdate::Tool(activity) => SessionEvent::Tool {
                                message_id: buf.message_id().to_string(),
                                activity: activity.clone(),
                            },
                        };
                        let _ = events.send(event);
                    })
                    .await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    let message = buffer.into_message();
                    if let Ok(mut reconciler) = reconciler.lock() {
                        reconciler.schedule(&message.id, &message.content);
                    }
                    let _ = events.send(SessionEvent::Finished { message });
                }
                Err(e) => {
                    warn!(message_id = %id, error = %e, "answer failed");
                    let _ = events.send(SessionEvent::Failed { message_id: id, error: e.to_string() });
                }
            }
        });

        self.active = Some(ActiveStream { message_id: message_id.clone(), task });
        Ok(message_id)
    }

    /// Tear down the active stream, discarding its partial content.
    ///
    /// Listeners get a `Failed` event for the abandoned message. Returns its
    /// id, if a stream was still running.
    pub fn abandon(&mut self) -> Option<String> {
        let active = self.active.take()?;
        if active.task.is_finished() {
            return None;
        }
        active.task.abort();
        info!(message_id = %active.message_id, "answer stream abandoned");
        let error = AssemblerError::Abandoned(active.message_id.clone());
        let _ = self.events.send(SessionEvent::Failed {
            message_id: active.message_id.clone(),
            error: error.to_string(),
        });
        Some(active.message_id)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedSource;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;

    fn frame(text: &str) -> String {
        format!("data: {}\n\n", serde_json::json!({"type": "text", "data": text}))
    }

    fn fast_config() -> AssemblerConfig {
        AssemblerConfig { collapse_debounce_ms: 10, ..Default::default() }
    }

    async fn drain_until_done(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        while let Some(ev) = rx.recv().await {
            let done = matches!(ev, SessionEvent::Finished { .. } | SessionEvent::Failed { .. });
            seen.push(ev);
            if done {
                break;
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_send_streams_to_finished_message() {
        let wire = frame("```python\nx = 1\n```");
        let source = ScriptedSource::new(vec![wire[..10].to_string(), wire[10..].to_string()]);
        let (mut session, mut rx) = ChatSession::new(Arc::new(source), fast_config());

        let id = session.send(AgentRequest::question("q")).unwrap();
        let events = drain_until_done(&mut rx).await;

        assert_eq!(events[0], SessionEvent::Started { message_id: id.clone() });
        let SessionEvent::Finished { message } = events.last().unwrap() else {
            panic!("expected finished");
        };
        assert_eq!(message.id, id);
        assert_eq!(message.content, "```python\nx = 1\n```");
    }

    #[tokio::test]
    async fn test_finished_message_is_reconciled() {
        let source = ScriptedSource::new(vec![frame("```python\nx\n```")]);
        let (mut session, mut rx) = ChatSession::new(Arc::new(source), fast_config());
        let id = session.send(AgentRequest::question("q")).unwrap();

        // user expands the block while it streams
        session.toggle_store().lock().unwrap().toggle(&format!("{id}-0"));
        drain_until_done(&mut rx).await;
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        let store = session.toggle_store();
        assert!(store.lock().unwrap().is_collapsed(&format!("{id}-0"), "python"));
    }

    struct Stalled;

    impl AnswerSource for Stalled {
        fn open(&self, _request: AgentRequest) -> BoxFuture<'static, Result<crate::client::ChunkStream>> {
            futures_util::future::pending().boxed()
        }
    }

    #[tokio::test]
    async fn test_second_send_rejected_while_streaming() {
        let (mut session, _rx) = ChatSession::new(Arc::new(Stalled), fast_config());
        let first = session.send(AgentRequest::question("a")).unwrap();
        let err = session.send(AgentRequest::question("b")).unwrap_err();
        assert!(matches!(err, AssemblerError::StreamActive(ref id) if *id == first));
        assert!(session.is_streaming());
    }

    #[tokio::test]
    async fn test_abandon_reports_failure() {
        let (mut session, mut rx) = ChatSession::new(Arc::new(Stalled), fast_config());
        let id = session.send(AgentRequest::question("a")).unwrap();
        tokio::task::yield_now().await;
        session.abandon();

        let events = drain_until_done(&mut rx).await;
        let Some(SessionEvent::Failed { message_id, error }) = events.last() else {
            panic!("expected failed");
        };
        assert_eq!(*message_id, id);
        assert_eq!(*error, AssemblerError::Abandoned(id.clone()).to_string());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn test_new_send_cancels_pending_reconciliation() {
        let config = AssemblerConfig { collapse_debounce_ms: 150, ..Default::default() };
        let source = ScriptedSource::new(vec![frame("```python\nx\n```")]);
        let (mut session, mut rx) = ChatSession::new(Arc::new(source), config);

        let first = session.send(AgentRequest::question("a")).unwrap();
        drain_until_done(&mut rx).await;
        while session.is_streaming() {
            tokio::task::yield_now().await;
        }
        let block = format!("{first}-0");
        session.toggle_store().lock().unwrap().toggle(&block);

        let second = session.send(AgentRequest::question("b")).unwrap();
        assert_ne!(first, second);
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;

        assert!(!session.toggle_store().lock().unwrap().is_collapsed(&block, "python"));
        assert!(!session.reconciler.lock().unwrap().was_reconciled(&first));
    }

    #[tokio::test]
    async fn test_abandon_allows_new_send() {
        let (mut session, _rx) = ChatSession::new(Arc::new(Stalled), fast_config());
        let first = session.send(AgentRequest::question("a")).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(session.abandon(), Some(first));
        tokio::task::yield_now().await;
        assert!(session.send(AgentRequest::question("b")).is_ok());
    }

    struct Refused;

    impl AnswerSource for Refused {
        fn open(&self, _request: AgentRequest) -> BoxFuture<'static, Result<crate::client::ChunkStream>> {
            async { Err(AssemblerError::Transport("connection refused".to_string())) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_transport_failure_reported() {
        let (mut session, mut rx) = ChatSession::new(Arc::new(Refused), fast_config());
        let id = session.send(AgentRequest::question("q")).unwrap();
        let events = drain_until_done(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Failed { message_id, .. }) if *message_id == id
        ));
    }
}
