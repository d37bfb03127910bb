//! Orchestrator for the assistant pipeline
//!
//! Composes the gateway, parser and stores: user input comes in as a
//! command, a prompt goes out to the remote model, the raw response is split
//! into blocks, and a session is persisted. Runs on a dedicated worker
//! thread behind a command/event channel pair; an embedded tokio runtime
//! drives the async gateway call.
//!
//! At most one completion request is in flight at a time. A submission while
//! one is pending is rejected at the handle with `Busy`; the user resubmits
//! once the outcome event arrives. Events sent after the consumer dropped
//! its receiver are discarded silently.

use crate::gateway::{build_prompt, CompletionGateway, ImagePayload};
use crate::markdown::{parse_blocks, Block};
use crate::session::{HistoryStore, Mode, Session, SessionId, SessionStore};
use crate::voice::VoiceSignal;
use crate::{CodevoiceError, Result};
use crossbeam_channel::{bounded, never, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::IntegrationConfig;

/// Commands that can be sent to the orchestrator
#[derive(Debug, Clone)]
pub enum OrchestratorCommand {
    /// Run one mode-specific request through the gateway and persist the
    /// resulting session
    Submit {
        input: String,
        mode: Mode,
        image: Option<ImagePayload>,
        request_id: Uuid,
    },

    /// Ask a free-form question (chat or voice); recorded in history, no
    /// session is created
    Ask { question: String, request_id: Uuid },

    /// Delete one session
    DeleteSession(SessionId),

    /// Remove all sessions
    ClearSessions,

    /// Delete all history records for a user
    ClearHistory(String),

    /// Shutdown the orchestrator
    Shutdown,
}

/// Events emitted by the orchestrator
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// A request was accepted and the gateway call is starting
    Started { request_id: Uuid },

    /// A submission completed and its session was persisted
    Completed {
        session: Session,
        request_id: Uuid,
    },

    /// A free-form question was answered and recorded in history
    Answered {
        question: String,
        response: String,
        request_id: Uuid,
    },

    /// A request failed; nothing was persisted
    Failed {
        error: String,
        request_id: Uuid,
    },

    /// The wake phrase was detected by the voice assistant
    WakeDetected,

    /// A session was deleted
    SessionDeleted(SessionId),

    /// All sessions were removed
    SessionsCleared,

    /// All history records for the user were removed
    HistoryCleared(String),

    /// Orchestrator has shut down
    Shutdown,
}

/// Handle for controlling the orchestrator
pub struct OrchestratorHandle {
    command_tx: Sender<OrchestratorCommand>,
    event_rx: Receiver<OrchestratorEvent>,
    busy: Arc<AtomicBool>,
    store: SessionStore,
    history: HistoryStore,
}

impl OrchestratorHandle {
    /// Submit a mode-specific request. Rejected with `Busy` while another
    /// request is in flight.
    pub fn submit(
        &self,
        input: impl Into<String>,
        mode: Mode,
        image: Option<ImagePayload>,
    ) -> Result<Uuid> {
        let request_id = Uuid::new_v4();
        self.send_request(OrchestratorCommand::Submit {
            input: input.into(),
            mode,
            image,
            request_id,
        })?;
        Ok(request_id)
    }

    /// Ask a free-form question. Rejected with `Busy` while another request
    /// is in flight.
    pub fn ask(&self, question: impl Into<String>) -> Result<Uuid> {
        let request_id = Uuid::new_v4();
        self.send_request(OrchestratorCommand::Ask {
            question: question.into(),
            request_id,
        })?;
        Ok(request_id)
    }

    /// Delete one session
    pub fn delete_session(&self, id: SessionId) -> Result<()> {
        self.send_command(OrchestratorCommand::DeleteSession(id))
    }

    /// Remove all sessions
    pub fn clear_sessions(&self) -> Result<()> {
        self.send_command(OrchestratorCommand::ClearSessions)
    }

    /// Delete all history records for a user
    pub fn clear_history(&self, username: impl Into<String>) -> Result<()> {
        self.send_command(OrchestratorCommand::ClearHistory(username.into()))
    }

    /// Request shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.send_command(OrchestratorCommand::Shutdown)
    }

    /// Try to receive an event without blocking
    pub fn try_recv_event(&self) -> Option<OrchestratorEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get the event receiver for select-style consumption
    pub fn event_receiver(&self) -> Receiver<OrchestratorEvent> {
        self.event_rx.clone()
    }

    /// Whether a completion request is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Current sessions, insertion order
    pub fn sessions(&self) -> Vec<Session> {
        self.store.list()
    }

    /// History for a user, newest first
    pub fn history_for(&self, username: &str) -> Vec<crate::session::HistoryRecord> {
        self.history.list_for(username)
    }

    fn send_request(&self, cmd: OrchestratorCommand) -> Result<()> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(CodevoiceError::Busy(
                "a completion request is already in flight".to_string(),
            ));
        }
        if let Err(e) = self.command_tx.send(cmd) {
            self.busy.store(false, Ordering::SeqCst);
            return Err(CodevoiceError::Channel(format!(
                "failed to send command: {e}"
            )));
        }
        Ok(())
    }

    fn send_command(&self, cmd: OrchestratorCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| CodevoiceError::Channel(format!("failed to send command: {e}")))
    }
}

/// Main orchestrator coordinating gateway, parser and stores
pub struct Orchestrator {
    config: IntegrationConfig,
    gateway: Arc<dyn CompletionGateway>,
    store: SessionStore,
    history: HistoryStore,
    command_rx: Receiver<OrchestratorCommand>,
    event_tx: Sender<OrchestratorEvent>,
    voice_rx: Option<Receiver<VoiceSignal>>,
    busy: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Create an orchestrator over the given gateway and session store
    pub fn new(
        config: IntegrationConfig,
        gateway: Arc<dyn CompletionGateway>,
        store: SessionStore,
    ) -> Result<(Self, OrchestratorHandle)> {
        config.validate()?;

        let (command_tx, command_rx) = bounded(100);
        let (event_tx, event_rx) = bounded(100);
        let busy = Arc::new(AtomicBool::new(false));
        let history = HistoryStore::new();

        let handle = OrchestratorHandle {
            command_tx,
            event_rx,
            busy: Arc::clone(&busy),
            store: store.clone(),
            history: history.clone(),
        };

        let orchestrator = Self {
            config,
            gateway,
            store,
            history,
            command_rx,
            event_tx,
            voice_rx: None,
            busy,
        };

        Ok((orchestrator, handle))
    }

    /// Subscribe to a voice assistant's signal channel. Questions become
    /// free-form asks under the configured username.
    pub fn with_voice(mut self, voice_rx: Receiver<VoiceSignal>) -> Self {
        self.voice_rx = Some(voice_rx);
        self
    }

    /// Start the worker thread. Consumes the orchestrator.
    pub fn start(self) -> Result<JoinHandle<()>> {
        let Self {
            config,
            gateway,
            store,
            history,
            command_rx,
            event_tx,
            voice_rx,
            busy,
        } = self;

        let handle = std::thread::Builder::new()
            .name("orchestrator".to_string())
            .spawn(move || {
                info!("Orchestrator worker starting");

                let runtime = match Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to create tokio runtime: {}", e);
                        let _ = event_tx.send(OrchestratorEvent::Shutdown);
                        return;
                    }
                };

                let mut voice_rx = voice_rx.unwrap_or_else(never);

                loop {
                    crossbeam_channel::select! {
                        recv(command_rx) -> msg => match msg {
                            Ok(OrchestratorCommand::Submit { input, mode, image, request_id }) => {
                                let _ = event_tx.send(OrchestratorEvent::Started { request_id });
                                let result = runtime.block_on(process_submission(
                                    gateway.as_ref(),
                                    &store,
                                    &input,
                                    mode,
                                    image.as_ref(),
                                ));
                                // Clear before publishing the outcome so a
                                // consumer reacting to it can submit at once
                                busy.store(false, Ordering::SeqCst);
                                match result {
                                    Ok(session) => {
                                        history.record(
                                            &config.username,
                                            &session.input_text,
                                            &render_response(&session.blocks),
                                        );
                                        let _ = event_tx.send(OrchestratorEvent::Completed {
                                            session,
                                            request_id,
                                        });
                                    }
                                    Err(e) => {
                                        warn!("Submission failed: {}", e);
                                        let _ = event_tx.send(OrchestratorEvent::Failed {
                                            error: e.user_message(),
                                            request_id,
                                        });
                                    }
                                }
                            }
                            Ok(OrchestratorCommand::Ask { question, request_id }) => {
                                let _ = event_tx.send(OrchestratorEvent::Started { request_id });
                                let result = runtime.block_on(process_question(
                                    gateway.as_ref(),
                                    &history,
                                    &config.username,
                                    &question,
                                ));
                                busy.store(false, Ordering::SeqCst);
                                match result {
                                    Ok(response) => {
                                        let _ = event_tx.send(OrchestratorEvent::Answered {
                                            question,
                                            response,
                                            request_id,
                                        });
                                    }
                                    Err(e) => {
                                        warn!("Question failed: {}", e);
                                        let _ = event_tx.send(OrchestratorEvent::Failed {
                                            error: e.user_message(),
                                            request_id,
                                        });
                                    }
                                }
                            }
                            Ok(OrchestratorCommand::DeleteSession(id)) => {
                                if store.delete(id) {
                                    let _ = event_tx.send(OrchestratorEvent::SessionDeleted(id));
                                } else {
                                    debug!("Delete for unknown session {}", id);
                                }
                            }
                            Ok(OrchestratorCommand::ClearSessions) => {
                                store.clear();
                                let _ = event_tx.send(OrchestratorEvent::SessionsCleared);
                            }
                            Ok(OrchestratorCommand::ClearHistory(username)) => {
                                history.clear_user(&username);
                                let _ = event_tx.send(OrchestratorEvent::HistoryCleared(username));
                            }
                            Ok(OrchestratorCommand::Shutdown) => {
                                info!("Orchestrator shutdown requested");
                                let _ = event_tx.send(OrchestratorEvent::Shutdown);
                                break;
                            }
                            Err(_) => {
                                warn!("Command channel disconnected");
                                break;
                            }
                        },
                        recv(voice_rx) -> sig => match sig {
                            Ok(VoiceSignal::Wake) => {
                                let _ = event_tx.send(OrchestratorEvent::WakeDetected);
                            }
                            Ok(VoiceSignal::Question(question)) => {
                                let request_id = Uuid::new_v4();
                                let _ = event_tx.send(OrchestratorEvent::Started { request_id });
                                busy.store(true, Ordering::SeqCst);
                                let result = runtime.block_on(process_question(
                                    gateway.as_ref(),
                                    &history,
                                    &config.username,
                                    &question,
                                ));
                                busy.store(false, Ordering::SeqCst);
                                match result {
                                    Ok(response) => {
                                        let _ = event_tx.send(OrchestratorEvent::Answered {
                                            question,
                                            response,
                                            request_id,
                                        });
                                    }
                                    Err(e) => {
                                        warn!("Voice question failed: {}", e);
                                        let _ = event_tx.send(OrchestratorEvent::Failed {
                                            error: e.user_message(),
                                            request_id,
                                        });
                                    }
                                }
                            }
                            Err(_) => {
                                debug!("Voice channel disconnected");
                                voice_rx = never();
                            }
                        },
                    }
                }

                info!("Orchestrator worker stopped");
            })
            .map_err(|e| CodevoiceError::Channel(format!("failed to spawn worker: {e}")))?;

        Ok(handle)
    }
}

/// Run one submission end-to-end: validate, compose the prompt, call the
/// gateway, parse the response and persist the session.
///
/// A gateway failure persists nothing; the caller surfaces one notice and
/// the user resubmits manually.
pub async fn process_submission(
    gateway: &dyn CompletionGateway,
    store: &SessionStore,
    input: &str,
    mode: Mode,
    image: Option<&ImagePayload>,
) -> Result<Session> {
    validate_input(input, mode, image)?;

    let prompt = build_prompt(mode, input.trim());
    let raw = gateway.generate(&prompt, image).await?;
    let blocks = parse_blocks(&raw);

    let title = Session::default_title(mode, store.len() + 1);
    let session = Session::new(title, input.trim(), mode, blocks);
    store.save(session.clone());
    debug!("Persisted session {} ({})", session.id, session.title);

    Ok(session)
}

/// Answer a free-form question and record the exchange in history
pub async fn process_question(
    gateway: &dyn CompletionGateway,
    history: &HistoryStore,
    username: &str,
    question: &str,
) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(CodevoiceError::InputValidation(
            "question must not be empty".to_string(),
        ));
    }

    let response = gateway.generate(question, None).await?;
    history.record(username, question, &response);
    Ok(response)
}

/// Empty input is rejected before any gateway call, except image-only
/// generation.
fn validate_input(input: &str, mode: Mode, image: Option<&ImagePayload>) -> Result<()> {
    if input.trim().is_empty() && !(mode == Mode::Generate && image.is_some()) {
        return Err(CodevoiceError::InputValidation(
            "input must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Reconstruct the response text from its blocks, re-fencing code
fn render_response(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|b| b.render_markdown())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Gateway fake returning a canned response and counting calls
    struct MockGateway {
        response: Mutex<Result<String>>,
        calls: AtomicUsize,
    }

    impl MockGateway {
        fn returning(text: &str) -> Self {
            Self {
                response: Mutex::new(Ok(text.to_string())),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: Mutex::new(Err(CodevoiceError::Gateway("boom".to_string()))),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionGateway for MockGateway {
        async fn generate(&self, _prompt: &str, _image: Option<&ImagePayload>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.lock().clone()
        }
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_gateway_call() {
        let gateway = MockGateway::returning("unused");
        let store = SessionStore::in_memory();

        let result = process_submission(&gateway, &store, "   ", Mode::Debug, None).await;

        assert!(matches!(result, Err(CodevoiceError::InputValidation(_))));
        assert_eq!(gateway.call_count(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_image_only_generation_is_permitted() {
        let gateway = MockGateway::returning("```py\nprint()\n```");
        let store = SessionStore::in_memory();
        let image = ImagePayload::new("image/png", vec![0u8; 4]);

        let session =
            process_submission(&gateway, &store, "", Mode::Generate, Some(&image))
                .await
                .unwrap();

        assert_eq!(gateway.call_count(), 1);
        assert_eq!(session.blocks, vec![Block::code("py", "print()")]);
    }

    #[tokio::test]
    async fn test_empty_input_with_image_still_rejected_outside_generate() {
        let gateway = MockGateway::returning("unused");
        let store = SessionStore::in_memory();
        let image = ImagePayload::new("image/png", vec![0u8; 4]);

        let result = process_submission(&gateway, &store, "", Mode::Debug, Some(&image)).await;

        assert!(matches!(result, Err(CodevoiceError::InputValidation(_))));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_submission_persists_parsed_session() {
        let gateway = MockGateway::returning("Fixed it:\n```rust\nlet x = 1;\n```");
        let store = SessionStore::in_memory();

        let session = process_submission(&gateway, &store, "let x = 1", Mode::Debug, None)
            .await
            .unwrap();

        assert_eq!(session.title, "Debug Session 1");
        assert_eq!(session.mode, Mode::Debug);
        assert_eq!(session.blocks.len(), 2);
        assert_eq!(store.list(), vec![session]);
    }

    #[tokio::test]
    async fn test_gateway_failure_persists_nothing() {
        let gateway = MockGateway::failing();
        let store = SessionStore::in_memory();

        let result = process_submission(&gateway, &store, "code", Mode::Debug, None).await;

        assert!(matches!(result, Err(CodevoiceError::Gateway(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_question_is_recorded_in_history() {
        let gateway = MockGateway::returning("42");
        let history = HistoryStore::new();

        let response = process_question(&gateway, &history, "alice", "meaning of life?")
            .await
            .unwrap();

        assert_eq!(response, "42");
        let records = history.list_for("alice");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "meaning of life?");
        assert_eq!(records[0].response, "42");
    }

    #[tokio::test]
    async fn test_failed_question_leaves_history_untouched() {
        let gateway = MockGateway::failing();
        let history = HistoryStore::new();

        let result = process_question(&gateway, &history, "alice", "q").await;

        assert!(result.is_err());
        assert!(history.is_empty());
    }

    #[test]
    fn test_session_titles_count_up() {
        let store = SessionStore::in_memory();
        assert_eq!(
            Session::default_title(Mode::Debug, store.len() + 1),
            "Debug Session 1"
        );
    }
}
