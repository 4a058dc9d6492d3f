//! Chat orchestrator: the single entry point for one user turn.
//!
//! Each exchange runs on its own worker task; completion comes back to the
//! caller's single-threaded loop as `ChatEvent`s over an mpsc channel. A
//! second submission while one exchange is outstanding is rejected.

use crate::exec::{self, CommandOutcome};
use crate::history::History;
use crate::{evolve, fetch, personality, prompts, Evolution};
use parking_lot::Mutex;
use providers::{adapter, transport, Endpoint};
use shared::{ChatRequest, Config, DataPaths, Role};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Completion messages delivered back to the submitting loop.
#[derive(Debug)]
pub enum ChatEvent {
    /// The assistant's reply text.
    Reply(String),
    /// No reply; optionally a short provider-reported error for display.
    Failed(Option<String>),
    /// One embedded command finished (or was terminated).
    CommandOutput(CommandOutcome),
    /// Local engine startup finished; true when a backend is serving.
    EngineReady(bool),
    /// Pre-flight connection test finished.
    ConnectionTest(bool),
}

/// Clears the single-flight flag when the exchange worker finishes, even
/// if it unwinds; a panicked worker must not reject every later submit.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Run the provider connection test on its own task, reporting the verdict
/// as an event so the submitting loop never waits on network I/O.
pub fn spawn_connection_test(config: Config, tx: UnboundedSender<ChatEvent>) {
    tokio::spawn(async move {
        let ok = providers::test_connection(&config).await;
        let _ = tx.send(ChatEvent::ConnectionTest(ok));
    });
}

pub struct Orchestrator {
    config: Arc<Mutex<Config>>,
    history: Arc<History>,
    paths: DataPaths,
    evolution: Arc<Evolution>,
    in_flight: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(config: Arc<Mutex<Config>>, history: Arc<History>, paths: DataPaths) -> Self {
        Self {
            config,
            history,
            paths,
            evolution: Arc::new(Evolution::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Arc<Mutex<Config>> {
        &self.config
    }

    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Dispatch one exchange. Returns false (and does nothing) when a
    /// request is already in flight.
    ///
    /// The user turn is recorded in history before the worker spawns, so a
    /// completion can never be observed ahead of its own dispatch. The
    /// snapshot formatted into the request is taken before the append: the
    /// current user text travels only as the final user message.
    pub fn submit(&self, request: ChatRequest, tx: UnboundedSender<ChatEvent>) -> bool {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!("chat request rejected, exchange already in flight");
            return false;
        }

        let history_snapshot = self.history.snapshot();
        self.history.append(Role::User, &request.user_text);
        debug!(chars = request.user_text.len(), "dispatching exchange");

        let config = self.config.clone();
        let history = self.history.clone();
        let paths = self.paths.clone();
        let evolution = self.evolution.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            run_exchange(
                config,
                history,
                paths,
                evolution,
                in_flight,
                request,
                history_snapshot,
                tx,
            )
            .await;
        });
        true
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_exchange(
    config: Arc<Mutex<Config>>,
    history: Arc<History>,
    paths: DataPaths,
    evolution: Arc<Evolution>,
    in_flight: Arc<AtomicBool>,
    request: ChatRequest,
    history_snapshot: String,
    tx: UnboundedSender<ChatEvent>,
) {
    let guard = InFlightGuard(in_flight.clone());
    let cfg = config.lock().clone();
    let protocol = cfg.provider.protocol();

    let web_context = match request.web_context {
        Some(context) => Some(context),
        None => fetch::analyze_and_fetch(&request.user_text).await,
    };

    let persona = personality::load(&paths.personality_file());
    let system_prompt = prompts::build_system_prompt(&persona, web_context.as_deref());

    let mut user_prompt = request.user_text.clone();
    if let Some(attachment) = &request.attachment {
        user_prompt.push_str("\n\n[Attached file content]:\n");
        user_prompt.push_str(attachment);
        debug!(chars = attachment.len(), "attachment injected");
    }

    let turns = adapter::parse_history(&history_snapshot);
    let body = adapter::build_request(
        protocol,
        &cfg.model,
        cfg.temperature,
        cfg.max_tokens,
        &system_prompt,
        &user_prompt,
        &turns,
    );

    let raw = match transport::send(&Endpoint::from_config(&cfg), body).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "transport failure");
            String::new()
        }
    };

    let reply = adapter::parse_response(protocol, &raw);
    if reply.is_empty() {
        let detail = adapter::extract_error(&raw);
        if let Some(detail) = &detail {
            warn!(detail = %detail, "provider error");
        }
        drop(guard);
        let _ = tx.send(ChatEvent::Failed(detail));
        return;
    }

    history.append(Role::Assistant, &reply);
    history.trim();
    history.save();
    let _ = tx.send(ChatEvent::Reply(reply.clone()));

    // Embedded commands run after the completion handoff, on this worker.
    for command in exec::extract_commands(&reply) {
        if let Some(outcome) = exec::run_command(&command).await {
            if !outcome.output.is_empty() {
                history.append_command_output(&outcome.output);
            }
            let _ = tx.send(ChatEvent::CommandOutput(outcome));
        }
    }

    drop(guard);

    // Detached; serialized against itself by the guard, never against chat.
    if evolution.try_begin(cfg.use_ssl, in_flight.load(Ordering::SeqCst)) {
        let exchange = history.snapshot();
        let personality_path = paths.personality_file();
        let evolution = evolution.clone();
        tokio::spawn(async move {
            evolve::evolve_once(cfg, personality_path, exchange).await;
            evolution.finish();
        });
    }
}
