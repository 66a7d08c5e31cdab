//! Loop Controller
//!
//! Drives one conversational turn through
//! `Loading → Deciding → (Acting)* → Finishing → {Completed, Failed, Capped}`.
//!
//! Invocations of one decision run strictly in the order the reasoning
//! engine returned them, one at a time. Tool failures are fed back as data;
//! adapter and persistence failures end the turn.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore, SessionId};
use crate::error::{AgentError, Result};
use crate::event::{EventStream, TurnEvent, TurnKey};
use crate::executor::TurnExecutor;
use crate::message::{Conversation, Message};
use crate::reasoning::{Decision, ReasoningEngine};
use crate::tool::{Tool, ToolInvocation, ToolRegistry};

/// Loop configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum Deciding → Acting round trips per turn
    pub max_iterations: usize,

    /// Timeout for each reasoning call
    pub decide_timeout: Duration,

    /// Timeout for each tool invocation
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            decide_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// States of a single turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Loading,
    Deciding,
    Acting,
    Finishing,
    Completed,
    Failed,
    Capped,
    Cancelled,
}

/// How a turn ended
#[derive(Debug)]
pub enum TurnOutcome {
    Completed { answer: String },
    Capped { iterations: usize },
    Failed { error: AgentError },
    Cancelled,
}

/// Everything a caller needs to know about a finished turn
#[derive(Debug)]
pub struct TurnResult {
    pub session_id: SessionId,
    /// Id of the turn's event sequence
    pub turn_id: String,
    pub outcome: TurnOutcome,
    /// Every event published during the turn, in order
    pub events: Vec<TurnEvent>,
    /// Checkpoint version after the turn (unchanged if nothing was written)
    pub version: u64,
    /// Completed Deciding → Acting round trips
    pub iterations: usize,
}

impl TurnResult {
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Completed { answer } => Some(answer),
            _ => None,
        }
    }

    pub const fn error(&self) -> Option<&AgentError> {
        match &self.outcome {
            TurnOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub const fn is_completed(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Completed { .. })
    }

    /// Tool invocations dispatched during the turn, in order
    pub fn tool_calls(&self) -> Vec<(&str, &serde_json::Value)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::ToolCallStarted { tool_name, arguments, .. } => {
                    Some((tool_name.as_str(), arguments))
                }
                _ => None,
            })
            .collect()
    }
}

/// The decide/act state machine
pub struct LoopController {
    engine: Arc<dyn ReasoningEngine>,
    executor: TurnExecutor,
    store: Arc<dyn CheckpointStore>,
    events: Arc<EventStream>,
    config: AgentConfig,
}

/// Per-turn bookkeeping: current state and the events emitted so far
struct Turn<'a> {
    key: &'a TurnKey,
    stream: &'a EventStream,
    events: Vec<TurnEvent>,
    state: TurnState,
}

impl<'a> Turn<'a> {
    const fn new(key: &'a TurnKey, stream: &'a EventStream) -> Self {
        Self {
            key,
            stream,
            events: Vec::new(),
            state: TurnState::Loading,
        }
    }

    fn enter(&mut self, next: TurnState) {
        tracing::debug!(from = ?self.state, to = ?next, "Turn transition");
        self.state = next;
    }

    fn emit(&mut self, event: TurnEvent) {
        self.stream.publish(self.key, event.clone());
        self.events.push(event);
    }
}

/// History of the turn plus the boundary of its last completed transition
struct Progress {
    history: Conversation,
    base_version: u64,
    loaded_len: usize,
    committed_len: usize,
    iterations: usize,
}

impl LoopController {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn CheckpointStore>,
        events: Arc<EventStream>,
        config: AgentConfig,
    ) -> Self {
        Self {
            engine,
            executor: TurnExecutor::new(tools, config.tool_timeout),
            store,
            events,
            config,
        }
    }

    pub fn builder() -> LoopControllerBuilder {
        LoopControllerBuilder::new()
    }

    /// Event stream this controller publishes to
    pub fn events(&self) -> &Arc<EventStream> {
        &self.events
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one unobserved turn that cannot be cancelled
    pub async fn run(&self, session_id: SessionId, message: impl Into<String>) -> TurnResult {
        self.run_turn(TurnKey::new(session_id), message, CancellationToken::new())
            .await
    }

    /// Run the turn `key` starting from the user's `message`.
    ///
    /// Events go to subscribers of `key` only; subscribe before calling.
    pub async fn run_turn(
        &self,
        key: TurnKey,
        message: impl Into<String>,
        cancel: CancellationToken,
    ) -> TurnResult {
        let message = message.into();
        let span = tracing::info_span!(
            "turn",
            session_id = %key.session_id,
            turn_id = %key.turn_id
        );
        self.drive(key, message, cancel).instrument(span).await
    }

    async fn drive(&self, key: TurnKey, message: String, cancel: CancellationToken) -> TurnResult {
        let mut turn = Turn::new(&key, &self.events);

        // Loading
        let checkpoint = match self.store.load(&key.session_id).await {
            Ok(checkpoint) => checkpoint,
            Err(error) => {
                tracing::error!(%error, "Failed to load checkpoint");
                let version = 0;
                return Self::failed(turn, error, version, 0);
            }
        };
        let loaded_len = checkpoint.messages.len();
        let mut progress = Progress {
            history: Conversation::from(checkpoint.messages),
            base_version: checkpoint.version,
            loaded_len,
            committed_len: loaded_len,
            iterations: 0,
        };
        if cancel.is_cancelled() {
            return self.cancelled(turn, progress).await;
        }
        progress.history.push(Message::user(message));
        progress.committed_len = progress.history.len();
        tracing::info!(prior_messages = loaded_len, version = progress.base_version, "Turn started");

        let schemas = self.tools().describe();
        let mut seen_ids: HashSet<String> = HashSet::new();

        loop {
            if progress.iterations >= self.config.max_iterations {
                return self.capped(turn, progress).await;
            }

            turn.enter(TurnState::Deciding);
            turn.emit(TurnEvent::DecisionStarted {
                iteration: progress.iterations + 1,
            });

            let decided = tokio::time::timeout(
                self.config.decide_timeout,
                self.engine.decide(progress.history.messages(), &schemas),
            )
            .await;

            if cancel.is_cancelled() {
                return self.cancelled(turn, progress).await;
            }

            let decision = match decided {
                Ok(Ok(decision)) => decision,
                Ok(Err(error)) => return self.abort(turn, progress, error).await,
                Err(_) => {
                    let error = AgentError::AdapterUnavailable(format!(
                        "reasoning engine timed out after {}ms",
                        self.config.decide_timeout.as_millis()
                    ));
                    return self.abort(turn, progress, error).await;
                }
            };

            let calls = match decision {
                Decision::FinalAnswer(text) if !text.trim().is_empty() => {
                    progress.history.push(Message::assistant(text.clone()));
                    return self.finish(turn, progress, text).await;
                }
                Decision::FinalAnswer(_) => {
                    let error = AgentError::AdapterContract(
                        "decision contained neither text nor tool invocations".into(),
                    );
                    return self.abort(turn, progress, error).await;
                }
                Decision::ToolInvocations(calls) => calls,
            };

            if let Err(error) = validate_invocations(&calls, &mut seen_ids) {
                return self.abort(turn, progress, error).await;
            }

            // Acting
            turn.enter(TurnState::Acting);
            progress.history.push(Message::assistant_with_calls(calls.clone()));

            for call in &calls {
                turn.emit(TurnEvent::ToolCallStarted {
                    invocation_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });

                let result = self.executor.execute(call).await;

                if cancel.is_cancelled() {
                    tracing::info!(invocation_id = %call.id, "Discarding tool result of cancelled turn");
                    return self.cancelled(turn, progress).await;
                }

                if let Err(error) = progress.history.push_tool_result(&result) {
                    return self.abort(turn, progress, error).await;
                }
                turn.emit(TurnEvent::ToolCallFinished {
                    invocation_id: result.invocation_id.clone(),
                    success: result.success,
                    payload: result.payload.clone(),
                    reason: result.reason.clone(),
                });
            }

            progress.committed_len = progress.history.len();
            progress.iterations += 1;
        }
    }

    /// Finishing → Completed
    async fn finish(&self, mut turn: Turn<'_>, mut progress: Progress, answer: String) -> TurnResult {
        turn.enter(TurnState::Finishing);
        progress.committed_len = progress.history.len();

        match self.persist(&turn, &progress).await {
            Ok(version) => {
                turn.enter(TurnState::Completed);
                turn.emit(TurnEvent::FinalAnswer { text: answer.clone() });
                tracing::info!(version, iterations = progress.iterations, "Turn completed");
                Self::result(turn, TurnOutcome::Completed { answer }, version, progress.iterations)
            }
            Err(error) => {
                tracing::error!(%error, "Failed to persist completed turn");
                Self::failed(turn, error, progress.base_version, progress.iterations)
            }
        }
    }

    /// Iteration cap reached: keep what was done, stop deciding
    async fn capped(&self, mut turn: Turn<'_>, progress: Progress) -> TurnResult {
        tracing::warn!(max_iterations = self.config.max_iterations, "Iteration cap reached");

        match self.persist(&turn, &progress).await {
            Ok(version) => {
                turn.enter(TurnState::Capped);
                turn.emit(TurnEvent::TurnCapped {
                    iterations: progress.iterations,
                });
                Self::result(
                    turn,
                    TurnOutcome::Capped {
                        iterations: progress.iterations,
                    },
                    version,
                    progress.iterations,
                )
            }
            Err(error) => Self::failed(turn, error, progress.base_version, progress.iterations),
        }
    }

    /// Unrecoverable adapter failure: preserve history up to the last completed transition
    async fn abort(&self, turn: Turn<'_>, progress: Progress, error: AgentError) -> TurnResult {
        tracing::error!(%error, "Turn aborted");

        let version = match self.persist(&turn, &progress).await {
            Ok(version) => version,
            Err(save_error) => {
                tracing::warn!(error = %save_error, "Could not preserve partial history");
                progress.base_version
            }
        };
        Self::failed(turn, error, version, progress.iterations)
    }

    /// Cancelled: no more events, discard anything past the last completed transition
    async fn cancelled(&self, mut turn: Turn<'_>, progress: Progress) -> TurnResult {
        turn.enter(TurnState::Cancelled);
        self.events.close(turn.key);

        let version = match self.persist(&turn, &progress).await {
            Ok(version) => version,
            Err(error) => {
                tracing::warn!(%error, "Could not persist cancelled turn");
                progress.base_version
            }
        };
        tracing::info!(version, "Turn cancelled");
        Self::result(turn, TurnOutcome::Cancelled, version, progress.iterations)
    }

    /// Write history up to `committed_len`, skipping the write when nothing new was committed
    async fn persist(&self, turn: &Turn<'_>, progress: &Progress) -> Result<u64> {
        if progress.committed_len <= progress.loaded_len {
            return Ok(progress.base_version);
        }
        let messages = &progress.history.messages()[..progress.committed_len];
        self.store
            .save(&turn.key.session_id, messages, progress.base_version)
            .await
    }

    fn failed(mut turn: Turn<'_>, error: AgentError, version: u64, iterations: usize) -> TurnResult {
        turn.enter(TurnState::Failed);
        turn.emit(TurnEvent::TurnFailed {
            reason: error.to_string(),
        });
        Self::result(turn, TurnOutcome::Failed { error }, version, iterations)
    }

    fn result(turn: Turn<'_>, outcome: TurnOutcome, version: u64, iterations: usize) -> TurnResult {
        TurnResult {
            session_id: turn.key.session_id.clone(),
            turn_id: turn.key.turn_id.clone(),
            outcome,
            events: turn.events,
            version,
            iterations,
        }
    }
}

/// Ids are opaque but must be present and unique within the turn
fn validate_invocations(calls: &[ToolInvocation], seen: &mut HashSet<String>) -> Result<()> {
    if calls.is_empty() {
        return Err(AgentError::AdapterContract(
            "decision contained neither text nor tool invocations".into(),
        ));
    }
    for call in calls {
        if call.id.is_empty() {
            return Err(AgentError::AdapterContract(format!(
                "invocation of '{}' has no id",
                call.name
            )));
        }
        if !seen.insert(call.id.clone()) {
            return Err(AgentError::AdapterContract(format!(
                "invocation id '{}' used more than once in this turn",
                call.id
            )));
        }
    }
    Ok(())
}

/// Builder for [`LoopController`]
pub struct LoopControllerBuilder {
    engine: Option<Arc<dyn ReasoningEngine>>,
    tools: ToolRegistry,
    shared_tools: Option<Arc<ToolRegistry>>,
    store: Option<Arc<dyn CheckpointStore>>,
    events: Option<Arc<EventStream>>,
    config: AgentConfig,
}

impl Default for LoopControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopControllerBuilder {
    pub fn new() -> Self {
        Self {
            engine: None,
            tools: ToolRegistry::new(),
            shared_tools: None,
            store: None,
            events: None,
            config: AgentConfig::default(),
        }
    }

    pub fn engine(mut self, engine: Arc<dyn ReasoningEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Register one tool; duplicates fail at [`build`](Self::build)
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Result<Self> {
        self.tools.register(tool)?;
        Ok(self)
    }

    /// Use an already built, shared registry
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.shared_tools = Some(tools);
        self
    }

    pub fn store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn events(mut self, events: Arc<EventStream>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub const fn decide_timeout(mut self, timeout: Duration) -> Self {
        self.config.decide_timeout = timeout;
        self
    }

    pub const fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<LoopController> {
        let engine = self
            .engine
            .ok_or_else(|| AgentError::Config("Reasoning engine is required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        let tools = self.shared_tools.unwrap_or_else(|| Arc::new(self.tools));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new()));
        let events = self.events.unwrap_or_default();

        Ok(LoopController::new(engine, tools, store, events, self.config))
    }
}
