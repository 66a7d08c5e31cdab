//! Application State

use std::sync::Arc;

use agent_core::{LlmProvider, LoopController};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Decide/act loop shared by every request
    pub controller: Arc<LoopController>,

    /// LLM provider (Ollama, etc.), used for health and model listing
    pub provider: Arc<dyn LlmProvider>,
}
