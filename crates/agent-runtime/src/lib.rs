//! # agent-runtime
//!
//! Runtime providers for the agent loop.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{OllamaProvider, PromptedReasoner};
//!
//! let provider = Arc::new(OllamaProvider::from_env()?);
//! let engine = PromptedReasoner::new(provider.clone(), provider.default_options());
//! let controller = LoopController::builder()
//!     .engine(Arc::new(engine))
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{
    AgentError, GenerationOptions, LlmProvider, LoopController, PromptedReasoner,
    ReasoningEngine, Result,
};
