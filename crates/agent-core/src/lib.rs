//! # agent-core
//!
//! Decide/act loop for a tool-using conversational agent, with versioned
//! session checkpoints and a live event stream per turn.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      LoopController                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐   │
//! │  │  Reasoning   │  │     Turn     │  │    Checkpoint     │   │
//! │  │   Engine     │──│   Executor   │──│      Store        │   │
//! │  └──────────────┘  └──────┬───────┘  └───────────────────┘   │
//! │         │                 │                                  │
//! │  ┌──────┴───────┐  ┌──────┴───────┐  ┌───────────────────┐   │
//! │  │ LlmProvider  │  │ ToolRegistry │  │   EventStream     │   │
//! │  │  (Strategy)  │  │              │  │                   │   │
//! │  └──────────────┘  └──────────────┘  └───────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ReasoningEngine` trait keeps the loop independent of any model.
//! [`PromptedReasoner`] adapts any plain-text `LlmProvider` to it.

pub mod checkpoint;
pub mod controller;
pub mod error;
pub mod event;
pub mod executor;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod tool;

pub use checkpoint::{
    Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, SessionId,
};
pub use controller::{
    AgentConfig, LoopController, LoopControllerBuilder, TurnOutcome, TurnResult, TurnState,
};
pub use error::{AgentError, Result};
pub use event::{EventStream, EventSubscription, TurnEvent, TurnKey};
pub use executor::TurnExecutor;
pub use message::{Conversation, Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{Decision, PromptedReasoner, ReasoningEngine};
pub use tool::{ParameterSchema, Tool, ToolInvocation, ToolRegistry, ToolResult, ToolSchema};
