//! Server Configuration
//!
//! Everything comes from environment variables (optionally via `.env`).

use std::path::PathBuf;
use std::time::Duration;

use agent_core::{AgentConfig, AgentError, Result};
use agent_runtime::OllamaConfig;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    pub ollama: OllamaConfig,

    pub agent: AgentConfig,

    /// Directory for file checkpoints; in-memory sessions when unset
    pub checkpoint_dir: Option<PathBuf>,

    /// Replaces the reasoner's default system prompt
    pub system_prompt: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = AgentConfig::default();

        let agent = AgentConfig {
            max_iterations: parse(&lookup, "MAX_ITERATIONS")?.unwrap_or(defaults.max_iterations),
            decide_timeout: parse(&lookup, "DECIDE_TIMEOUT_SECS")?
                .map_or(defaults.decide_timeout, Duration::from_secs),
            tool_timeout: parse(&lookup, "TOOL_TIMEOUT_SECS")?
                .map_or(defaults.tool_timeout, Duration::from_secs),
        };
        if agent.max_iterations == 0 {
            return Err(AgentError::Config("MAX_ITERATIONS must be at least 1".into()));
        }

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            ollama: OllamaConfig::from_lookup(&lookup),
            agent,
            checkpoint_dir: lookup("CHECKPOINT_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            system_prompt: lookup("AGENT_SYSTEM_PROMPT").filter(|p| !p.trim().is_empty()),
        })
    }
}

/// Unset is `None`; set but unparsable is an error
fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| AgentError::Config(format!("{key} has an invalid value: {raw:?}")))
        })
        .transpose()
}
