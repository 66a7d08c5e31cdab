//! # agent-tools
//!
//! Built-in capabilities for the agent loop.
//!
//! | Tool             | Arguments                          | Side effects |
//! |------------------|------------------------------------|--------------|
//! | `calculator`     | `expr`                             | no           |
//! | `task_list`      | `action`, `title?`, `id?`          | yes          |
//! | `weather_lookup` | `location`, `units?`               | no           |
//! | `datetime`       | `format?`                          | no           |
//!
//! Failures are reported as [`ToolError`]s, which reach the loop as
//! invocation errors and are fed back to the reasoning engine.

pub mod calculator;
pub mod datetime;
pub mod error;
pub mod task_list;
pub mod weather;

use std::sync::Arc;

pub use calculator::CalculatorTool;
pub use datetime::DateTimeTool;
pub use error::ToolError;
pub use task_list::TaskListTool;
pub use weather::{MockWeatherSource, WeatherLookupTool, WeatherSource};

use agent_core::ToolRegistry;

/// Registry with every built-in tool, weather served by the mock source
pub fn default_registry() -> agent_core::Result<ToolRegistry> {
    registry_with_weather(Arc::new(MockWeatherSource::new()))
}

/// Registry with every built-in tool and a caller-supplied weather source
pub fn registry_with_weather(source: Arc<dyn WeatherSource>) -> agent_core::Result<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool)?;
    tools.register(TaskListTool::new())?;
    tools.register(WeatherLookupTool::new(source))?;
    tools.register(DateTimeTool)?;
    Ok(tools)
}
