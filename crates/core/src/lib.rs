pub mod config;
pub mod telemetry;

pub use config::{load_dotenv, Config, LlmConfig, ToolsConfig};
pub use telemetry::init_tracing;
