//! 核心编排层：错误类型、Orchestrator、构建器

pub mod builder;
pub mod error;
pub mod orchestrator;

pub use builder::{create_llm_from_config, OrchestratorBuilder};
pub use error::OrchestratorError;
pub use orchestrator::Orchestrator;
