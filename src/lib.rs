//! Survey Insights - 问卷数据问答编排
//!
//! 模块划分：
//! - **api**: 入站请求 / 响应结构与追问建议
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **context**: 用户级 + 线程级会话上下文（内存 / SQLite）
//! - **core**: Orchestrator、构建器与错误类型
//! - **data**: Parquet 数据源、schema 目录、SQL 执行
//! - **llm**: 补全网关抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **pipeline**: 分类路由与子流水线分派

pub mod api;
pub mod config;
pub mod context;
pub mod core;
pub mod data;
pub mod llm;
pub mod observability;
pub mod pipeline;

pub use crate::core::{Orchestrator, OrchestratorBuilder, OrchestratorError};
pub use api::{QuestionRequest, QuestionResponse};
pub use pipeline::{AggregateResponse, ClassificationLabel, ResultEntry};
