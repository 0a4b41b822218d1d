//! 上下文数据模型：用户级、线程级、合并视图、交互记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 请求上下文：命名作用域值（数据源过滤条件、标识符等）
pub type ContextMap = serde_json::Map<String, Value>;

/// 合并提示词上下文时写入的最近提问键
pub const RECENT_QUESTIONS_KEY: &str = "recent_questions";

/// 上下文存储错误：唯一的失败模式是存储不可用，调用方应视为可重试
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Context store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Unavailable(format!("corrupt context payload: {}", e))
    }
}

/// 作用域类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// 按用户 ID，跨该用户全部线程
    User,
    /// 按线程 ID，仅限单个对话线程
    Thread,
}

/// 单次交互记录，写入后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub serialized_response: String,
}

/// 用户级上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub data: ContextMap,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// 线程级上下文，持有只追加的交互日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadContext {
    pub thread_id: String,
    /// 首次记录交互时绑定；仅通过 save_scope 创建的线程可能尚未绑定
    pub user_id: Option<String>,
    pub data: ContextMap,
    pub log: Vec<InteractionRecord>,
    pub updated_at: DateTime<Utc>,
}

/// 合并视图：线程级键覆盖用户级同名键；只读、不持久化
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedContext {
    pub values: ContextMap,
    pub log: Vec<InteractionRecord>,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl MergedContext {
    pub fn merge(user: Option<&UserContext>, thread: Option<&ThreadContext>) -> Self {
        let mut values = ContextMap::new();
        if let Some(u) = user {
            for (k, v) in &u.data {
                values.insert(k.clone(), v.clone());
            }
        }
        if let Some(t) = thread {
            for (k, v) in &t.data {
                values.insert(k.clone(), v.clone());
            }
        }
        Self {
            values,
            log: thread.map(|t| t.log.clone()).unwrap_or_default(),
            last_interaction_at: user.and_then(|u| u.last_interaction_at),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.log.is_empty()
    }

    /// 生成提示词用的请求上下文：合并值 → 最近提问 → 调用方传入值（调用方优先）
    pub fn into_request_context(self, base: ContextMap, history_limit: usize) -> ContextMap {
        let mut ctx = self.values;
        if history_limit > 0 && !self.log.is_empty() {
            let skip = self.log.len().saturating_sub(history_limit);
            let recent: Vec<Value> = self
                .log
                .iter()
                .skip(skip)
                .map(|r| Value::String(r.question.clone()))
                .collect();
            ctx.insert(RECENT_QUESTIONS_KEY.to_string(), Value::Array(recent));
        }
        for (k, v) in base {
            ctx.insert(k, v);
        }
        ctx
    }
}
