//! 编排层错误类型
//!
//! 只有补全传输失败与存储失败会让 answer 调用整体失败；查询提取 / 执行失败以结果条目表达。

use thiserror::Error;

use crate::context::StoreError;
use crate::data::CatalogError;
use crate::llm::LlmError;

/// 调用级错误（Display 文本即调用方可见的描述）
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("{0}")]
    Transport(#[from] LlmError),

    #[error("{0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("{0}")]
    CatalogEmpty(#[from] CatalogError),
}

impl OrchestratorError {
    /// 传输与存储失败可由调用方重试；启动期错误不可
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::Transport(_) => true,
            OrchestratorError::StoreUnavailable(e) => e.is_retryable(),
            OrchestratorError::CatalogEmpty(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(OrchestratorError::from(LlmError::Transport("down".into())).is_retryable());
        assert!(OrchestratorError::from(StoreError::Unavailable("locked".into())).is_retryable());
        let empty = CatalogError::NoRelations {
            dir: "data/parquet".into(),
            extension: ".parquet".into(),
        };
        assert!(!OrchestratorError::from(empty).is_retryable());
    }

    #[test]
    fn test_display_has_no_chain() {
        let e = OrchestratorError::from(StoreError::Unavailable("database is locked".into()));
        assert!(e.to_string().contains("database is locked"));
    }
}
