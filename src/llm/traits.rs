//! 补全网关抽象
//!
//! 分类、SQL 生成、洞察生成都只依赖 CompletionGateway::complete(prompt, role)，
//! 具体后端（OpenAI 兼容 / DeepSeek / Mock）可插拔。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// 补全服务错误：传输失败、超时、接口返回错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Completion transport error: {0}")]
    Transport(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion API error: {0}")]
    Api(String),
}

/// 补全网关：给定任务描述与角色，返回原始文本
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// 非流式完成；可能挂起，失败时返回传输错误（核心层不重试）
    async fn complete(&self, prompt: &str, role: &str) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 带截止时间的补全调用：超时视为网关失败，不允许无限期挂起
pub async fn complete_with_deadline(
    gateway: &dyn CompletionGateway,
    prompt: &str,
    role: &str,
    deadline: Duration,
) -> Result<String, LlmError> {
    let started = std::time::Instant::now();
    let result = match tokio::time::timeout(deadline, gateway.complete(prompt, role)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(deadline)),
    };
    match &result {
        Ok(text) => tracing::debug!(
            role,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "completion finished"
        ),
        Err(e) => tracing::warn!(role, "completion failed: {}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGateway(Duration);

    #[async_trait]
    impl CompletionGateway for SlowGateway {
        async fn complete(&self, _prompt: &str, _role: &str) -> Result<String, LlmError> {
            tokio::time::sleep(self.0).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn test_deadline_elapsed_is_timeout() {
        let gateway = SlowGateway(Duration::from_secs(5));
        let deadline = Duration::from_millis(20);
        let err = complete_with_deadline(&gateway, "p", "r", deadline)
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Timeout(deadline));
    }

    #[tokio::test]
    async fn test_within_deadline_passes_text_through() {
        let gateway = SlowGateway(Duration::from_millis(1));
        let text = complete_with_deadline(&gateway, "p", "r", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(text, "late");
    }
}
