//! Mock 补全客户端（用于测试与离线运行，无需 API）
//!
//! 按顺序弹出预置回复；队列为空时按角色给出固定回复，便于本地跑通完整流程。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::roles::{ANALYST_ROLE, ROUTER_ROLE};
use super::{CompletionGateway, LlmError};

/// 一次被记录的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub role: String,
    pub prompt: String,
}

/// Mock 客户端：预置回复队列 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回给定文本
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for reply in replies {
            client.push_reply(reply);
        }
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    /// 下一次调用返回错误
    pub fn push_failure(&self, error: LlmError) {
        lock(&self.replies).push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for_role(&self, role: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.role == role).count()
    }

    fn offline_reply(role: &str) -> String {
        match role {
            ROUTER_ROLE => "hybrid".to_string(),
            ANALYST_ROLE => "```sql\nSELECT COUNT(*) AS total_responses FROM all_responses\n```\n\
                             Counts every recorded question response."
                .to_string(),
            _ => "Offline mode: no completion service is configured, so no narrative \
                  analysis was generated."
                .to_string(),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CompletionGateway for MockLlmClient {
    async fn complete(&self, prompt: &str, role: &str) -> Result<String, LlmError> {
        lock(&self.calls).push(MockCall {
            role: role.to_string(),
            prompt: prompt.to_string(),
        });
        let scripted = lock(&self.replies).pop_front();
        scripted.unwrap_or_else(|| Ok(Self::offline_reply(role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_offline() {
        let client = MockLlmClient::with_replies(["analytical"]);
        assert_eq!(client.complete("q", ROUTER_ROLE).await.unwrap(), "analytical");
        assert_eq!(client.complete("q", ROUTER_ROLE).await.unwrap(), "hybrid");
        assert_eq!(client.calls_for_role(ROUTER_ROLE), 2);
    }

    #[tokio::test]
    async fn test_failure_is_returned_once() {
        let client = MockLlmClient::new();
        client.push_failure(LlmError::Transport("down".into()));
        assert!(client.complete("q", ANALYST_ROLE).await.is_err());
        assert!(client.complete("q", ANALYST_ROLE).await.unwrap().contains("```sql"));
    }

    #[tokio::test]
    async fn test_offline_insight_reply_has_no_query() {
        let client = MockLlmClient::new();
        let reply = client
            .complete("q", crate::llm::roles::INSIGHTS_ROLE)
            .await
            .unwrap();
        assert!(reply.starts_with("Offline mode"));
        assert!(!reply.contains("```"));
    }
}
