//! 分类路由：START → CLASSIFIED
//!
//! 一次 `classify` 调用即唯一的状态迁移：向补全网关发送一次分类任务，
//! 按固定优先级解析返回文本，得到的 [`Classification`] 即 CLASSIFIED 状态。
//! 不重试；无法识别的文本按 hybrid 处理（hybrid 覆盖两条子流水线）。

use std::sync::Arc;
use std::time::Duration;

use super::prompts::{router_prompt, ROUTER_ROLE};
use super::types::ClassificationLabel;
use crate::context::ContextMap;
use crate::llm::{complete_with_deadline, CompletionGateway, LlmError};

/// 分类结果：标签 + 原始补全文本（去除首尾空白）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub label: ClassificationLabel,
    pub completion: String,
}

impl Classification {
    pub fn from_completion(completion: &str) -> Self {
        Self {
            label: ClassificationLabel::from_completion(completion),
            completion: completion.trim().to_string(),
        }
    }
}

pub struct ClassificationRouter {
    gateway: Arc<dyn CompletionGateway>,
    deadline: Duration,
}

impl ClassificationRouter {
    pub fn new(gateway: Arc<dyn CompletionGateway>, deadline: Duration) -> Self {
        Self { gateway, deadline }
    }

    /// 分类一个问题；补全服务失败或超时直接返回错误
    pub async fn classify(
        &self,
        question: &str,
        context: &ContextMap,
    ) -> Result<Classification, LlmError> {
        let prompt = router_prompt(question, context);
        let completion =
            complete_with_deadline(self.gateway.as_ref(), &prompt, ROUTER_ROLE, self.deadline)
                .await?;

        let classification = Classification::from_completion(&completion);
        tracing::info!(label = %classification.label, "question classified");
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn router(client: Arc<MockLlmClient>) -> ClassificationRouter {
        ClassificationRouter::new(client, Duration::from_secs(5))
    }

    #[test]
    fn test_classification_keeps_trimmed_completion() {
        let c = Classification::from_completion(" Insight \n");
        assert_eq!(c.label, ClassificationLabel::Insight);
        assert_eq!(c.completion, "Insight");
        let c = Classification::from_completion("analytical, maybe insight");
        assert_eq!(c.label, ClassificationLabel::Analytical);
    }

    #[tokio::test]
    async fn test_classify_with_empty_context() {
        let client = Arc::new(MockLlmClient::with_replies(["analytical"]));
        let c = router(client.clone())
            .classify("What percentage of respondents are female?", &ContextMap::new())
            .await
            .unwrap();
        assert_eq!(c.label, ClassificationLabel::Analytical);
        assert_eq!(c.completion, "analytical");
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].role, ROUTER_ROLE);
        assert!(calls[0].prompt.contains("What percentage of respondents are female?"));
    }

    #[tokio::test]
    async fn test_garbled_completion_is_hybrid() {
        let client = Arc::new(MockLlmClient::with_replies(["I cannot decide ¯\\_(ツ)_/¯"]));
        let c = router(client).classify("q", &ContextMap::new()).await.unwrap();
        assert_eq!(c.label, ClassificationLabel::Hybrid);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let client = Arc::new(MockLlmClient::new());
        client.push_failure(LlmError::Transport("connection refused".into()));
        let err = router(client.clone())
            .classify("q", &ContextMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Transport("connection refused".into()));
        assert_eq!(client.calls().len(), 1);
    }
}
