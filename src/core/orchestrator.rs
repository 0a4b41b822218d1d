//! 编排入口：一次 answer 调用 = 读上下文 → 分类 → 分派 → 记录交互
//!
//! Orchestrator 本身无跨调用的可变状态，所有跨调用状态都在 ContextStore 中；
//! 因此可在多个任务中并发调用（同一 thread_id 的读写由存储层串行化）。

use std::sync::Arc;

use super::error::OrchestratorError;
use crate::context::{ContextMap, ContextStore, MergedContext};
use crate::data::SchemaCatalog;
use crate::pipeline::{AggregateResponse, ClassificationRouter, PipelineDispatcher};

/// 同时提供 user_id 与 thread_id 时才启用上下文读写
fn scope<'a>(user_id: Option<&'a str>, thread_id: Option<&'a str>) -> Option<(&'a str, &'a str)> {
    match (user_id, thread_id) {
        (Some(u), Some(t)) => Some((u, t)),
        _ => None,
    }
}

pub struct Orchestrator {
    router: ClassificationRouter,
    dispatcher: PipelineDispatcher,
    store: Arc<dyn ContextStore>,
    history_in_prompt: usize,
}

impl Orchestrator {
    pub fn new(
        router: ClassificationRouter,
        dispatcher: PipelineDispatcher,
        store: Arc<dyn ContextStore>,
        history_in_prompt: usize,
    ) -> Self {
        Self {
            router,
            dispatcher,
            store,
            history_in_prompt,
        }
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        self.dispatcher.catalog()
    }

    /// 回答一个问题
    ///
    /// - 分类阶段补全失败：整体返回 [`OrchestratorError::Transport`]
    /// - 分派阶段补全失败：返回已完成的条目，`incomplete` 记录原因（交互照常记录）
    /// - 存储读写失败：整体返回 [`OrchestratorError::StoreUnavailable`]，不带着过期上下文继续
    pub async fn answer(
        &self,
        question: &str,
        base: ContextMap,
        user_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> Result<AggregateResponse, OrchestratorError> {
        let scoped = scope(user_id, thread_id);

        let merged = match scoped {
            Some((user_id, thread_id)) => self.store.get_merged(user_id, thread_id).await?,
            None => MergedContext::default(),
        };
        let context = merged.into_request_context(base, self.history_in_prompt);

        let classification = self.router.classify(question, &context).await?;

        let outcome = self
            .dispatcher
            .dispatch(classification.label, question, &context)
            .await;

        let response = AggregateResponse {
            classification: classification.label,
            classification_text: classification.completion,
            results: outcome.results,
            incomplete: outcome.failure.map(|e| e.to_string()),
        };

        if let Some((user_id, thread_id)) = scoped {
            let serialized = serde_json::to_string(&response)
                .map_err(crate::context::StoreError::from)?;
            self.store
                .record_interaction(user_id, thread_id, question, &serialized)
                .await?;
        }

        tracing::info!(
            classification = %response.classification,
            entries = response.results.len(),
            incomplete = response.incomplete.is_some(),
            "question answered"
        );
        Ok(response)
    }
}
