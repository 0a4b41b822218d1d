//! 流水线分派：按分类标签的计划依次运行子流水线
//!
//! 子流水线之间没有数据依赖，hybrid 也按固定顺序（结构化查询 → 洞察）串行执行。
//! 结构化查询的提取失败与执行失败都记录在结果条目里，不会中断后续子流水线；
//! 只有补全服务失败会终止计划，已产出的条目随失败一起返回。

use std::sync::Arc;
use std::time::Duration;

use super::extract::extract_fenced_query;
use super::prompts::{insight_prompt, sql_prompt, ANALYST_ROLE, INSIGHTS_ROLE};
use super::types::{AnalyticalResult, ClassificationLabel, InsightResult, ResultEntry, SubPipeline};
use crate::context::ContextMap;
use crate::data::{QueryExecutor, SchemaCatalog};
use crate::llm::{complete_with_deadline, CompletionGateway, LlmError};

/// 分派结果：已完成的条目 + 导致提前终止的补全错误（若有）
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub results: Vec<ResultEntry>,
    pub failure: Option<LlmError>,
}

pub struct PipelineDispatcher {
    gateway: Arc<dyn CompletionGateway>,
    executor: Arc<dyn QueryExecutor>,
    catalog: Arc<SchemaCatalog>,
    deadline: Duration,
}

impl PipelineDispatcher {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        executor: Arc<dyn QueryExecutor>,
        catalog: Arc<SchemaCatalog>,
        deadline: Duration,
    ) -> Self {
        Self {
            gateway,
            executor,
            catalog,
            deadline,
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub async fn dispatch(
        &self,
        label: ClassificationLabel,
        question: &str,
        context: &ContextMap,
    ) -> DispatchOutcome {
        let mut results = Vec::with_capacity(label.plan().len());
        for step in label.plan() {
            let entry = match step {
                SubPipeline::StructuredQuery => self
                    .run_structured_query(question, context)
                    .await
                    .map(ResultEntry::Analytical),
                SubPipeline::Insight => self
                    .run_insight(question, context)
                    .await
                    .map(ResultEntry::Insight),
            };
            match entry {
                Ok(entry) => results.push(entry),
                Err(e) => {
                    tracing::warn!(
                        label = %label,
                        completed = results.len(),
                        "dispatch stopped: {}",
                        e
                    );
                    return DispatchOutcome {
                        results,
                        failure: Some(e),
                    };
                }
            }
        }
        DispatchOutcome {
            results,
            failure: None,
        }
    }

    /// 结构化查询：生成 → 提取 → 执行
    pub async fn run_structured_query(
        &self,
        question: &str,
        context: &ContextMap,
    ) -> Result<AnalyticalResult, LlmError> {
        let prompt = sql_prompt(question, context, &self.catalog);
        let raw =
            complete_with_deadline(self.gateway.as_ref(), &prompt, ANALYST_ROLE, self.deadline)
                .await?;

        let Some(query) = extract_fenced_query(&raw) else {
            tracing::info!("no fenced query in analyst completion");
            return Ok(AnalyticalResult::no_query(raw));
        };

        let outcome = self.executor.execute(&query).await;
        if let Err(e) = &outcome {
            tracing::info!(query = %query, "query execution failed: {}", e);
        }
        Ok(AnalyticalResult::executed(raw, query, outcome))
    }

    pub async fn run_insight(
        &self,
        question: &str,
        context: &ContextMap,
    ) -> Result<InsightResult, LlmError> {
        let prompt = insight_prompt(question, context);
        let analysis_text =
            complete_with_deadline(self.gateway.as_ref(), &prompt, INSIGHTS_ROLE, self.deadline)
                .await?;
        Ok(InsightResult { analysis_text })
    }
}
