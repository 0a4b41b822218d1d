//! 查询执行器：原样提交 SQL 到列式引擎，结果统一为 JSON 行
//!
//! 引擎报错（语法、类型转换、关系不存在）与超时都是预期结果，包装为 ExecutionError 返回，
//! 不作为进程级错误向上抛出。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use datafusion::execution::context::{SQLOptions, SessionContext};
use serde::Serialize;
use thiserror::Error;

use super::convert::record_batches_to_records;
use super::Record;

/// 执行失败：引擎消息 + 原始查询文本
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
    pub query: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            query: query.into(),
        }
    }
}

/// 查询执行接口
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> Result<Vec<Record>, ExecutionError>;
}

/// DataFusion 执行器：SessionContext 可廉价克隆，并发查询互不干扰
#[derive(Clone)]
pub struct DataFusionExecutor {
    ctx: SessionContext,
    timeout: Duration,
    max_rows: usize,
}

impl DataFusionExecutor {
    pub fn new(ctx: SessionContext, timeout: Duration, max_rows: usize) -> Self {
        Self {
            ctx,
            timeout,
            max_rows,
        }
    }

    pub fn into_shared(self) -> Arc<dyn QueryExecutor> {
        Arc::new(self)
    }

    /// 只读：禁止 DDL / DML / SET 等语句
    fn read_only() -> SQLOptions {
        SQLOptions::new()
            .with_allow_ddl(false)
            .with_allow_dml(false)
            .with_allow_statements(false)
    }

    async fn run(&self, query: &str) -> Result<Vec<Record>, ExecutionError> {
        let df = self
            .ctx
            .sql_with_options(query, Self::read_only())
            .await
            .map_err(|e| ExecutionError::new(e.to_string(), query))?;
        let batches = df
            .collect()
            .await
            .map_err(|e| ExecutionError::new(e.to_string(), query))?;
        let (rows, truncated) = record_batches_to_records(&batches, self.max_rows)
            .map_err(|e| ExecutionError::new(e.to_string(), query))?;
        if truncated {
            tracing::warn!("Query result truncated to {} rows", self.max_rows);
        }
        Ok(rows)
    }
}

/// 超时同样作为 ExecutionError 值返回
async fn within_deadline<F>(
    timeout: Duration,
    query: &str,
    run: F,
) -> Result<Vec<Record>, ExecutionError>
where
    F: std::future::Future<Output = Result<Vec<Record>, ExecutionError>>,
{
    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::new(
            format!("query timed out after {:?}", timeout),
            query,
        )),
    }
}

#[async_trait]
impl QueryExecutor for DataFusionExecutor {
    async fn execute(&self, query: &str) -> Result<Vec<Record>, ExecutionError> {
        let result = within_deadline(self.timeout, query, self.run(query)).await;
        match &result {
            Ok(rows) => tracing::info!(rows = rows.len(), "query executed"),
            Err(e) => tracing::error!("Error executing query: {}\nQuery: {}", e.message, e.query),
        }
        result
    }
}
