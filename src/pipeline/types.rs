//! 分类标签、分派计划与结果条目

use serde::{Deserialize, Serialize};

use crate::data::{ExecutionError, Record};

/// 提取失败时写入 execution_error 的固定说明
pub const NO_QUERY_FOUND: &str = "no structured query found";

/// 问题分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationLabel {
    /// 需要 SQL 数据分析
    Analytical,
    /// 需要定性洞察
    Insight,
    /// 两者都需要
    Hybrid,
}

/// 子流水线
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubPipeline {
    StructuredQuery,
    Insight,
}

impl ClassificationLabel {
    /// 按固定优先级解析补全文本：先 analytical，再 insight，都不出现则 hybrid
    pub fn from_completion(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("analytical") {
            ClassificationLabel::Analytical
        } else if lower.contains("insight") {
            ClassificationLabel::Insight
        } else {
            ClassificationLabel::Hybrid
        }
    }

    /// 分派计划；hybrid 固定先结构化查询后洞察
    pub fn plan(&self) -> &'static [SubPipeline] {
        match self {
            ClassificationLabel::Analytical => &[SubPipeline::StructuredQuery],
            ClassificationLabel::Insight => &[SubPipeline::Insight],
            ClassificationLabel::Hybrid => &[SubPipeline::StructuredQuery, SubPipeline::Insight],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationLabel::Analytical => "analytical",
            ClassificationLabel::Insight => "insight",
            ClassificationLabel::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ClassificationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化查询子流水线结果
///
/// 尝试执行后 rows 与 execution_error 恰有一个有值；extracted_query 为空时
/// execution_error 必为 [`NO_QUERY_FOUND`]。字段私有，只能经构造函数创建。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticalResult {
    raw_response_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    extracted_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_error: Option<String>,
}

impl AnalyticalResult {
    /// 生成文本中没有可提取的查询，不执行
    pub fn no_query(raw_response_text: impl Into<String>) -> Self {
        Self {
            raw_response_text: raw_response_text.into(),
            extracted_query: None,
            rows: None,
            execution_error: Some(NO_QUERY_FOUND.to_string()),
        }
    }

    /// 包装执行结果
    pub fn executed(
        raw_response_text: impl Into<String>,
        query: impl Into<String>,
        outcome: Result<Vec<Record>, ExecutionError>,
    ) -> Self {
        let (rows, execution_error) = match outcome {
            Ok(rows) => (Some(rows), None),
            Err(e) => (None, Some(e.message)),
        };
        Self {
            raw_response_text: raw_response_text.into(),
            extracted_query: Some(query.into()),
            rows,
            execution_error,
        }
    }

    pub fn raw_response_text(&self) -> &str {
        &self.raw_response_text
    }

    pub fn extracted_query(&self) -> Option<&str> {
        self.extracted_query.as_deref()
    }

    pub fn rows(&self) -> Option<&[Record]> {
        self.rows.as_deref()
    }

    pub fn execution_error(&self) -> Option<&str> {
        self.execution_error.as_deref()
    }
}

/// 洞察子流水线结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResult {
    pub analysis_text: String,
}

/// 结果条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultEntry {
    Analytical(AnalyticalResult),
    Insight(InsightResult),
}

impl ResultEntry {
    pub fn as_analytical(&self) -> Option<&AnalyticalResult> {
        match self {
            ResultEntry::Analytical(r) => Some(r),
            ResultEntry::Insight(_) => None,
        }
    }

    pub fn as_insight(&self) -> Option<&InsightResult> {
        match self {
            ResultEntry::Insight(r) => Some(r),
            ResultEntry::Analytical(_) => None,
        }
    }
}

/// 单个问题的聚合响应；results 顺序即子流水线执行顺序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub classification: ClassificationLabel,
    /// 分类补全的原始文本（用于追问建议判定）
    pub classification_text: String,
    pub results: Vec<ResultEntry>,
    /// 补全服务失败导致计划提前终止时的说明；已产出的结果保留
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete: Option<String>,
}
