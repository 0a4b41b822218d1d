//! 入站接口数据结构：问题请求、响应与追问建议
//!
//! 追问建议不属于编排核心，仅在分类补全文本含 "vague" 时由入口层附加。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ContextMap;
use crate::pipeline::AggregateResponse;

const FOLLOW_UPS: [&str; 3] = [
    "Would you like to know about response rates?",
    "Should we analyze demographic breakdowns?",
    "Would you like to see key findings from specific questions?",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub user_id: String,
    pub thread_id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,
    /// 额外的调用方上下文（与 brand_id / survey_id 同级，键冲突时以显式字段为准）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextMap>,
}

impl QuestionRequest {
    /// 调用方传入的上下文值（优先级高于存储中的合并上下文）
    pub fn base_context(&self) -> ContextMap {
        let mut ctx = self.context.clone().unwrap_or_default();
        if let Some(brand_id) = &self.brand_id {
            ctx.insert("brand_id".to_string(), Value::String(brand_id.clone()));
        }
        if let Some(survey_id) = &self.survey_id {
            ctx.insert("survey_id".to_string(), Value::String(survey_id.clone()));
        }
        ctx
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub response: AggregateResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_suggestions: Option<Vec<String>>,
}

impl From<AggregateResponse> for QuestionResponse {
    fn from(response: AggregateResponse) -> Self {
        let follow_up_suggestions = follow_up_suggestions(&response.classification_text);
        Self {
            response,
            follow_up_suggestions,
        }
    }
}

/// 分类文本含 "vague"（不区分大小写）时返回固定的三条追问
pub fn follow_up_suggestions(classification_text: &str) -> Option<Vec<String>> {
    if classification_text.to_lowercase().contains("vague") {
        Some(FOLLOW_UPS.iter().map(|s| s.to_string()).collect())
    } else {
        None
    }
}
