//! 提示词模板：分类、SQL 生成、洞察生成
//!
//! 每个子任务对应一个角色名（作为 CompletionGateway 的 role 参数）与一段任务描述。

use crate::context::ContextMap;
use crate::data::SchemaCatalog;
pub use crate::llm::roles::{ANALYST_ROLE, INSIGHTS_ROLE, ROUTER_ROLE};

/// 问卷数据的扁平结构说明：每行是一道题的一次作答
const SURVEY_LAYOUT: &str = r#"The survey data is flattened: every row is one answer to one question.
- Response metadata: response_id, user_id (respondent), brand_id, survey_id, timestamp
- Question: question_id, question_type (rating | multiple_choice | open_ended | scale),
  question_text, question_group
- answer: always stored as text
  * rating / scale answers are numeric text; use TRY_CAST before arithmetic
  * multiple_choice and open_ended answers are plain text; never cast them
- scale_min, scale_max: bounds for rating / scale questions (text)
- options: pipe-separated choices for multiple_choice questions
- Demographics: age (text, cast before comparing), gender ('Male' | 'Female' | 'Other',
  case-sensitive), location, income_bracket, education

Guidelines:
- Check question_type before casting answer
- Keep numeric and text answers in separate aggregations
- Handle NULL values explicitly"#;

fn render_context(context: &ContextMap) -> String {
    if context.is_empty() {
        return "{}".to_string();
    }
    serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string())
}

/// 分类任务：要求只返回三个标签之一
pub fn router_prompt(question: &str, context: &ContextMap) -> String {
    format!(
        r#"You are an expert at understanding the intent behind market research questions.
Decide whether answering this question requires:
1. Analytical processing (SQL queries over the survey data)
2. Insight generation (qualitative pattern analysis and recommendations)
3. Both (hybrid)

Question: {question}
Context: {context}

Return ONLY ONE of these exact strings: 'analytical', 'insight', or 'hybrid'"#,
        question = question,
        context = render_context(context),
    )
}

/// SQL 生成任务：附带可查询关系的 schema 快照
pub fn sql_prompt(question: &str, context: &ContextMap, catalog: &SchemaCatalog) -> String {
    format!(
        r#"Generate a SQL query that answers this analytical question.
Question: {question}
Context: {context}

Available relations:
{schema}

{layout}

Return your response in exactly this format:
```sql
YOUR_SQL_QUERY_HERE
```
followed by a brief explanation of what the query does."#,
        question = question,
        context = render_context(context),
        schema = catalog.render_for_prompt(),
        layout = SURVEY_LAYOUT,
    )
}

/// 洞察任务
pub fn insight_prompt(question: &str, context: &ContextMap) -> String {
    format!(
        r#"Analyze this question and provide meaningful insights.
Question: {question}
Context: {context}

Focus on:
- Patterns in the responses, including open-ended feedback themes
- Demographic correlations
- Trends in customer satisfaction
- Actionable recommendations and their implications

Return a detailed analysis with clear insights and recommendations."#,
        question = question,
        context = render_context(context),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ColumnDescriptor, SchemaDescriptor};
    use serde_json::json;

    #[test]
    fn test_router_prompt_with_empty_context() {
        let prompt = router_prompt("What themes are emerging?", &ContextMap::new());
        assert!(prompt.contains("Question: What themes are emerging?"));
        assert!(prompt.contains("Context: {}"));
        assert!(prompt.contains("'analytical', 'insight', or 'hybrid'"));
    }

    #[test]
    fn test_sql_prompt_includes_schema_and_context() {
        let mut descriptor = SchemaDescriptor::new();
        descriptor.insert(
            "all_responses".into(),
            vec![ColumnDescriptor::new("gender", "Utf8")],
        );
        let catalog = SchemaCatalog::new(descriptor);
        let ctx = json!({"brand_id": "TechCorp"}).as_object().cloned().unwrap();

        let prompt = sql_prompt("What percentage of respondents are female?", &ctx, &catalog);
        assert!(prompt.contains("- all_responses(gender Utf8)"));
        assert!(prompt.contains("\"brand_id\": \"TechCorp\""));
        assert!(prompt.contains("```sql"));
    }
}
