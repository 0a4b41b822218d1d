//! 补全角色名：作为 CompletionGateway::complete 的 role 参数（OpenAI 后端下即 system 消息）

pub const ROUTER_ROLE: &str = "Query Router";
pub const ANALYST_ROLE: &str = "Data Analyst";
pub const INSIGHTS_ROLE: &str = "Insights Specialist";
