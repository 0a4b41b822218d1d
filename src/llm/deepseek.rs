//! DeepSeek 预设：OpenAI 兼容端点，只换 base URL 与 Key 来源

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// DeepSeek Key：`DEEPSEEK_API_KEY`，没有时借用 `OPENAI_API_KEY`
pub fn deepseek_api_key() -> Option<String> {
    std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
}

pub fn create_deepseek_client(model: &str, api_key: &str) -> OpenAiClient {
    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), model, Some(api_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_keeps_configured_model() {
        let client = create_deepseek_client(DEEPSEEK_CHAT, "sk-test");
        assert_eq!(client.model(), "deepseek-chat");
    }
}
