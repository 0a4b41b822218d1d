//! LLM 层：补全网关抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod roles;
pub mod traits;

pub use deepseek::{create_deepseek_client, deepseek_api_key, DEEPSEEK_CHAT};
pub use mock::{MockCall, MockLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{complete_with_deadline, CompletionGateway, LlmError};
