//! Orchestrator 构建器：统一的初始化逻辑
//!
//! CLI 与 Web 入口共用：数据源 → schema 目录 → 执行器 → 上下文存储 → 补全网关。

use std::sync::Arc;
use std::time::Duration;

use super::error::OrchestratorError;
use super::orchestrator::Orchestrator;
use crate::config::AppConfig;
use crate::context::{create_context_store, ContextStore};
use crate::data::SurveyDataSource;
use crate::llm::{
    create_deepseek_client, deepseek_api_key, CompletionGateway, MockLlmClient, OpenAiClient,
    DEEPSEEK_CHAT,
};
use crate::pipeline::{ClassificationRouter, PipelineDispatcher};

/// 根据配置与环境变量选择补全后端
///
/// provider = mock 时总是 Mock；否则有 DeepSeek Key（或 provider = deepseek 且有 OpenAI Key）
/// 走 DeepSeek，有 OpenAI Key 走 OpenAI 兼容端点，都没有时退回 Mock。
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn CompletionGateway> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient::new());
    }

    let deepseek_key = deepseek_api_key()
        .filter(|_| std::env::var("DEEPSEEK_API_KEY").is_ok() || provider == "deepseek");
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if let Some(api_key) = deepseek_key {
        let model = cfg.llm.deepseek.model.as_deref().unwrap_or(DEEPSEEK_CHAT);
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(model, &api_key))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

/// 构建器：默认全部从配置创建，测试可注入网关或存储
pub struct OrchestratorBuilder {
    config: AppConfig,
    gateway: Option<Arc<dyn CompletionGateway>>,
    store: Option<Arc<dyn ContextStore>>,
}

impl OrchestratorBuilder {
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            config,
            gateway: None,
            store: None,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn CompletionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 构建；数据目录中没有任何关系时失败（不带空目录启动）
    pub async fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let cfg = self.config;

        let source = SurveyDataSource::open(&cfg.data).await?;
        let catalog = Arc::new(source.catalog().clone());
        let executor = source.executor(&cfg.query).into_shared();

        let store = match self.store {
            Some(store) => store,
            None => create_context_store(&cfg.context).await?,
        };
        let gateway = self
            .gateway
            .unwrap_or_else(|| create_llm_from_config(&cfg));
        let deadline = Duration::from_secs(cfg.llm.timeouts.request);

        tracing::info!(
            relations = catalog.describe().len(),
            history_in_prompt = cfg.context.history_in_prompt,
            "orchestrator ready"
        );

        Ok(Orchestrator::new(
            ClassificationRouter::new(gateway.clone(), deadline),
            PipelineDispatcher::new(gateway, executor, catalog, deadline),
            store,
            cfg.context.history_in_prompt,
        ))
    }
}
