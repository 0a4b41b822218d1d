//! Survey Insights 命令行入口
//!
//! 问题来自命令行参数；没有参数时逐行读取标准输入。同一次运行的所有问题共享一个线程，
//! 每个回答以一行 JSON（QuestionResponse）输出到标准输出。

use anyhow::Context;
use survey_insights::config::{load_config, AppConfig};
use survey_insights::context::ContextMap;
use survey_insights::{observability, OrchestratorBuilder, QuestionResponse};
use tokio::io::{AsyncBufReadExt, BufReader};

const CLI_USER: &str = "cli";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let orchestrator = OrchestratorBuilder::from_config(cfg)
        .build()
        .await
        .context("Failed to initialise orchestrator")?;

    let thread_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(thread_id = %thread_id, "CLI session started");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut questions = Vec::new();
    if args.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            questions.push(line);
        }
    } else {
        questions = args;
    }

    for question in questions.iter().map(|q| q.trim()).filter(|q| !q.is_empty()) {
        let response = orchestrator
            .answer(question, ContextMap::new(), Some(CLI_USER), Some(&thread_id))
            .await
            .with_context(|| format!("Failed to answer: {}", question))?;
        let output = serde_json::to_string(&QuestionResponse::from(response))
            .context("Failed to serialise response")?;
        println!("{}", output);
    }

    Ok(())
}
