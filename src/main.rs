//! Wasp - Rust LLM 工具编排引擎
//!
//! 入口：初始化日志与配置，按 provider 选择 LLM 后端（无 Key 时退回 Mock），
//! 起一个逐行读 stdin 的无界面会话循环，事件打到 stderr 日志、回复打到 stdout。

use std::io::{BufRead, Write as _};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wasp::config::{load_config, AppConfig};
use wasp::core::AgentEvent;
use wasp::llm::{ChatClient, MockChatClient, OpenAiClient};
use wasp::tools::TracingProgressSink;
use wasp::{default_registry, Agent};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
fn create_client_from_config(cfg: &AppConfig) -> Arc<dyn ChatClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "openai" && std::env::var("OPENAI_API_KEY").is_ok() {
        tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible LLM");
        Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, None))
    } else {
        tracing::info!("No API key or provider=mock, using Mock LLM");
        Arc::new(MockChatClient)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let _ = std::fs::create_dir_all("workspace");

    let cfg = load_config(None).context("Failed to load config")?;
    let client = create_client_from_config(&cfg);
    let agent = Agent::new(client, default_registry(&cfg), &cfg)
        .with_progress_sink(Arc::new(TracingProgressSink));

    let (mut state, ctx) = agent.new_session();
    tracing::info!(session_id = %ctx.session_id, "session started");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" {
            break;
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    AgentEvent::ContentDelta { text } => {
                        print!("{}", text);
                        let _ = std::io::stdout().flush();
                    }
                    AgentEvent::ToolCall { tool, invocation_id } => {
                        tracing::info!(tool = %tool, invocation_id = %invocation_id, "tool call");
                    }
                    AgentEvent::ToolResult { tool, ok, preview, .. } => {
                        tracing::info!(tool = %tool, ok, preview = %preview, "tool result");
                    }
                    _ => {}
                }
            }
        });

        let result = agent
            .respond_stream(&mut state, &ctx, input, event_tx, CancellationToken::new())
            .await;
        let _ = printer.await;
        println!();

        if let Err(e) = result {
            tracing::error!(error = %e, "respond failed");
        }
    }

    Ok(())
}
