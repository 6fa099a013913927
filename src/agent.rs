//! Agent 运行时
//!
//! 供任意前端（CLI、HTTP 服务等）调用的无界面编排入口：
//! default_registry 按配置装默认工具箱，Agent 绑定 LLM 客户端、分发器与指令块，
//! new_session 开独立会话，respond / respond_stream 对单条用户输入跑完整编排循环。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::controller::run_controller;
use crate::core::error::AgentError;
use crate::core::events::AgentEvent;
use crate::core::state::{ConversationState, Message};
use crate::llm::traits::ChatClient;
use crate::tools::context::SessionContext;
use crate::tools::dispatcher::ToolDispatcher;
use crate::tools::progress::ProgressSink;
use crate::tools::registry::ToolRegistry;
use crate::tools::{CatTool, EchoTool, LsTool};

/// 内置指令块：每次模型调用注入首位，不进入任何历史，历史消息无法覆盖它
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a general purpose agent with access to specialized tools. \
Select and use the right tools to accomplish the user's task.\n\n\
Before using tools, briefly explain why the tool is appropriate. \
Choose the most efficient tool, chain tools when needed, and stop \
calling tools once you have enough information. After using tools, \
interpret the results in context of the user's question and provide \
a clear, actionable answer. If a tool fails, adapt: retry with fixed \
arguments, choose another tool, or explain the limitation.";

/// 按配置装默认工具箱（echo + 沙箱 cat/ls）
pub fn default_registry(cfg: &AppConfig) -> ToolRegistry {
    let workspace = cfg
        .tools
        .filesystem_root
        .clone()
        .unwrap_or_else(|| "workspace".into());
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    registry.register(CatTool::new(&workspace));
    registry.register(LsTool::new(&workspace));
    registry
}

/// Agent：LLM 客户端 + 工具分发器 + 指令块 + 轮数上限，可多会话共享
pub struct Agent {
    client: Arc<dyn ChatClient>,
    dispatcher: ToolDispatcher,
    system_prompt: String,
    max_rounds: usize,
}

impl Agent {
    pub fn new(client: Arc<dyn ChatClient>, registry: ToolRegistry, cfg: &AppConfig) -> Self {
        let system_prompt = cfg
            .app
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self {
            client,
            dispatcher: ToolDispatcher::new(
                registry,
                std::time::Duration::from_secs(cfg.tools.tool_timeout_secs),
            ),
            system_prompt,
            max_rounds: cfg.agent.max_rounds,
        }
    }

    /// 设置进度 Sink（默认丢弃进度输出）
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.dispatcher = self.dispatcher.with_progress_sink(sink);
        self
    }

    /// 开一个独立会话：空历史 + 随机会话 id；并发会话间无共享可变状态
    pub fn new_session(&self) -> (ConversationState, SessionContext) {
        (ConversationState::new(), SessionContext::random())
    }

    /// 处理单条用户消息：跑编排循环直到最终回复
    pub async fn respond(
        &self,
        state: &mut ConversationState,
        ctx: &SessionContext,
        user_input: &str,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        state.push_visible(Message::user(user_input));
        run_controller(
            self.client.as_ref(),
            &self.dispatcher,
            &self.system_prompt,
            state,
            ctx,
            self.max_rounds,
            None,
            cancel,
        )
        .await
    }

    /// 流式处理单条用户消息：通过 event_tx 推送内容分片与工具调用/结果事件
    pub async fn respond_stream(
        &self,
        state: &mut ConversationState,
        ctx: &SessionContext,
        user_input: &str,
        event_tx: mpsc::UnboundedSender<AgentEvent>,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        state.push_visible(Message::user(user_input));
        run_controller(
            self.client.as_ref(),
            &self.dispatcher,
            &self.system_prompt,
            state,
            ctx,
            self.max_rounds,
            Some(&event_tx),
            cancel,
        )
        .await
    }
}
