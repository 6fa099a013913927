//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / 测试脚本）实现 ChatClient：给定消息与工具目录，
//! 返回分片流。分片按到达序处理；任何 Err 项对本轮都是终止性错误。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

use crate::core::state::Message;

/// 工具目录条目：随每次模型调用下发（OpenAI function calling 格式的来源）
#[derive(Clone, Debug)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// 参数 JSON Schema
    pub parameters: Value,
}

/// 一次工具调用的增量分片，按 position index 归属
///
/// 协议保证：同一 index 的首个分片携带 id 与 name，且二者此后不变；
/// 后续分片只追加 arguments_delta。不同 index 的分片可任意交错。
#[derive(Clone, Debug, Default)]
pub struct InvocationDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_delta: Option<String>,
}

/// 模型回复流的单个分片：内容增量与若干工具调用增量，皆可为空
#[derive(Clone, Debug, Default)]
pub struct StreamFragment {
    pub content_delta: Option<String>,
    pub invocations: Vec<InvocationDelta>,
}

impl StreamFragment {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content_delta: Some(text.into()),
            invocations: Vec::new(),
        }
    }

    /// 某 index 的首个分片（带 id 与 name）
    pub fn invocation_open(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            content_delta: None,
            invocations: vec![InvocationDelta {
                index,
                id: Some(id.into()),
                name: Some(name.into()),
                arguments_delta: None,
            }],
        }
    }

    /// 某 index 的参数文本增量
    pub fn invocation_args(index: u32, delta: impl Into<String>) -> Self {
        Self {
            content_delta: None,
            invocations: vec![InvocationDelta {
                index,
                id: None,
                name: None,
                arguments_delta: Some(delta.into()),
            }],
        }
    }
}

/// 分片流：显式以流结束（None）收尾，Err 项为终止性错误
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamFragment, String>> + Send>>;

/// LLM 客户端 trait：流式对话补全，带完整工具目录
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<FragmentStream, String>;
}
