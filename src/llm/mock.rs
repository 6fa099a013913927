//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! MockChatClient：首轮对最后一条 User 消息发起 echo 工具调用（参数分片下发），
//! 看到工具结果后给出最终回复，便于本地跑通完整编排循环。
//! ScriptedChatClient：按预置脚本逐轮吐分片，并记录每轮收到的消息，供测试断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::core::state::{Message, Role};
use crate::llm::traits::{ChatClient, FragmentStream, StreamFragment, ToolSchema};

/// Mock 客户端：echo 一轮工具调用后收敛到最终回复
#[derive(Debug, Default)]
pub struct MockChatClient;

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat_stream(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<FragmentStream, String> {
        let last = messages.last().ok_or_else(|| "empty messages".to_string())?;

        let fragments: Vec<Result<StreamFragment, String>> = if last.role == Role::Tool {
            // 已有工具结果：给出最终回复，按词分片模拟流式
            let reply = format!("Echoed: {}", last.content);
            reply
                .split_inclusive(' ')
                .map(|chunk| Ok(StreamFragment::content(chunk)))
                .collect()
        } else {
            let input = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.as_str())
                .unwrap_or("(no input)");
            let args = serde_json::json!({ "text": input }).to_string();
            // 切分点必须落在字符边界上（输入可能含多字节字符）
            let split = args
                .char_indices()
                .nth(args.chars().count() / 2)
                .map(|(i, _)| i)
                .unwrap_or(args.len());
            vec![
                Ok(StreamFragment::invocation_open(0, "call_mock_0", "echo")),
                Ok(StreamFragment::invocation_args(0, &args[..split])),
                Ok(StreamFragment::invocation_args(0, &args[split..])),
            ]
        };

        Ok(Box::pin(stream::iter(fragments)))
    }
}

/// 脚本客户端：每次 chat_stream 弹出下一轮分片；脚本耗尽即报错
#[derive(Default)]
pub struct ScriptedChatClient {
    turns: Mutex<VecDeque<Vec<Result<StreamFragment, String>>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedChatClient {
    pub fn new(turns: Vec<Vec<Result<StreamFragment, String>>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 每轮模型调用实际收到的消息序列（断言组装行为用）
    pub fn recorded_calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat_stream(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<FragmentStream, String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "script exhausted".to_string())?;
        Ok(Box::pin(stream::iter(turn)))
    }
}
