//! 会话状态：可见历史与隐藏历史
//!
//! Message 是与模型交换的最小单位；带工具调用的 assistant 消息与 tool 结果消息
//! 只进入 hiddenHistory，调用方永远看不到，但组装时按时间序插回原位供模型参考。
//! ConversationState 只由 Controller（及提交 user 消息的调用方）修改，工具实现不直接碰它。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// 模型请求的一次工具调用
///
/// id 由模型分配，在同一条流式回复内对该调用的所有分片保持稳定；
/// arguments 是流式累积出的原始 JSON 文本，只在分发时才解析为结构化参数。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// 工具结果附件（图片、生成文件等），随文本一起回灌给模型或展示层
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// 工具执行产出：文本 + 可选附件
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// 一次分发的结果：成功或失败都占一个槽位，按 invocation_id 与请求对应
///
/// 创建后不可变，由 Controller 消费一次转为 tool 消息。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub invocation_id: String,
    pub tool_name: String,
    pub output: ToolOutput,
    /// Some 表示失败，内容为人类可读原因；此时 output.text 也是喂给模型的错误描述
    pub error: Option<String>,
}

impl ToolInvocationResult {
    pub fn success(invocation_id: impl Into<String>, tool_name: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            output,
            error: None,
        }
    }

    /// 失败结果：错误描述同时作为回灌文本，模型看到后可以重试或换工具
    pub fn failure(
        invocation_id: impl Into<String>,
        tool_name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let detail = detail.into();
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            output: ToolOutput::text(format!("Error executing tool: {}", detail)),
            error: Some(detail),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// 仅请求工具的 assistant 消息非空
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    /// 仅 tool 消息携带：所回应的 invocation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result_ref: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_invocations: Vec::new(),
            tool_result_ref: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_invocations: Vec::new(),
            tool_result_ref: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_invocations: Vec::new(),
            tool_result_ref: None,
        }
    }

    /// 请求工具的 assistant 消息（content 可为空），只进 hiddenHistory
    pub fn assistant_with_invocations(content: impl Into<String>, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_invocations: invocations,
            tool_result_ref: None,
        }
    }

    /// 由分发结果生成 tool 消息：文本取结果 payload，引用 invocation id
    pub fn tool_result(result: &ToolInvocationResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.output.text.clone(),
            tool_invocations: Vec::new(),
            tool_result_ref: Some(result.invocation_id.clone()),
        }
    }
}

/// 历史条目：全局递增 seq 用于可见/隐藏两条时间线的合并排序
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub message: Message,
}

/// 会话级聚合状态：调用方可见的历史 + 模型专用的隐藏历史
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationState {
    visible: Vec<StateEntry>,
    hidden: Vec<StateEntry>,
    next_seq: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, message: Message) -> StateEntry {
        let seq = self.next_seq;
        self.next_seq += 1;
        StateEntry {
            seq,
            at: Utc::now(),
            message,
        }
    }

    pub fn push_visible(&mut self, message: Message) {
        let e = self.entry(message);
        self.visible.push(e);
    }

    pub fn push_hidden(&mut self, message: Message) {
        let e = self.entry(message);
        self.hidden.push(e);
    }

    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.visible.iter().map(|e| &e.message)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &Message> {
        self.hidden.iter().map(|e| &e.message)
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn hidden_len(&self) -> usize {
        self.hidden.len()
    }

    /// 按 seq 合并可见与隐藏历史，得到真实时间序（隐藏条目插回原位）
    pub fn chronological(&self) -> Vec<&Message> {
        let mut out = Vec::with_capacity(self.visible.len() + self.hidden.len());
        let (mut v, mut h) = (self.visible.iter().peekable(), self.hidden.iter().peekable());
        loop {
            match (v.peek(), h.peek()) {
                (Some(a), Some(b)) => {
                    if a.seq < b.seq {
                        out.push(&v.next().unwrap().message);
                    } else {
                        out.push(&h.next().unwrap().message);
                    }
                }
                (Some(_), None) => out.push(&v.next().unwrap().message),
                (None, Some(_)) => out.push(&h.next().unwrap().message),
                (None, None) => break,
            }
        }
        out
    }

    /// 校验配对不变量：每条带 N 个调用的 assistant 隐藏条目，后面紧跟 N 条
    /// 引用这些 id 的 tool 条目，且在下一条 assistant 之前补齐
    pub fn hidden_is_paired(&self) -> bool {
        let mut iter = self.hidden.iter().map(|e| &e.message).peekable();
        while let Some(msg) = iter.next() {
            match msg.role {
                Role::Assistant => {
                    let mut expected: Vec<&str> =
                        msg.tool_invocations.iter().map(|i| i.id.as_str()).collect();
                    while !expected.is_empty() {
                        match iter.peek() {
                            Some(m) if m.role == Role::Tool => {
                                let m = iter.next().unwrap();
                                let id = m.tool_result_ref.as_deref().unwrap_or("");
                                match expected.iter().position(|e| *e == id) {
                                    Some(pos) => {
                                        expected.remove(pos);
                                    }
                                    None => return false,
                                }
                            }
                            _ => return false,
                        }
                    }
                }
                // 游离的 tool 条目（没有前导 assistant 调用）
                Role::Tool => return false,
                _ => {}
            }
        }
        true
    }
}
