//! 编排过程事件：供调用方流式展示内容分片、工具调用与结果

use serde::Serialize;

/// 单次 respond 过程中推送的事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 新一轮开始（round 从 0 计）
    RoundStart { round: usize, max_rounds: usize },
    /// 模型回复的内容分片（到达即转发，含中间轮）
    ContentDelta { text: String },
    /// 模型请求调用工具
    ToolCall { tool: String, invocation_id: String },
    /// 某个工具调用出结果（预览截断，避免过长）
    ToolResult {
        tool: String,
        invocation_id: String,
        ok: bool,
        preview: String,
    },
    /// 最终回复结束
    MessageDone,
    /// 致命错误（流错误 / 轮数超限 / 取消）
    Error { text: String },
}
