//! Agent 错误类型
//!
//! 只有两类错误会终止一次 respond：模型流错误与轮数超限；
//! 工具侧的一切失败（未知工具、参数损坏、超时、panic）都在 Dispatcher 内转为失败结果回灌给模型，不会出现在这里。

use thiserror::Error;

/// 编排过程中可能出现的致命错误（非致命的工具失败见 ToolInvocationResult）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 模型流中途失败（连接中断、限流、协议错误），本次 respond 终止
    #[error("Model stream error: {0}")]
    StreamError(String),

    /// 模型请求无法建立（请求构造或连接失败）
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 工具轮数达到上限仍未产出最终回复（防模型死循环）
    #[error("Round limit exceeded after {0} tool rounds")]
    RoundLimitExceeded(usize),

    #[error("Cancelled by caller")]
    Cancelled,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),
}
