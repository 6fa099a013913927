//! 进度可视化：每个工具调用一条只追加的 Markdown 流
//!
//! Sink 在调用前 open 一个 Stage，调用中可多次 append，结束后无论成败都 close。
//! 一切皆尽力而为：Stage 实现不允许失败，也绝不影响工具结果。

use tracing::info;

/// 单个调用的进度流：append 追加文本，close 结束（失败的调用也要 close）
pub trait ProgressStage: Send {
    fn append(&mut self, text: &str);
    fn close(&mut self, ok: bool);
}

/// 进度接收端：按 invocation 打开 Stage
pub trait ProgressSink: Send + Sync {
    fn open(&self, invocation_id: &str, tool_name: &str) -> Box<dyn ProgressStage>;
}

/// 丢弃一切进度输出
pub struct NullProgressSink;

struct NullStage;

impl ProgressStage for NullStage {
    fn append(&mut self, _text: &str) {}
    fn close(&mut self, _ok: bool) {}
}

impl ProgressSink for NullProgressSink {
    fn open(&self, _invocation_id: &str, _tool_name: &str) -> Box<dyn ProgressStage> {
        Box::new(NullStage)
    }
}

/// 将进度写入 tracing 日志（无前端时的默认可观测通道）
pub struct TracingProgressSink;

struct TracingStage {
    invocation_id: String,
    tool_name: String,
}

impl ProgressStage for TracingStage {
    fn append(&mut self, text: &str) {
        info!(
            invocation_id = %self.invocation_id,
            tool = %self.tool_name,
            "stage: {}",
            text.trim_end()
        );
    }

    fn close(&mut self, ok: bool) {
        info!(
            invocation_id = %self.invocation_id,
            tool = %self.tool_name,
            ok,
            "stage closed"
        );
    }
}

impl ProgressSink for TracingProgressSink {
    fn open(&self, invocation_id: &str, tool_name: &str) -> Box<dyn ProgressStage> {
        info!(invocation_id = %invocation_id, tool = %tool_name, "stage opened");
        Box::new(TracingStage {
            invocation_id: invocation_id.to_string(),
            tool_name: tool_name.to_string(),
        })
    }
}
