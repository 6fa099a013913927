//! 工具分发器
//!
//! 对一轮完整的调用请求并发执行：每个请求解析参数、查注册表、在统一超时内调用工具，
//! 未知工具、参数损坏、工具报错、panic、超时与取消一律转为失败结果填回槽位，
//! 绝不让异常越过 dispatch 边界；结果按完成序返回，靠 invocation_id 与请求对应。
//! 每次调用输出结构化审计日志（JSON）并维护 Stage 的 open/close 生命周期。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::state::{ToolInvocation, ToolInvocationResult};
use crate::llm::traits::ToolSchema;
use crate::tools::context::SessionContext;
use crate::tools::progress::{NullProgressSink, ProgressSink, ProgressStage};
use crate::tools::registry::{Tool, ToolRegistry};

/// 工具分发器：持有注册表、统一超时与进度 Sink
pub struct ToolDispatcher {
    registry: ToolRegistry,
    timeout: Duration,
    sink: Arc<dyn ProgressSink>,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            sink: Arc::new(NullProgressSink),
        }
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 完整工具目录（Controller 随模型调用下发）
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 并发执行一轮请求；返回列表与请求等长，顺序为完成序
    pub async fn dispatch(
        &self,
        requests: &[ToolInvocation],
        ctx: &SessionContext,
        cancel: &CancellationToken,
    ) -> Vec<ToolInvocationResult> {
        let mut in_flight = FuturesUnordered::new();
        for request in requests {
            let tool = self.registry.get(&request.name);
            let sink = self.sink.clone();
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            let request = request.clone();
            let call_timeout = self.timeout;
            let (id, name) = (request.id.clone(), request.name.clone());

            // 每个调用独立 spawn：互不阻塞，panic 也只废掉自己的槽位
            let handle = tokio::spawn(async move {
                run_one(request, tool, sink, ctx, cancel, call_timeout).await
            });
            in_flight.push(async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => ToolInvocationResult::failure(id, name, format!("tool task failed: {}", e)),
                }
            });
        }

        let mut results = Vec::with_capacity(requests.len());
        while let Some(result) = in_flight.next().await {
            results.push(result);
        }
        results
    }
}

/// 单个调用的完整生命周期：开 Stage、解析参数、执行（带超时与取消）、关 Stage、审计
async fn run_one(
    request: ToolInvocation,
    tool: Option<Arc<dyn Tool>>,
    sink: Arc<dyn ProgressSink>,
    ctx: SessionContext,
    cancel: CancellationToken,
    call_timeout: Duration,
) -> ToolInvocationResult {
    let start = Instant::now();
    let mut stage = sink.open(&request.id, &request.name);

    let result = execute_guarded(&request, tool, &ctx, &cancel, call_timeout, stage.as_mut()).await;

    stage.close(!result.is_failure());

    let duration_ms = start.elapsed().as_millis() as u64;
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": request.name,
        "invocation_id": request.id,
        "ok": !result.is_failure(),
        "outcome": result.error.as_deref().unwrap_or("ok"),
        "duration_ms": duration_ms,
        "args_preview": args_preview(&request.arguments),
    });
    tracing::info!(audit = %audit.to_string(), "tool");

    result
}

async fn execute_guarded(
    request: &ToolInvocation,
    tool: Option<Arc<dyn Tool>>,
    ctx: &SessionContext,
    cancel: &CancellationToken,
    call_timeout: Duration,
    stage: &mut dyn ProgressStage,
) -> ToolInvocationResult {
    // 空参数 = 只宣告未闭合的调用，按无参执行
    let args: Value = if request.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        match serde_json::from_str(&request.arguments) {
            Ok(v) => v,
            Err(e) => {
                return ToolInvocationResult::failure(
                    &request.id,
                    &request.name,
                    format!("Malformed arguments: {}", e),
                )
            }
        }
    };

    let tool = match tool {
        Some(t) => t,
        None => {
            return ToolInvocationResult::failure(
                &request.id,
                &request.name,
                format!("Unknown tool: {}", request.name),
            )
        }
    };

    if tool.show_arguments() {
        let pretty = serde_json::to_string_pretty(&args).unwrap_or_else(|_| args.to_string());
        stage.append("## Request arguments:\n");
        stage.append(&format!("```json\n{}\n```\n", pretty));
        stage.append("## Response:\n");
    }

    tokio::select! {
        _ = cancel.cancelled() => ToolInvocationResult::failure(
            &request.id,
            &request.name,
            "cancelled before completion",
        ),
        executed = timeout(call_timeout, tool.execute(args, ctx, stage)) => match executed {
            Ok(Ok(output)) => ToolInvocationResult::success(&request.id, &request.name, output),
            Ok(Err(e)) => ToolInvocationResult::failure(&request.id, &request.name, e),
            Err(_) => ToolInvocationResult::failure(
                &request.id,
                &request.name,
                format!("timed out after {:?}", call_timeout),
            ),
        },
    }
}

fn args_preview(args: &str) -> String {
    if args.len() > 200 {
        format!("{}...", args.chars().take(200).collect::<String>())
    } else {
        args.to_string()
    }
}
