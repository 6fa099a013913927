//! 编排主循环
//!
//! Preparing -> AwaitingModel -> (Done | Dispatching -> Preparing) 的迭代状态机：
//! 组装消息、流式调用模型并累积分片，有工具调用则并发分发、结果写回隐藏历史后进入下一轮，
//! 否则最终回复进可见历史。逻辑上递归（本轮输出即下轮输入），实现上是显式循环加轮数计数，
//! 调用栈不随工具轮数增长；轮数超限走 Failed 并给出用户可见的解释消息。

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::assembler::assemble;
use crate::core::error::AgentError;
use crate::core::events::AgentEvent;
use crate::core::state::{ConversationState, Message};
use crate::llm::accumulator::StreamAccumulator;
use crate::llm::traits::ChatClient;
use crate::tools::context::SessionContext;
use crate::tools::dispatcher::ToolDispatcher;

/// 工具结果预览最大字符数（事件推送用）
const RESULT_PREVIEW_CHARS: usize = 200;

/// 编排状态机的阶段；Done / Failed 为终态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Preparing,
    AwaitingModel,
    Dispatching,
    Done,
    Failed,
}

fn send_event(tx: &Option<&mpsc::UnboundedSender<AgentEvent>>, ev: AgentEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

fn preview(text: &str) -> String {
    let p: String = text.chars().take(RESULT_PREVIEW_CHARS).collect();
    if text.chars().count() > RESULT_PREVIEW_CHARS {
        format!("{}...", p)
    } else {
        p
    }
}

/// 执行编排循环直到模型产出无工具调用的最终回复
///
/// 状态只在两处被修改：模型回复落地后（assistant 消息）与分发完成后（tool 消息）；
/// 分发是一道屏障，结果全部到齐才写回，状态本身无需加锁。
#[allow(clippy::too_many_arguments)]
pub async fn run_controller(
    client: &dyn ChatClient,
    dispatcher: &ToolDispatcher,
    system_prompt: &str,
    state: &mut ConversationState,
    ctx: &SessionContext,
    max_rounds: usize,
    event_tx: Option<&mpsc::UnboundedSender<AgentEvent>>,
    cancel: CancellationToken,
) -> Result<String, AgentError> {
    let schemas = dispatcher.schemas();
    let mut round = 0usize;

    loop {
        // PREPARING
        tracing::debug!(phase = ?Phase::Preparing, round, "assembling messages");
        send_event(&event_tx, AgentEvent::RoundStart { round, max_rounds });
        if cancel.is_cancelled() {
            send_event(&event_tx, AgentEvent::Error { text: "Cancelled by caller".into() });
            return Err(AgentError::Cancelled);
        }
        let messages = assemble(system_prompt, state);

        // AWAITING_MODEL
        tracing::debug!(phase = ?Phase::AwaitingModel, round, messages = messages.len(), "calling model");
        let mut stream = client
            .chat_stream(&messages, &schemas)
            .await
            .map_err(AgentError::LlmError)?;

        let mut acc = StreamAccumulator::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // 丢弃部分累积，终止本次 respond
                    send_event(&event_tx, AgentEvent::Error { text: "Cancelled by caller".into() });
                    return Err(AgentError::Cancelled);
                }
                fragment = stream.next() => match fragment {
                    Some(Ok(f)) => {
                        if let Some(text) = &f.content_delta {
                            send_event(&event_tx, AgentEvent::ContentDelta { text: text.clone() });
                        }
                        acc.push(f);
                    }
                    // 部分累积不可当作完整回复，整体作为流错误上抛
                    Some(Err(e)) => {
                        send_event(&event_tx, AgentEvent::Error { text: e.clone() });
                        return Err(AgentError::StreamError(e));
                    }
                    None => break,
                }
            }
        }
        let outcome = acc.finish();

        if outcome.requests.is_empty() {
            // DONE：最终回复是唯一进可见历史的新条目，且在一切隐藏记账之后
            tracing::debug!(phase = ?Phase::Done, round, "final answer");
            state.push_visible(Message::assistant(outcome.content.clone()));
            send_event(&event_tx, AgentEvent::MessageDone);
            return Ok(outcome.content);
        }

        // DISPATCHING：带调用的 assistant 消息先落隐藏历史，结果消息随完成序跟上
        tracing::debug!(phase = ?Phase::Dispatching, round, calls = outcome.requests.len(), "dispatching tools");
        for request in &outcome.requests {
            send_event(
                &event_tx,
                AgentEvent::ToolCall {
                    tool: request.name.clone(),
                    invocation_id: request.id.clone(),
                },
            );
        }
        state.push_hidden(Message::assistant_with_invocations(
            outcome.content,
            outcome.requests.clone(),
        ));

        let results = dispatcher.dispatch(&outcome.requests, ctx, &cancel).await;
        debug_assert_eq!(results.len(), outcome.requests.len());
        for result in &results {
            send_event(
                &event_tx,
                AgentEvent::ToolResult {
                    tool: result.tool_name.clone(),
                    invocation_id: result.invocation_id.clone(),
                    ok: !result.is_failure(),
                    preview: preview(&result.output.text),
                },
            );
            state.push_hidden(Message::tool_result(result));
        }

        // Dispatching -> Preparing 是唯一使计数递增的转移
        round += 1;
        if round >= max_rounds {
            tracing::warn!(phase = ?Phase::Failed, round, "round limit exceeded");
            let text = format!(
                "达到最大工具轮数限制 ({})，仍未得到最终回复，已停止。",
                max_rounds
            );
            state.push_visible(Message::assistant(text.clone()));
            send_event(&event_tx, AgentEvent::Error { text });
            return Err(AgentError::RoundLimitExceeded(max_rounds));
        }
    }
}
