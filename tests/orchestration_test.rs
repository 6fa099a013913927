//! 编排集成测试：单轮回复、工具轮次、失败回灌、轮数上限与历史不变量

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wasp::config::AppConfig;
use wasp::core::{AgentEvent, AgentError, Role};
use wasp::llm::{
    ChatClient, FragmentStream, ScriptedChatClient, StreamFragment, ToolSchema,
};
use wasp::tools::ToolRegistry;
use wasp::tools::EchoTool;
use wasp::Agent;

fn agent_with(client: Arc<dyn ChatClient>, max_rounds: usize) -> Agent {
    let mut cfg = AppConfig::default();
    cfg.agent.max_rounds = max_rounds;
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    Agent::new(client, registry, &cfg)
}

/// 场景 A：只有内容、无工具调用，原样返回且隐藏历史不变
#[tokio::test]
async fn test_content_only_response_passes_through() {
    let client = Arc::new(ScriptedChatClient::new(vec![vec![
        Ok(StreamFragment::content("Just ")),
        Ok(StreamFragment::content("an answer.")),
    ]]));
    let agent = agent_with(client.clone(), 8);
    let (mut state, ctx) = agent.new_session();

    let reply = agent
        .respond(&mut state, &ctx, "question", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "Just an answer.");
    assert_eq!(state.hidden_len(), 0);
    // user + assistant
    assert_eq!(state.visible_len(), 2);
    assert!(state.hidden_is_paired());
}

/// 场景 B：一次 echo 工具轮 + 最终回复；隐藏历史恰好 2 条且先于可见回复
#[tokio::test]
async fn test_single_tool_round_then_final_answer() {
    let client = Arc::new(ScriptedChatClient::new(vec![
        vec![
            Ok(StreamFragment::invocation_open(0, "call_1", "echo")),
            Ok(StreamFragment::invocation_args(0, r#"{"text""#)),
            Ok(StreamFragment::invocation_args(0, r#":"hi"}"#)),
        ],
        vec![Ok(StreamFragment::content("Echoed: hi"))],
    ]));
    let agent = agent_with(client.clone(), 8);
    let (mut state, ctx) = agent.new_session();

    let reply = agent
        .respond(&mut state, &ctx, "say hi", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "Echoed: hi");
    assert_eq!(state.hidden_len(), 2);
    assert!(state.hidden_is_paired());

    let hidden: Vec<_> = state.hidden().collect();
    assert_eq!(hidden[0].role, Role::Assistant);
    assert_eq!(hidden[0].tool_invocations.len(), 1);
    assert_eq!(hidden[0].tool_invocations[0].arguments, r#"{"text":"hi"}"#);
    assert_eq!(hidden[1].role, Role::Tool);
    assert_eq!(hidden[1].content, "hi");
    assert_eq!(hidden[1].tool_result_ref.as_deref(), Some("call_1"));

    // 第二次模型调用看到了自己的工具调用与结果（隐藏历史按时间序插回）
    let calls = client.recorded_calls();
    assert_eq!(calls.len(), 2);
    let second = &calls[1];
    assert_eq!(second[0].role, Role::System);
    assert!(second.iter().any(|m| m.role == Role::Tool && m.content == "hi"));
    // 指令块不取自历史
    assert!(second[0].content.contains("general purpose agent"));
}

/// 场景 C：未知工具转为失败结果回灌，下一轮照常进行而非中止
#[tokio::test]
async fn test_unknown_tool_feeds_failure_back_and_continues() {
    let client = Arc::new(ScriptedChatClient::new(vec![
        vec![
            Ok(StreamFragment::invocation_open(0, "call_1", "unregistered")),
            Ok(StreamFragment::invocation_args(0, "{}")),
        ],
        vec![Ok(StreamFragment::content("I lack that tool."))],
    ]));
    let agent = agent_with(client.clone(), 8);
    let (mut state, ctx) = agent.new_session();

    let reply = agent
        .respond(&mut state, &ctx, "use the thing", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "I lack that tool.");
    assert_eq!(state.hidden_len(), 2);
    assert!(state.hidden_is_paired());

    let hidden: Vec<_> = state.hidden().collect();
    assert!(hidden[1].content.contains("Unknown tool"));
    // 失败作为普通 tool 消息进入下一轮模型调用
    let calls = client.recorded_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1]
        .iter()
        .any(|m| m.role == Role::Tool && m.content.contains("Unknown tool")));
}

/// 并行调用：同轮两个 echo 调用各得其果，结果按 id 配对
#[tokio::test]
async fn test_two_invocations_in_one_round() {
    let client = Arc::new(ScriptedChatClient::new(vec![
        vec![
            Ok(StreamFragment::invocation_open(0, "call_a", "echo")),
            Ok(StreamFragment::invocation_open(1, "call_b", "echo")),
            // 两个 position 的参数分片交错到达
            Ok(StreamFragment::invocation_args(1, r#"{"text":"two"}"#)),
            Ok(StreamFragment::invocation_args(0, r#"{"text":"one"}"#)),
        ],
        vec![Ok(StreamFragment::content("both done"))],
    ]));
    let agent = agent_with(client, 8);
    let (mut state, ctx) = agent.new_session();

    let reply = agent
        .respond(&mut state, &ctx, "both", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "both done");
    // assistant + 2 tool 结果
    assert_eq!(state.hidden_len(), 3);
    assert!(state.hidden_is_paired());

    let hidden: Vec<_> = state.hidden().collect();
    let find = |id: &str| {
        hidden
            .iter()
            .find(|m| m.tool_result_ref.as_deref() == Some(id))
            .unwrap()
    };
    assert_eq!(find("call_a").content, "one");
    assert_eq!(find("call_b").content, "two");
}

/// 总是请求新工具调用的模型：轮数上限处终止于 Failed，不会无限循环
struct EndlessToolClient {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatClient for EndlessToolClient {
    async fn chat_stream(
        &self,
        _messages: &[wasp::core::Message],
        _tools: &[ToolSchema],
    ) -> Result<FragmentStream, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(futures_util::stream::iter(vec![
            Ok(StreamFragment::invocation_open(0, format!("call_{}", n), "echo")),
            Ok(StreamFragment::invocation_args(0, r#"{"text":"again"}"#)),
        ])))
    }
}

#[tokio::test]
async fn test_round_limit_terminates_looping_model() {
    let client = Arc::new(EndlessToolClient {
        calls: AtomicUsize::new(0),
    });
    let agent = agent_with(client.clone(), 3);
    let (mut state, ctx) = agent.new_session();

    let err = agent
        .respond(&mut state, &ctx, "loop forever", CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::RoundLimitExceeded(3)));
    // 恰好 max_rounds 次模型调用，且每轮配对完整
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(state.hidden_len(), 6);
    assert!(state.hidden_is_paired());
    // 可见历史收到解释性消息而非静默失败
    let last_visible = state.visible().last().unwrap();
    assert_eq!(last_visible.role, Role::Assistant);
    assert!(last_visible.content.contains('3'));
}

/// 吐出部分内容后永远挂起的模型流（模拟连接停滞）
struct StallingClient;

#[async_trait]
impl ChatClient for StallingClient {
    async fn chat_stream(
        &self,
        _messages: &[wasp::core::Message],
        _tools: &[ToolSchema],
    ) -> Result<FragmentStream, String> {
        let fragments = futures_util::stream::iter(vec![Ok(StreamFragment::content("partial "))])
            .chain(futures_util::stream::pending());
        Ok(Box::pin(fragments))
    }
}

/// 流中途取消：终止累积、丢弃部分状态，不留下半截 assistant 消息
#[tokio::test]
async fn test_cancel_mid_stream_discards_partial_state() {
    let agent = agent_with(Arc::new(StallingClient), 8);
    let (mut state, ctx) = agent.new_session();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = agent
        .respond(&mut state, &ctx, "hang", cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Cancelled));
    // 只有 user 消息落地，部分累积的内容没有进入任何历史
    assert_eq!(state.visible_len(), 1);
    assert_eq!(state.hidden_len(), 0);
}

/// 流式事件：最终回复的内容分片实时推送，工具调用与结果都有事件
#[tokio::test]
async fn test_events_stream_content_and_tool_activity() {
    let client = Arc::new(ScriptedChatClient::new(vec![
        vec![
            Ok(StreamFragment::invocation_open(0, "call_1", "echo")),
            Ok(StreamFragment::invocation_args(0, r#"{"text":"hi"}"#)),
        ],
        vec![
            Ok(StreamFragment::content("Echoed")),
            Ok(StreamFragment::content(": hi")),
        ],
    ]));
    let agent = agent_with(client, 8);
    let (mut state, ctx) = agent.new_session();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let reply = agent
        .respond_stream(&mut state, &ctx, "say hi", event_tx, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply, "Echoed: hi");

    let mut deltas = String::new();
    let mut saw_tool_call = false;
    let mut saw_tool_result = false;
    let mut saw_done = false;
    while let Ok(event) = event_rx.try_recv() {
        match event {
            AgentEvent::ContentDelta { text } => deltas.push_str(&text),
            AgentEvent::ToolCall { tool, .. } => saw_tool_call = tool == "echo",
            AgentEvent::ToolResult { ok, preview, .. } => {
                saw_tool_result = ok && preview == "hi";
            }
            AgentEvent::MessageDone => saw_done = true,
            _ => {}
        }
    }
    assert_eq!(deltas, "Echoed: hi");
    assert!(saw_tool_call);
    assert!(saw_tool_result);
    assert!(saw_done);
}

/// 并发会话：独立 Agent 会话之间互不串扰
#[tokio::test]
async fn test_sessions_are_independent() {
    let client = Arc::new(ScriptedChatClient::new(vec![
        vec![Ok(StreamFragment::content("one"))],
        vec![Ok(StreamFragment::content("two"))],
    ]));
    let agent = agent_with(client, 8);

    let (mut s1, c1) = agent.new_session();
    let (mut s2, c2) = agent.new_session();
    assert_ne!(c1.session_id, c2.session_id);

    let r1 = agent
        .respond(&mut s1, &c1, "a", CancellationToken::new())
        .await
        .unwrap();
    let r2 = agent
        .respond(&mut s2, &c2, "b", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(r1, "one");
    assert_eq!(r2, "two");
    assert_eq!(s1.visible_len(), 2);
    assert_eq!(s2.visible_len(), 2);
}
