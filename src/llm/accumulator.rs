//! 流式回复累积器
//!
//! 对到达序分片做纯折叠：内容增量进单一缓冲；工具调用增量按 position index 归组，
//! 首见某 index 时记下 id 与 name，之后只追加参数文本（到达序即权威序，不重排）。
//! 流结束后 finish 产出 (content, requests)；参数仍是原始文本，解析推迟到分发时，
//! 这样损坏的参数只会变成该调用的失败结果，不会废掉整轮。

use std::collections::BTreeMap;

use crate::core::state::ToolInvocation;
use crate::llm::traits::StreamFragment;

/// 流结束后的产物：若 requests 为空，content 即最终回复候选
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub content: String,
    pub requests: Vec<ToolInvocation>,
}

#[derive(Debug, Default)]
struct PendingInvocation {
    id: String,
    name: String,
    arguments: String,
}

/// 单次模型调用内有效；finish 消费自身，随流一起销毁
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    // index 可以跳号（如 0 后直接 2），所以只按出现过的键迭代
    pending: BTreeMap<u32, PendingInvocation>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按到达序消费一个分片
    pub fn push(&mut self, fragment: StreamFragment) {
        if let Some(text) = fragment.content_delta {
            self.content.push_str(&text);
        }
        for delta in fragment.invocations {
            let entry = self.pending.entry(delta.index).or_default();
            // id/name 只在首个分片出现且此后不变；宽容处理乱序后端，空则补
            if entry.id.is_empty() {
                if let Some(id) = delta.id {
                    entry.id = id;
                }
            }
            if entry.name.is_empty() {
                if let Some(name) = delta.name {
                    entry.name = name;
                }
            }
            if let Some(args) = delta.arguments_delta {
                entry.arguments.push_str(&args);
            }
        }
    }

    /// 流结束：产出内容与按 index 升序的完整请求列表。
    /// 只宣告未闭合的 index（有 name 无参数）视为空参数调用，不是错误。
    pub fn finish(self) -> StreamOutcome {
        let requests = self
            .pending
            .into_values()
            .map(|p| ToolInvocation {
                id: p.id,
                name: p.name,
                arguments: p.arguments,
            })
            .collect();
        StreamOutcome {
            content: self.content,
            requests,
        }
    }

    /// 是否累积到了任何工具调用（供循环内提前判断）
    pub fn has_invocations(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::traits::StreamFragment as F;

    fn run(fragments: Vec<F>) -> StreamOutcome {
        let mut acc = StreamAccumulator::new();
        for f in fragments {
            acc.push(f);
        }
        acc.finish()
    }

    #[test]
    fn test_content_accumulates_in_arrival_order() {
        let out = run(vec![F::content("Hel"), F::content("lo"), F::content("!")]);
        assert_eq!(out.content, "Hello!");
        assert!(out.requests.is_empty());
    }

    #[test]
    fn test_arguments_round_trip_per_position() {
        let out = run(vec![
            F::invocation_open(0, "call_1", "echo"),
            F::invocation_args(0, r#"{"te"#),
            F::invocation_args(0, r#"xt":"#),
            F::invocation_args(0, r#""hi"}"#),
        ]);
        assert_eq!(out.requests.len(), 1);
        assert_eq!(out.requests[0].id, "call_1");
        assert_eq!(out.requests[0].name, "echo");
        assert_eq!(out.requests[0].arguments, r#"{"text":"hi"}"#);
        serde_json::from_str::<serde_json::Value>(&out.requests[0].arguments).unwrap();
    }

    #[test]
    fn test_interleaved_positions_reassemble_independently() {
        // 两个调用的分片任意交错，重组结果只取决于各自的到达序
        let interleaved = run(vec![
            F::invocation_open(0, "call_a", "search"),
            F::invocation_open(1, "call_b", "echo"),
            F::invocation_args(1, r#"{"text"#),
            F::invocation_args(0, r#"{"query":"#),
            F::invocation_args(0, r#""rust"}"#),
            F::invocation_args(1, r#"":"x"}"#),
        ]);
        let sequential = run(vec![
            F::invocation_open(0, "call_a", "search"),
            F::invocation_args(0, r#"{"query":"#),
            F::invocation_args(0, r#""rust"}"#),
            F::invocation_open(1, "call_b", "echo"),
            F::invocation_args(1, r#"{"text"#),
            F::invocation_args(1, r#"":"x"}"#),
        ]);
        assert_eq!(interleaved.requests.len(), 2);
        for (a, b) in interleaved.requests.iter().zip(sequential.requests.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.name, b.name);
            assert_eq!(a.arguments, b.arguments);
        }
    }

    #[test]
    fn test_index_skip_does_not_lose_requests() {
        let out = run(vec![
            F::invocation_open(0, "call_a", "echo"),
            F::invocation_open(2, "call_c", "search"),
            F::invocation_args(2, "{}"),
        ]);
        assert_eq!(out.requests.len(), 2);
        assert_eq!(out.requests[0].id, "call_a");
        assert_eq!(out.requests[1].id, "call_c");
    }

    #[test]
    fn test_announced_but_never_closed_position_is_empty_args() {
        let out = run(vec![F::invocation_open(0, "call_a", "list_files")]);
        assert_eq!(out.requests.len(), 1);
        assert_eq!(out.requests[0].name, "list_files");
        assert_eq!(out.requests[0].arguments, "");
    }

    #[test]
    fn test_mixed_content_and_invocations() {
        let mut acc = StreamAccumulator::new();
        acc.push(F::content("Let me check. "));
        assert!(!acc.has_invocations());
        acc.push(F::invocation_open(0, "call_1", "echo"));
        assert!(acc.has_invocations());
        acc.push(F::content("One moment."));
        let out = acc.finish();
        assert_eq!(out.content, "Let me check. One moment.");
        assert_eq!(out.requests.len(), 1);
    }
}
