//! 消息组装：单次模型调用的完整消息序列
//!
//! System 指令块固定在首位且不从任何历史读取（历史里无法覆盖它），
//! 其后是可见与隐藏历史按时间序的交错合并——模型必须看到自己先前的工具调用与结果。

use crate::core::state::{ConversationState, Message};

/// 组装一次模型调用的消息：system + 按时间序合并的历史
pub fn assemble(system_prompt: &str, state: &ConversationState) -> Vec<Message> {
    let mut messages = Vec::with_capacity(1 + state.visible_len() + state.hidden_len());
    messages.push(Message::system(system_prompt));
    messages.extend(state.chronological().into_iter().cloned());
    messages
}
