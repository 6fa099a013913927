//! 会话上下文：随每次工具调用传入的只读信息
//!
//! 工具可能需要会话范围的缓存键（session_id）或向下游转发的鉴权令牌；
//! 编排核心自身不解释这些字段。

use uuid::Uuid;

/// 工具调用上下文（对应请求头里的鉴权与会话标识）
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    pub session_id: String,
    pub auth_token: Option<String>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            auth_token: None,
        }
    }

    /// 生成随机会话 id 的新上下文
    pub fn random() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}
