//! Wasp - Rust LLM 工具编排引擎
//!
//! 模块划分：
//! - **agent**: 无头 Agent 入口（respond / respond_stream、默认工具箱、会话创建）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话状态、消息组装、编排状态机、事件与错误
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、流式累积器
//! - **tools**: 工具 trait、注册表、并发分发器、进度可视化与示例工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod tools;

pub use agent::{default_registry, Agent, DEFAULT_SYSTEM_PROMPT};
