//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找；Dispatcher 在调用时加超时并统一转失败结果。
//! 工具返回 ToolOutput（文本 + 可选附件），执行期间可向 Stage 追加进度文本。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::state::ToolOutput;
use crate::llm::traits::ToolSchema;
use crate::tools::context::SessionContext;
use crate::tools::progress::ProgressStage;

/// 工具 trait：名称、描述（供模型理解）、参数 schema、异步执行（args 为已解析 JSON）
///
/// execute 返回 Err 表示失败；必须可与无关调用并发执行。
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（模型 tool_calls 中的 function name）
    fn name(&self) -> &str;

    /// 工具描述（供模型理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供模型生成正确的参数格式）
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 是否由 Dispatcher 把请求参数渲染进 Stage（自管 Stage 输出的工具可关闭）
    fn show_arguments(&self) -> bool {
        true
    }

    /// 执行工具
    async fn execute(
        &self,
        args: Value,
        ctx: &SessionContext,
        stage: &mut dyn ProgressStage,
    ) -> Result<ToolOutput, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，启动时注册一次
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 完整工具目录，随每次模型调用下发
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }
}
