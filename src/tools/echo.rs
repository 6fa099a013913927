//! Echo 工具（测试用）

use async_trait::async_trait;
use serde_json::Value;

use crate::core::state::ToolOutput;
use crate::tools::context::SessionContext;
use crate::tools::progress::ProgressStage;
use crate::tools::registry::Tool;

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text (for testing). Args: {\"text\": \"message\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo back" }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        args: Value,
        _ctx: &SessionContext,
        _stage: &mut dyn ProgressStage,
    ) -> Result<ToolOutput, String> {
        let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("(empty)");
        Ok(ToolOutput::text(text))
    }
}
