//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），
//! 使用原生 function calling：工具目录随请求下发，流式回复中的 tool_calls
//! 分片原样转为 StreamFragment，交给累积器重组。

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::core::state::{Message, Role};
use crate::llm::traits::{ChatClient, FragmentStream, InvocationDelta, StreamFragment, ToolSchema};

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, String> {
        let mut out = Vec::with_capacity(messages.len());
        for m in messages {
            let converted = match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| e.to_string())?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| e.to_string())?,
                ),
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !m.content.is_empty() {
                        args.content(m.content.clone());
                    }
                    if !m.tool_invocations.is_empty() {
                        let calls: Vec<ChatCompletionMessageToolCalls> = m
                            .tool_invocations
                            .iter()
                            .map(|inv| {
                                ChatCompletionMessageToolCalls::Function(
                                    ChatCompletionMessageToolCall {
                                        id: inv.id.clone(),
                                        function: FunctionCall {
                                            name: inv.name.clone(),
                                            arguments: inv.arguments.clone(),
                                        },
                                    },
                                )
                            })
                            .collect();
                        args.tool_calls(calls);
                    }
                    ChatCompletionRequestMessage::Assistant(
                        args.build().map_err(|e| e.to_string())?,
                    )
                }
                Role::Tool => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(m.content.clone())
                        .tool_call_id(m.tool_result_ref.clone().unwrap_or_default())
                        .build()
                        .map_err(|e| e.to_string())?,
                ),
            };
            out.push(converted);
        }
        Ok(out)
    }

    fn to_openai_tools(tools: &[ToolSchema]) -> Vec<ChatCompletionTools> {
        tools
            .iter()
            .map(|t| {
                ChatCompletionTools::Function(ChatCompletionTool {
                    function: FunctionObject {
                        name: t.name.clone(),
                        description: Some(t.description.clone()),
                        parameters: Some(t.parameters.clone()),
                        strict: None,
                    },
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<FragmentStream, String> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(self.to_openai_messages(messages)?)
            .stream(true);
        if !tools.is_empty() {
            request.tools(Self::to_openai_tools(tools));
        }
        let request = request.build().map_err(|e| e.to_string())?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| e.to_string())?;

        // 连接错误、限流、畸形分片统一映射为 Err 项，由 Controller 作为终止性流错误处理
        let fragments = stream.map(|item| {
            let response = item.map_err(|e| e.to_string())?;
            let mut fragment = StreamFragment::default();
            if let Some(choice) = response.choices.first() {
                if let Some(content) = &choice.delta.content {
                    fragment.content_delta = Some(content.clone());
                }
                if let Some(tool_calls) = &choice.delta.tool_calls {
                    for chunk in tool_calls {
                        fragment.invocations.push(InvocationDelta {
                            index: chunk.index,
                            id: chunk.id.clone(),
                            name: chunk.function.as_ref().and_then(|f| f.name.clone()),
                            arguments_delta: chunk
                                .function
                                .as_ref()
                                .and_then(|f| f.arguments.clone()),
                        });
                    }
                }
            }
            Ok(fragment)
        });

        Ok(Box::pin(fragments))
    }
}
