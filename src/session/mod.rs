//! Language-model session with MCP tools.
//!
//! A [`Session`] owns the conversation transcript and runs the tool loop:
//!
//! 1. Send the transcript and tool definitions to the LLM
//! 2. Collect streamed text and tool calls
//! 3. Invoke each requested tool and append its text result
//! 4. Repeat until the model answers without calling a tool
//!
//! # Example
//!
//! ```rust,ignore
//! use fm_cli::session::{Responder, Session};
//!
//! let mut session = Session::build(driver, tools, "You are a helpful assistant.", options);
//! let answer = session.respond("What time is it in Tokyo?").await?;
//! ```

mod interactive;

pub use interactive::{EXIT_COMMANDS, is_exit_command, run_interactive};

use std::{collections::HashMap, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use futures::StreamExt;

use crate::llm::{
    GenerationOptions, LlmDriver, LlmRequest, Message, ToolCall, ToolCallFunction,
};
use crate::mcp::tool::Tool;
use crate::normalized::NormalizedEvent;

/// Maximum number of tool loop iterations per prompt.
const MAX_TOOL_ITERATIONS: usize = 10;

/// Something that turns a prompt into a reply.
#[async_trait]
pub trait Responder: Send {
    async fn respond(&mut self, prompt: &str) -> anyhow::Result<String>;
}

/// A conversation with a language model that can call tools.
pub struct Session {
    driver: Arc<dyn LlmDriver>,
    tools: HashMap<String, Arc<dyn Tool>>,
    definitions: Vec<serde_json::Value>,
    transcript: Vec<Message>,
    options: GenerationOptions,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tool_count", &self.tools.len())
            .field("message_count", &self.transcript.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session with the given tools and system instructions.
    pub fn build(
        driver: Arc<dyn LlmDriver>,
        tools: Vec<Arc<dyn Tool>>,
        instructions: &str,
        options: GenerationOptions,
    ) -> Self {
        let definitions = tools.iter().map(|tool| tool.definition()).collect();
        let tools = tools
            .into_iter()
            .map(|tool| (tool.name().to_string(), tool))
            .collect();

        Self {
            driver,
            tools,
            definitions,
            transcript: vec![Message::system(instructions)],
            options,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Send a prompt and run the tool loop until the model answers.
    ///
    /// On error the transcript is rolled back to its state before the prompt.
    pub async fn respond(&mut self, prompt: &str) -> anyhow::Result<String> {
        let checkpoint = self.transcript.len();
        self.transcript.push(Message::user(prompt));

        let result = self.run_tool_loop().await;
        if result.is_err() {
            self.transcript.truncate(checkpoint);
        }
        result
    }

    async fn run_tool_loop(&mut self) -> anyhow::Result<String> {
        for iteration in 1..=MAX_TOOL_ITERATIONS {
            tracing::debug!(
                iteration,
                message_count = self.transcript.len(),
                tool_count = self.definitions.len(),
                "Sending request to LLM driver"
            );

            let req = LlmRequest {
                messages: self.transcript.clone(),
                tools: self.definitions.clone(),
                options: self.options,
            };
            let mut stream = self.driver.stream(req).await?;

            let mut text = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();

            while let Some(event) = stream.next().await {
                match event? {
                    NormalizedEvent::MessageDelta { text: delta } => text.push_str(&delta),
                    NormalizedEvent::ToolCallComplete {
                        id,
                        name,
                        arguments_json,
                        ..
                    } => tool_calls.push(ToolCall {
                        id,
                        call_type: "function".to_string(),
                        function: ToolCallFunction {
                            name,
                            arguments: arguments_json,
                        },
                    }),
                    NormalizedEvent::ToolCallDelta { .. } => {}
                    NormalizedEvent::Done => break,
                }
            }

            if tool_calls.is_empty() {
                self.transcript.push(Message::assistant(text.clone()));
                return Ok(text);
            }

            tracing::debug!(
                iteration,
                tool_call_count = tool_calls.len(),
                "Model requested tool calls"
            );

            let content = (!text.is_empty()).then_some(text);
            self.transcript
                .push(Message::assistant_tool_calls(content, tool_calls.clone()));

            for call in &tool_calls {
                let output = self.call_tool(call).await;
                self.transcript.push(Message::tool_result(&call.id, output));
            }
        }

        tracing::error!(
            max_iterations = MAX_TOOL_ITERATIONS,
            "Maximum tool loop iterations exceeded"
        );
        Err(anyhow!("Maximum tool loop iterations exceeded"))
    }

    /// Invoke one tool call; failures become text for the model.
    async fn call_tool(&self, call: &ToolCall) -> String {
        let name = &call.function.name;
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!(tool = %name, "Model requested an unknown tool");
            return format!("Error: unknown tool: {name}");
        };

        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str(raw) {
                Ok(arguments) => arguments,
                Err(e) => {
                    tracing::warn!(tool = %name, error = %e, "Tool call arguments are not valid JSON");
                    return format!("Error: invalid tool arguments: {e}");
                }
            }
        };

        tracing::debug!(tool = %name, arguments = %arguments, "Invoking tool");
        match tool.invoke(arguments).await {
            Ok(output) => {
                tracing::debug!(tool = %name, result_length = output.len(), "Tool call succeeded");
                output
            }
            Err(e) => {
                tracing::error!(tool = %name, error = %e, "Tool call failed");
                format!("Error: {e}")
            }
        }
    }
}

#[async_trait]
impl Responder for Session {
    async fn respond(&mut self, prompt: &str) -> anyhow::Result<String> {
        Session::respond(self, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FmError, FmResult};
    use crate::llm::MessageRole;
    use crate::mcp::adapter::ParameterSchema;
    use futures::Stream;
    use serde_json::{Value, json};
    use std::{
        collections::VecDeque,
        pin::Pin,
        sync::Mutex,
    };

    /// Replays one scripted event list per request and records requests.
    #[derive(Debug, Default)]
    struct ScriptedDriver {
        turns: Mutex<VecDeque<Vec<NormalizedEvent>>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedDriver {
        fn new(turns: Vec<Vec<NormalizedEvent>>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                requests: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl LlmDriver for ScriptedDriver {
        async fn stream(
            &self,
            req: LlmRequest,
        ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>>
        {
            self.requests.lock().unwrap().push(req);
            let events = self
                .turns
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted turn left"))?;
            Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
        }
    }

    #[derive(Debug)]
    struct EchoTool {
        parameters: ParameterSchema,
        calls: Mutex<Vec<Value>>,
    }

    impl EchoTool {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                parameters: ParameterSchema::default(),
                calls: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn parameters(&self) -> &ParameterSchema {
            &self.parameters
        }

        async fn invoke(&self, arguments: Value) -> FmResult<String> {
            self.calls.lock().unwrap().push(arguments.clone());
            match arguments.get("text").and_then(Value::as_str) {
                Some(text) => Ok(format!("echo: {text}")),
                None => Err(FmError::tool("echo", "missing text")),
            }
        }
    }

    fn text(s: &str) -> NormalizedEvent {
        NormalizedEvent::MessageDelta {
            text: s.to_string(),
        }
    }

    fn call(id: &str, name: &str, args: &str) -> NormalizedEvent {
        NormalizedEvent::ToolCallComplete {
            call_index: 0,
            id: id.to_string(),
            name: name.to_string(),
            arguments_json: args.to_string(),
        }
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let driver = ScriptedDriver::new(vec![vec![text("Hel"), text("lo"), NormalizedEvent::Done]]);
        let mut session = Session::build(driver.clone(), Vec::new(), "Be brief.", GenerationOptions::default());

        let answer = session.respond("hi").await.unwrap();

        assert_eq!(answer, "Hello");
        let roles: Vec<_> = session.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]);
        assert_eq!(session.transcript()[0].content.as_deref(), Some("Be brief."));

        let requests = driver.requests.lock().unwrap();
        assert!(requests[0].tools.is_empty());
        assert_eq!(requests[0].options.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_tool_loop_feeds_result_back() {
        let driver = ScriptedDriver::new(vec![
            vec![call("call_1", "echo", r#"{"text":"ping"}"#), NormalizedEvent::Done],
            vec![text("pong"), NormalizedEvent::Done],
        ]);
        let tool = EchoTool::new();
        let mut session = Session::build(
            driver.clone(),
            vec![tool.clone() as Arc<dyn Tool>],
            "You are a helpful assistant.",
            GenerationOptions::default(),
        );

        let answer = session.respond("say ping").await.unwrap();

        assert_eq!(answer, "pong");
        assert_eq!(*tool.calls.lock().unwrap(), vec![json!({"text": "ping"})]);

        let requests = driver.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools[0]["function"]["name"], "echo");
        let tool_message = requests[1].messages.last().unwrap();
        assert_eq!(tool_message.role, MessageRole::Tool);
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_message.content.as_deref(), Some("echo: ping"));
    }

    #[tokio::test]
    async fn test_tool_errors_are_returned_as_text() {
        let driver = ScriptedDriver::new(vec![
            vec![
                call("a", "echo", "{}"),
                call("b", "missing", "{}"),
                call("c", "echo", "{not json"),
                NormalizedEvent::Done,
            ],
            vec![text("ok"), NormalizedEvent::Done],
        ]);
        let mut session = Session::build(
            driver.clone(),
            vec![EchoTool::new() as Arc<dyn Tool>],
            "",
            GenerationOptions::default(),
        );

        assert_eq!(session.respond("go").await.unwrap(), "ok");

        let results: Vec<_> = session
            .transcript()
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .filter_map(|m| m.content.clone())
            .collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].starts_with("Error: tool 'echo' failed"));
        assert_eq!(results[1], "Error: unknown tool: missing");
        assert!(results[2].starts_with("Error: invalid tool arguments"));
    }

    #[tokio::test]
    async fn test_iteration_limit_rolls_back_transcript() {
        let turns = (0..MAX_TOOL_ITERATIONS)
            .map(|i| vec![call(&format!("c{i}"), "echo", r#"{"text":"again"}"#), NormalizedEvent::Done])
            .collect();
        let driver = ScriptedDriver::new(turns);
        let mut session = Session::build(
            driver,
            vec![EchoTool::new() as Arc<dyn Tool>],
            "",
            GenerationOptions::default(),
        );

        let err = session.respond("loop").await.unwrap_err();

        assert!(err.to_string().contains("Maximum tool loop iterations"));
        assert_eq!(session.transcript().len(), 1);
    }
}
