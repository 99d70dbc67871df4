//! The model-facing tool capability and its MCP-backed implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Weak};

use crate::error::{FmError, FmResult};
use crate::mcp::adapter::{
    ParameterSchema, SchemaNaming, ToolContent, convert_arguments, render_contents,
};
use crate::mcp::enumerate::RawToolDescriptor;
use crate::mcp::launcher::ServerConnection;

/// A callable capability offered to the language model.
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> &ParameterSchema;

    /// Run the tool with the model's generated argument object.
    async fn invoke(&self, arguments: Value) -> FmResult<String>;

    /// Function definition in `OpenAI` tool format.
    fn definition(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters().to_json_schema(),
            }
        })
    }
}

/// An MCP server tool adapted for the model.
///
/// Holds only a weak reference to its connection: the connection's
/// lifetime belongs to the [`Toolset`](crate::mcp::registry::Toolset).
#[derive(Debug)]
pub struct McpTool {
    name: String,
    description: String,
    parameters: ParameterSchema,
    server: String,
    connection: Weak<ServerConnection>,
}

impl McpTool {
    pub fn new(
        descriptor: RawToolDescriptor,
        connection: &Arc<ServerConnection>,
        naming: SchemaNaming,
    ) -> Self {
        let parameters =
            ParameterSchema::from_input_schema(descriptor.input_schema.as_ref(), naming);
        Self {
            name: descriptor.name,
            description: descriptor.description,
            parameters,
            server: connection.name().to_string(),
            connection: Arc::downgrade(connection),
        }
    }

    /// Name of the server this tool routes to.
    pub fn server(&self) -> &str {
        &self.server
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn invoke(&self, arguments: Value) -> FmResult<String> {
        let connection = self.connection.upgrade().ok_or_else(|| {
            FmError::tool(&self.name, format!("server '{}' is no longer connected", self.server))
        })?;
        let arguments = arguments
            .as_object()
            .ok_or_else(|| FmError::tool(&self.name, "arguments must be a JSON object"))?;

        let result = connection
            .call_tool(&self.name, convert_arguments(arguments))
            .await?;

        if result.is_error == Some(true) {
            tracing::error!(tool = %self.name, server = %self.server, "MCP tool returned an error");
        }

        let contents: Vec<ToolContent> = result
            .content
            .iter()
            .map(|content| ToolContent::from(&content.raw))
            .collect();
        Ok(render_contents(&contents))
    }
}
