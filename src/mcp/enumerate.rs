//! Tool enumeration for a connected server.

use rmcp::model::{ListToolsResult, Tool};

use crate::error::FmResult;
use crate::mcp::launcher::ServerConnection;

/// A tool as advertised by one server, before adaptation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Option<serde_json::Value>,
}

impl From<Tool> for RawToolDescriptor {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.as_deref().unwrap_or_default().to_string(),
            input_schema: Some(serde_json::Value::Object((*tool.input_schema).clone())),
        }
    }
}

/// List the tools of `conn`.
///
/// Only the first page is requested; see [`first_page`].
pub async fn enumerate(conn: &ServerConnection) -> FmResult<Vec<RawToolDescriptor>> {
    let page = conn.list_tools_page().await?;
    Ok(first_page(conn.name(), page))
}

/// Extract the tools of one `tools/list` page.
///
/// Pagination is not followed. A continuation cursor is reported with a
/// single warning and the page is returned as-is.
pub fn first_page(server: &str, page: ListToolsResult) -> Vec<RawToolDescriptor> {
    if page.next_cursor.is_some() {
        tracing::warn!(
            server = %server,
            "MCP server returned paginated results - some tools may be missing"
        );
    }

    page.tools.into_iter().map(RawToolDescriptor::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::count_warnings;
    use serde_json::json;

    fn page(next_cursor: Option<&str>) -> ListToolsResult {
        serde_json::from_value(json!({
            "tools": [
                {
                    "name": "get_time",
                    "description": "Current time",
                    "inputSchema": {"type": "object", "properties": {"tz": {"type": "string"}}}
                },
                {
                    "name": "no_description",
                    "inputSchema": {"type": "object"}
                }
            ],
            "nextCursor": next_cursor
        }))
        .unwrap()
    }

    #[test]
    fn test_first_page_converts_tools() {
        let (tools, warnings) = count_warnings(|| first_page("time", page(None)));

        assert_eq!(warnings, 0);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "get_time");
        assert_eq!(tools[0].description, "Current time");
        assert_eq!(
            tools[0].input_schema,
            Some(json!({"type": "object", "properties": {"tz": {"type": "string"}}}))
        );
        assert_eq!(tools[1].description, "");
    }

    #[test]
    fn test_cursor_warns_once_and_keeps_first_page() {
        let (tools, warnings) = count_warnings(|| first_page("time", page(Some("page-2"))));

        assert_eq!(warnings, 1);
        assert_eq!(tools.len(), 2);
    }
}
