//! Test MCP servers: an in-memory one over a duplex pipe and a `sh` one for real launches.

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

/// Canned behavior of the mock server.
#[derive(Debug, Clone)]
pub struct MockServer {
    pub name: &'static str,
    pub tools: Vec<Value>,
    pub next_cursor: Option<&'static str>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self {
            name: "mock-time",
            tools: vec![
                json!({
                    "name": "get_time",
                    "description": "Current time in a timezone",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"timezone": {"type": "string"}},
                        "required": ["timezone"]
                    }
                }),
                json!({
                    "name": "fail",
                    "description": "Always reports an error",
                    "inputSchema": {"type": "object", "properties": {}}
                }),
            ],
            next_cursor: None,
        }
    }
}

impl MockServer {
    /// Start serving on one end of a duplex pipe and return the client end.
    pub fn spawn(self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            // The client hanging up ends the task.
            let _ = self.serve(server).await;
        });
        client
    }

    async fn serve(self, io: DuplexStream) -> std::io::Result<()> {
        let (read, mut write) = tokio::io::split(io);
        let mut lines = BufReader::new(read).lines();

        while let Some(line) = lines.next_line().await? {
            let Ok(request) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            // Notifications carry no id and get no reply.
            let Some(id) = request.get("id").cloned() else {
                continue;
            };
            let method = request["method"].as_str().unwrap_or_default();

            let reply = match self.result(method, &request["params"]) {
                Some(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                None => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": format!("method not found: {method}")}
                }),
            };

            let mut bytes = serde_json::to_vec(&reply)?;
            bytes.push(b'\n');
            write.write_all(&bytes).await?;
            write.flush().await?;
        }
        Ok(())
    }

    fn result(&self, method: &str, params: &Value) -> Option<Value> {
        match method {
            "initialize" => Some(json!({
                "protocolVersion": params["protocolVersion"],
                "capabilities": {"tools": {}},
                "serverInfo": {"name": self.name, "version": "0.1.0"}
            })),
            "ping" => Some(json!({})),
            "tools/list" => {
                let mut result = json!({"tools": self.tools});
                if let Some(cursor) = self.next_cursor {
                    result["nextCursor"] = json!(cursor);
                }
                Some(result)
            }
            "tools/call" => Some(call_tool(params)),
            _ => None,
        }
    }
}

fn call_tool(params: &Value) -> Value {
    let arguments = &params["arguments"];
    match params["name"].as_str() {
        Some("get_time") => json!({
            "content": [
                {"type": "text", "text": format!("12:00 in {}", arguments["timezone"].as_str().unwrap_or("?"))},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": format!(" args={arguments}")}
            ],
            "isError": false
        }),
        Some(other) => json!({
            "content": [{"type": "text", "text": format!("{other} failed")}],
            "isError": true
        }),
        None => json!({"content": [], "isError": true}),
    }
}

/// A minimal stdio MCP server written for `sh`.
///
/// It answers `initialize`, `tools/list` with one `greet` tool, and
/// `tools/call` with the value of `$FM_GREETING`. Requests are matched
/// against the compact JSON the client sends.
#[cfg(unix)]
pub const SHELL_SERVER: &str = r##"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  [ -z "$id" ] && continue
  case "$line" in
    *'"method":"initialize"'*)
      version=$(printf '%s' "$line" | sed -n 's/.*"protocolVersion":"\([^"]*\)".*/\1/p')
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"%s","capabilities":{"tools":{}},"serverInfo":{"name":"sh-greeter","version":"0.1.0"}}}\n' "$id" "$version"
      ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"greet","description":"Say the configured greeting","inputSchema":{"type":"object","properties":{}}}]}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}],"isError":false}}\n' "$id" "$FM_GREETING"
      ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id"
      ;;
  esac
done
"##;
