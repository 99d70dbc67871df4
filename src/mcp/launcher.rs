//! Spawns MCP servers and performs the client handshake.

use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParam, CallToolResult, ClientInfo, Implementation, JsonObject, ListToolsResult},
    service::RunningService,
    transport::{IntoTransport, TokioChildProcess},
};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{FmError, FmResult};
use crate::mcp::config::ServerLaunchSpec;

/// Version reported in the MCP `clientInfo`.
pub const CLIENT_VERSION: &str = "1.0.0";

/// Executable used to resolve the configured command on `PATH`.
#[cfg(unix)]
const ENV_LAUNCHER: &str = "/usr/bin/env";

type ClientService = RunningService<RoleClient, ClientInfo>;

/// A live client connection to one spawned MCP server.
pub struct ServerConnection {
    name: String,
    service: ClientService,
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ServerConnection {
    /// Display name the connection was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request the first page of `tools/list`.
    pub async fn list_tools_page(&self) -> FmResult<ListToolsResult> {
        self.service
            .list_tools(Default::default())
            .await
            .map_err(|e| FmError::List {
                server: self.name.clone(),
                message: e.to_string(),
            })
    }

    /// Invoke `tools/call` with already-converted arguments.
    pub async fn call_tool(&self, tool: &str, arguments: JsonObject) -> FmResult<CallToolResult> {
        self.service
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| FmError::tool(tool, format!("tools/call failed on '{}': {e}", self.name)))
    }

    /// Cancel the client service and wait for the transport to shut down.
    ///
    /// Dropping the child-process transport terminates the server process.
    pub async fn close(self) {
        let name = self.name;
        match self.service.cancel().await {
            Ok(reason) => tracing::debug!(server = %name, ?reason, "MCP connection closed"),
            Err(e) => tracing::warn!(server = %name, error = %e, "MCP connection did not shut down cleanly"),
        }
    }

    /// Request cancellation without waiting; used when the connection is still shared.
    pub fn cancel(&self) {
        self.service.cancellation_token().cancel();
    }
}

/// Build the subprocess command for a launch spec.
///
/// On Unix the command is resolved through `/usr/bin/env` rather than a shell.
pub fn launch_command(spec: &ServerLaunchSpec) -> Command {
    #[cfg(unix)]
    let mut cmd = {
        let mut cmd = Command::new(ENV_LAUNCHER);
        cmd.arg(&spec.command);
        cmd
    };
    #[cfg(not(unix))]
    let mut cmd = Command::new(&spec.command);

    cmd.args(&spec.args)
        .envs(&spec.env)
        .stderr(Stdio::inherit());
    cmd
}

/// Spawn the server process, then connect an MCP client over its stdio.
pub async fn launch(spec: &ServerLaunchSpec, display_name: &str) -> FmResult<ServerConnection> {
    tracing::debug!(
        server = %display_name,
        command = %spec.command,
        args = ?spec.args,
        "Starting MCP server"
    );

    let transport =
        TokioChildProcess::new(launch_command(spec)).map_err(|source| FmError::Launch {
            server: display_name.to_string(),
            source,
        })?;

    connect(display_name, transport).await
}

/// Run the MCP handshake over an arbitrary transport.
pub async fn connect<T, E, A>(display_name: &str, transport: T) -> FmResult<ServerConnection>
where
    T: IntoTransport<RoleClient, E, A>,
    E: std::error::Error + Send + Sync + 'static,
{
    let service = client_info(display_name)
        .serve(transport)
        .await
        .map_err(|e| FmError::Connect {
            server: display_name.to_string(),
            message: e.to_string(),
        })?;

    if let Some(server) = service.peer_info() {
        tracing::debug!(
            server = %display_name,
            server_name = %server.server_info.name,
            server_version = %server.server_info.version,
            "MCP handshake complete"
        );
    }

    Ok(ServerConnection {
        name: display_name.to_string(),
        service,
    })
}

fn client_info(display_name: &str) -> ClientInfo {
    ClientInfo {
        client_info: Implementation {
            name: display_name.to_string(),
            version: CLIENT_VERSION.to_string(),
            ..Implementation::from_build_env()
        },
        ..ClientInfo::default()
    }
}
