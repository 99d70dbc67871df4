//! Tool loading and aggregation across configuration sources.

use futures::future::join_all;
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
    time::Duration,
};

use crate::error::{FmError, FmResult};
use crate::mcp::{
    adapter::SchemaNaming,
    config::{ConfigPaths, ServerLaunchSpec, ServerSpecs, read_primary, read_secondary},
    enumerate::{RawToolDescriptor, enumerate},
    launcher::{ServerConnection, launch},
    tool::{McpTool, Tool},
};

/// Optional exact-name filter applied after deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowList {
    /// No filter: every tool is kept.
    #[default]
    All,
    /// Only these names are kept. An empty set keeps nothing.
    Only(BTreeSet<String>),
}

impl AllowList {
    /// Parse a comma-separated list; `None` means no filter.
    ///
    /// Entries are trimmed and empty pieces dropped, so `Some("")` disables
    /// every tool.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::All,
            Some(list) => Self::Only(
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            ),
        }
    }

    pub fn permits(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }

    /// True when the list is present but empty.
    pub fn disables_all(&self) -> bool {
        matches!(self, Self::Only(names) if names.is_empty())
    }
}

/// Merge per-source tool lists into the final set.
///
/// Sources are concatenated in order; the first tool of each name wins and
/// later duplicates are dropped with a warning. The allow-list is applied
/// last.
pub fn aggregate(sources: Vec<Vec<Arc<dyn Tool>>>, allow_list: &AllowList) -> Vec<Arc<dyn Tool>> {
    let mut seen = HashSet::new();
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

    for tool in sources.into_iter().flatten() {
        if !seen.insert(tool.name().to_string()) {
            tracing::warn!(tool = %tool.name(), "Dropping duplicate tool, keeping first occurrence");
            continue;
        }
        tools.push(tool);
    }

    tools.retain(|tool| allow_list.permits(tool.name()));
    tools
}

/// A named group of server specs, e.g. one configuration file format.
#[derive(Debug, Clone)]
pub struct ToolSource {
    pub label: &'static str,
    pub servers: ServerSpecs,
}

/// Options controlling how tools are loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub allow_list: AllowList,
    pub naming: SchemaNaming,
    /// Upper bound on launch + enumeration per server.
    pub server_timeout: Option<Duration>,
}

/// Live connections plus the aggregated tools routed through them.
#[derive(Debug, Default)]
pub struct Toolset {
    connections: Vec<Arc<ServerConnection>>,
    tools: Vec<Arc<dyn Tool>>,
}

impl Toolset {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Pair connections with the final tool list.
    ///
    /// Connections that no tool routes to (every tool dropped as a duplicate
    /// or by the allow-list) are closed here instead of idling until
    /// shutdown. Tools hold weak references, so an unrouted connection has
    /// no weak references left.
    pub async fn assemble(
        connections: Vec<Arc<ServerConnection>>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        let (connections, idle): (Vec<_>, Vec<_>) = connections
            .into_iter()
            .partition(|connection| Arc::weak_count(connection) > 0);

        for connection in idle {
            tracing::debug!(server = %connection.name(), "Closing MCP server with no remaining tools");
            release(connection).await;
        }

        Self { connections, tools }
    }

    /// Close every server connection, terminating the server processes.
    pub async fn shutdown(self) {
        let Self { connections, tools } = self;
        drop(tools);

        for connection in connections {
            release(connection).await;
        }
    }
}

async fn release(connection: Arc<ServerConnection>) {
    match Arc::try_unwrap(connection) {
        Ok(connection) => connection.close().await,
        Err(shared) => shared.cancel(),
    }
}

/// Loads MCP tools from the configured sources.
#[derive(Debug, Clone)]
pub struct ToolService {
    paths: ConfigPaths,
    options: LoadOptions,
}

impl ToolService {
    pub fn new(paths: ConfigPaths, options: LoadOptions) -> Self {
        Self { paths, options }
    }

    /// Read the Claude config, then the VS Code configs.
    pub fn read_sources(&self) -> Vec<ToolSource> {
        let claude = match &self.paths.primary {
            Some(path) => read_primary(path).unwrap_or_else(|e| {
                tracing::error!(error = %e, "Error loading Claude configuration");
                ServerSpecs::new()
            }),
            None => {
                tracing::debug!("Claude config file location not available");
                ServerSpecs::new()
            }
        };
        let vscode = read_secondary(&self.paths.secondary);

        vec![
            ToolSource {
                label: "claude",
                servers: claude,
            },
            ToolSource {
                label: "vscode",
                servers: vscode,
            },
        ]
    }

    /// Load and aggregate tools from every configured source.
    pub async fn load_tools(&self) -> Toolset {
        if self.options.allow_list.disables_all() {
            tracing::info!("Tool loading disabled by empty allow-list");
            return Toolset::empty();
        }
        self.load_from(self.read_sources()).await
    }

    /// Load and aggregate tools from explicit sources, in order.
    pub async fn load_from(&self, sources: Vec<ToolSource>) -> Toolset {
        if self.options.allow_list.disables_all() {
            return Toolset::empty();
        }

        let mut connections = Vec::new();
        let mut per_source = Vec::with_capacity(sources.len());

        for source in &sources {
            let (source_connections, tools) = self.load_source(source).await;
            connections.extend(source_connections);
            per_source.push(tools);
        }

        let tools = aggregate(per_source, &self.options.allow_list);
        tracing::debug!(tool_count = tools.len(), "Loaded tools total");

        Toolset::assemble(connections, tools).await
    }

    /// Start every server of one source.
    ///
    /// Servers start concurrently; results keep configuration order and a
    /// failing server contributes nothing.
    pub async fn load_source(
        &self,
        source: &ToolSource,
    ) -> (Vec<Arc<ServerConnection>>, Vec<Arc<dyn Tool>>) {
        let attempts = source
            .servers
            .iter()
            .map(|(name, spec)| self.start_server(name, spec));
        let results = join_all(attempts).await;

        let mut connections = Vec::new();
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

        for ((name, _), result) in source.servers.iter().zip(results) {
            match result {
                Ok((connection, descriptors)) => {
                    tracing::debug!(
                        source = source.label,
                        server = %name,
                        tool_count = descriptors.len(),
                        "Loaded tools from MCP server"
                    );
                    tools.extend(descriptors.into_iter().map(|descriptor| {
                        Arc::new(McpTool::new(descriptor, &connection, self.options.naming))
                            as Arc<dyn Tool>
                    }));
                    connections.push(connection);
                }
                Err(e) => {
                    tracing::error!(
                        source = source.label,
                        server = %name,
                        error = %e,
                        "Failed to load tools from MCP server"
                    );
                }
            }
        }

        if !source.servers.is_empty() {
            tracing::debug!(
                source = source.label,
                server_count = source.servers.len(),
                tool_count = tools.len(),
                "Loaded MCP tools from source"
            );
        }

        (connections, tools)
    }

    async fn start_server(
        &self,
        name: &str,
        spec: &ServerLaunchSpec,
    ) -> FmResult<(Arc<ServerConnection>, Vec<RawToolDescriptor>)> {
        let startup = async {
            let connection = launch(spec, name).await?;
            let descriptors = enumerate(&connection).await?;
            Ok::<_, FmError>((Arc::new(connection), descriptors))
        };

        match self.options.server_timeout {
            Some(limit) => tokio::time::timeout(limit, startup)
                .await
                .map_err(|_elapsed| FmError::Connect {
                    server: name.to_string(),
                    message: format!("startup timed out after {}s", limit.as_secs_f64()),
                })?,
            None => startup.await,
        }
    }
}
