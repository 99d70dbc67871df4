//! MCP server configuration readers.
//!
//! Two independent sources are supported:
//!
//! - the Claude Desktop config (`{"mcpServers": {...}}`), read strictly, and
//! - VS Code settings files (`{"mcp": {"servers": {...}}}`), which may carry
//!   `//` comment lines and unrelated keys, read permissively.
//!
//! Both produce a [`ServerSpecs`] mapping that keeps declaration order.

use serde::{Deserialize, Deserializer, Serialize, de};
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::error::{FmError, FmResult};

/// How to start one MCP server as a subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLaunchSpec {
    /// Transport hint from the config file (e.g. `"stdio"`). Informational only.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Applied on top of the inherited environment.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// Insertion-ordered `name -> ServerLaunchSpec` mapping.
///
/// Inserting a name that already exists replaces the spec in place, so the
/// original position is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSpecs {
    entries: Vec<(String, ServerLaunchSpec)>,
}

impl ServerSpecs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the replaced spec if the name existed.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        spec: ServerLaunchSpec,
    ) -> Option<ServerLaunchSpec> {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, spec)),
            None => {
                self.entries.push((name, spec));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServerLaunchSpec> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, spec)| spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServerLaunchSpec)> {
        self.entries.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Merge `other` into `self`; entries from `other` win on name collisions.
    pub fn merge(&mut self, other: ServerSpecs) {
        for (name, spec) in other {
            self.insert(name, spec);
        }
    }
}

impl IntoIterator for ServerSpecs {
    type Item = (String, ServerLaunchSpec);
    type IntoIter = std::vec::IntoIter<(String, ServerLaunchSpec)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, ServerLaunchSpec)> for ServerSpecs {
    fn from_iter<I: IntoIterator<Item = (String, ServerLaunchSpec)>>(iter: I) -> Self {
        let mut specs = Self::new();
        for (name, spec) in iter {
            specs.insert(name, spec);
        }
        specs
    }
}

impl<'de> Deserialize<'de> for ServerSpecs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SpecsVisitor;

        impl<'de> de::Visitor<'de> for SpecsVisitor {
            type Value = ServerSpecs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of MCP server names to launch specs")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut specs = ServerSpecs::new();
                while let Some((name, spec)) = map.next_entry::<String, ServerLaunchSpec>()? {
                    specs.insert(name, spec);
                }
                Ok(specs)
            }
        }

        deserializer.deserialize_map(SpecsVisitor)
    }
}

/// Claude Desktop configuration (`claude_desktop_config.json`).
#[derive(Debug, Default, Deserialize)]
pub struct ClaudeConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: ServerSpecs,
}

/// The part of a VS Code `settings.json` we care about.
#[derive(Debug, Default, Deserialize)]
pub struct VsCodeSettings {
    #[serde(default)]
    pub mcp: Option<VsCodeMcpSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VsCodeMcpSection {
    #[serde(default)]
    pub servers: ServerSpecs,
}

/// Locations probed for MCP server definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Claude Desktop config file, if the platform has a config directory.
    pub primary: Option<PathBuf>,
    /// VS Code settings files, user-level first, then project-level.
    pub secondary: Vec<PathBuf>,
}

impl ConfigPaths {
    /// Platform default locations.
    pub fn discover() -> Self {
        let config_dir = dirs::config_dir();
        let primary = config_dir
            .as_ref()
            .map(|dir| dir.join("Claude").join("claude_desktop_config.json"));

        let mut secondary = Vec::new();
        if let Some(dir) = &config_dir {
            secondary.push(dir.join("Code").join("User").join("settings.json"));
        }
        secondary.push(PathBuf::from(".vscode").join("settings.json"));

        Self { primary, secondary }
    }

    /// Replace the primary path and/or the secondary candidates.
    ///
    /// An empty `secondary` keeps the current candidates.
    #[must_use]
    pub fn with_overrides(mut self, primary: Option<PathBuf>, secondary: Vec<PathBuf>) -> Self {
        if primary.is_some() {
            self.primary = primary;
        }
        if !secondary.is_empty() {
            self.secondary = secondary;
        }
        self
    }
}

/// Read the Claude Desktop config.
///
/// A missing file is not an error and yields no servers.
pub fn read_primary(path: &Path) -> FmResult<ServerSpecs> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Claude config file not found");
        return Ok(ServerSpecs::new());
    }

    let text = fs::read_to_string(path).map_err(|source| FmError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ClaudeConfig =
        serde_json::from_str(&text).map_err(|source| FmError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(
        path = %path.display(),
        server_count = config.mcp_servers.len(),
        "Loaded Claude config"
    );
    Ok(config.mcp_servers)
}

/// Read every existing VS Code settings candidate and merge them in order.
///
/// Later files override same-named servers from earlier ones. Missing files
/// are skipped silently; unreadable or unparsable files are logged and skipped.
pub fn read_secondary(paths: &[PathBuf]) -> ServerSpecs {
    let mut combined = ServerSpecs::new();

    for path in paths {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "VS Code config file not found");
            continue;
        }

        match read_secondary_file(path) {
            Ok(specs) => {
                tracing::debug!(
                    path = %path.display(),
                    server_count = specs.len(),
                    "Loaded VS Code config"
                );
                combined.merge(specs);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load VS Code config");
            }
        }
    }

    if !combined.is_empty() {
        tracing::debug!(
            server_count = combined.len(),
            "Loaded VS Code config with MCP servers"
        );
    }
    combined
}

fn read_secondary_file(path: &Path) -> FmResult<ServerSpecs> {
    let text = fs::read_to_string(path).map_err(|source| FmError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_secondary(&strip_line_comments(&text)).map_err(|source| FmError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode a comment-free VS Code settings document.
///
/// Falls back to a permissive `mcp.servers` lookup when the document does not
/// decode into [`VsCodeSettings`]; individual entries that fail are skipped.
pub fn parse_secondary(text: &str) -> Result<ServerSpecs, serde_json::Error> {
    match serde_json::from_str::<VsCodeSettings>(text) {
        Ok(settings) => Ok(settings.mcp.map(|mcp| mcp.servers).unwrap_or_default()),
        Err(e) => {
            tracing::debug!(error = %e, "Full settings decode failed, extracting mcp.servers");
            extract_servers(text)
        }
    }
}

fn extract_servers(text: &str) -> Result<ServerSpecs, serde_json::Error> {
    let document: serde_json::Value = serde_json::from_str(text)?;
    let Some(servers) = document
        .get("mcp")
        .and_then(|mcp| mcp.get("servers"))
        .and_then(serde_json::Value::as_object)
    else {
        return Ok(ServerSpecs::new());
    };

    let mut specs = ServerSpecs::new();
    for (name, entry) in servers {
        if !entry.is_object() {
            continue;
        }
        match ServerLaunchSpec::deserialize(entry) {
            Ok(spec) => {
                specs.insert(name.clone(), spec);
            }
            Err(e) => {
                tracing::warn!(server = %name, error = %e, "Failed to parse MCP server config");
            }
        }
    }
    Ok(specs)
}

/// Drop every line whose trimmed content starts with `//`.
///
/// This is a line-prefix heuristic, not a JSONC tokenizer: block comments and
/// trailing `//` comments are left in place, and a line inside a multi-line
/// string value that happens to start with `//` is removed.
pub fn strip_line_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(command: &str) -> ServerLaunchSpec {
        ServerLaunchSpec {
            kind: None,
            command: command.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    #[test]
    fn test_strip_line_comments() {
        let text = "{\n  // a comment\n\t// another\n  \"a\": 1 // trailing stays\n}";
        assert_eq!(strip_line_comments(text), "{\n  \"a\": 1 // trailing stays\n}");
    }

    #[test]
    fn test_strip_line_comments_mangles_leading_marker_in_string() {
        // Known limitation: the second line belongs to a string value.
        let text = "{\"a\": \"x\n// y\"}";
        assert_eq!(strip_line_comments(text), "{\"a\": \"x");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut specs = ServerSpecs::new();
        specs.insert("a", spec("one"));
        specs.insert("b", spec("two"));
        let replaced = specs.insert("a", spec("three"));

        assert_eq!(replaced, Some(spec("one")));
        assert_eq!(specs.names(), vec!["a", "b"]);
        assert_eq!(specs.get("a").map(|s| s.command.as_str()), Some("three"));
    }

    #[test]
    fn test_deserialize_keeps_declaration_order() {
        let config: ClaudeConfig = serde_json::from_str(
            r#"{"mcpServers": {
                "zeta": {"command": "z", "args": []},
                "alpha": {"command": "a", "args": ["--x"], "env": {"K": "V"}},
                "mid": {"type": "stdio", "command": "m"}
            }}"#,
        )
        .unwrap();

        let specs = config.mcp_servers;
        assert_eq!(specs.names(), vec!["zeta", "alpha", "mid"]);
        let alpha = specs.get("alpha").unwrap();
        assert_eq!(alpha.args, vec!["--x"]);
        assert_eq!(alpha.env.get("K").map(String::as_str), Some("V"));
        assert_eq!(specs.get("mid").unwrap().kind.as_deref(), Some("stdio"));
    }

    #[test]
    fn test_primary_rejects_bad_entry() {
        let result = serde_json::from_str::<ClaudeConfig>(
            r#"{"mcpServers": {"bad": {"args": []}}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_secondary_ignores_unrelated_keys() {
        let specs = parse_secondary(
            r#"{"editor.fontSize": 14, "mcp": {"servers": {"git": {"command": "uvx", "args": ["mcp-server-git"]}}}}"#,
        )
        .unwrap();
        assert_eq!(specs.names(), vec!["git"]);
    }

    #[test]
    fn test_secondary_falls_back_and_skips_bad_entries() {
        let specs = parse_secondary(
            r#"{"mcp": {"servers": {
                "good": {"command": "node", "args": ["server.js"]},
                "bad": {"args": ["missing command"]},
                "weird": 42
            }}}"#,
        )
        .unwrap();
        assert_eq!(specs.names(), vec!["good"]);
    }

    #[test]
    fn test_secondary_without_mcp_section() {
        let specs = parse_secondary(r#"{"mcp": "disabled"}"#).unwrap();
        assert!(specs.is_empty());
        let specs = parse_secondary(r#"{"files.autoSave": "off"}"#).unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn test_secondary_invalid_json_is_error() {
        assert!(parse_secondary("{ not json").is_err());
    }

    #[test]
    fn test_with_overrides() {
        let paths = ConfigPaths {
            primary: Some(PathBuf::from("/a")),
            secondary: vec![PathBuf::from("/b")],
        };
        let same = paths.clone().with_overrides(None, Vec::new());
        assert_eq!(same, paths);

        let changed = paths.with_overrides(Some(PathBuf::from("/c")), vec![PathBuf::from("/d")]);
        assert_eq!(changed.primary, Some(PathBuf::from("/c")));
        assert_eq!(changed.secondary, vec![PathBuf::from("/d")]);
    }
}
