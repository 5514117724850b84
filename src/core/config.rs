//! Configuration management.
//!
//! One [`Config`] serves both binaries: the server reads the `server`,
//! `database` and `transport` sections, the console reads `client`,
//! `agent` and `llm`. Values come from defaults overridden by environment
//! variables (a `.env` file is loaded first when present).

use super::error::{Error, Result};
use super::transport::{Endpoint, TransportConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default system prompt given to the reasoning engine.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert data assistant with access to a SQL database.

Available tools:
1. list_tables() - See all tables in the database
2. describe_table(table_name) - Examine table schema and columns
3. execute_sql(query) - Run any SQL query

Best practices:
- Always explore the database structure first if unsure about table names or columns
- Use describe_table before writing complex queries to understand the schema
- Write efficient queries with appropriate JOINs and WHERE clauses
- For analysis tasks, break down complex requirements into multiple queries
- Present results clearly with explanations of what the data shows

You can execute both read and write operations.";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Database connection used by the tool server.
    pub database: DatabaseConfig,

    /// How the console reaches the tool server.
    pub client: ClientConfig,

    /// Conversation loop limits.
    pub agent: AgentConfig,

    /// Reasoning engine endpoint and credentials.
    pub llm: LlmConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

/// SQLite connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,

    /// Open the database read-only.
    pub read_only: bool,

    /// Maximum rows returned by one `execute_sql` call.
    pub max_rows: usize,

    /// How long SQLite waits on a locked database.
    pub busy_timeout: Duration,
}

/// Client proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server executable spawned by the stdio transport.
    pub server_command: String,

    /// Arguments for the server executable.
    pub server_args: Vec<String>,

    /// Per-call timeout.
    pub call_timeout: Duration,
}

/// Conversation orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Engine round-trips allowed per user turn.
    pub max_round_trips: usize,

    /// Maximum number of history entries, system prompt included.
    pub max_history: usize,

    /// Run the calls of one batch concurrently.
    pub parallel_tool_calls: bool,

    /// First entry of every conversation.
    pub system_prompt: String,
}

/// Reasoning engine settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key for the OpenAI-compatible endpoint.
    pub api_key: Option<String>,

    /// Model name.
    pub model: String,

    /// Base URL, without the trailing `/chat/completions`.
    pub base_url: String,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database.db"),
            read_only: false,
            max_rows: 1000,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_command: "sql_mcp_server".to_string(),
            server_args: Vec::new(),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_round_trips: 10,
            max_history: 50,
            parallel_tool_calls: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "sql-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
            transport: TransportConfig::default(),
            database: DatabaseConfig::default(),
            client: ClientConfig::default(),
            agent: AgentConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Parse an environment variable, falling back to `default` when it is
/// unset or unparsable.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring invalid {}={:?}: {}", key, raw, e);
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the server configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_SERVER_NAME`, `MCP_DB_PATH`.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load the console configuration: same variables, quieter logging by
    /// default because the console shares the terminal with the user.
    pub fn console_from_env() -> Self {
        let mut base = Self::default();
        base.logging.level = "warn".to_string();
        base.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        dotenvy::dotenv().ok();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            self.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            self.logging.level = level;
        }

        // Load transport configuration from environment
        self.transport = TransportConfig::from_env();

        // Database
        if let Ok(path) = std::env::var("MCP_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        self.database.read_only = env_parse("MCP_DB_READ_ONLY", self.database.read_only);
        self.database.max_rows = env_parse("MCP_DB_MAX_ROWS", self.database.max_rows);
        if self.database.max_rows == 0 {
            let fallback = DatabaseConfig::default().max_rows;
            warn!("Ignoring MCP_DB_MAX_ROWS=0, using {}", fallback);
            self.database.max_rows = fallback;
        }
        self.database.busy_timeout = Duration::from_millis(env_parse(
            "MCP_DB_BUSY_TIMEOUT_MS",
            self.database.busy_timeout.as_millis() as u64,
        ));

        // Client proxy
        if let Ok(command) = std::env::var("MCP_SERVER_COMMAND") {
            self.client.server_command = command;
        }
        if let Ok(args) = std::env::var("MCP_SERVER_ARGS") {
            self.client.server_args = args.split_whitespace().map(String::from).collect();
        }
        self.client.call_timeout = Duration::from_secs(env_parse(
            "MCP_CALL_TIMEOUT_SECS",
            self.client.call_timeout.as_secs(),
        ));

        // Orchestrator
        self.agent.max_round_trips = env_parse("MCP_MAX_ROUND_TRIPS", self.agent.max_round_trips);
        self.agent.max_history = env_parse("MAX_CONVERSATION_HISTORY", self.agent.max_history);
        self.agent.parallel_tool_calls =
            env_parse("MCP_PARALLEL_TOOL_CALLS", self.agent.parallel_tool_calls);

        // Reasoning engine
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            self.llm.api_key = Some(api_key);
            info!("OpenAI API key loaded from environment");
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }

        self
    }

    /// Check the settings the console cannot run without.
    pub fn validate_agent(&self) -> Result<()> {
        match self.llm.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(Error::config(
                    "OpenAI API key missing - please set the OPENAI_API_KEY environment \
                     variable in your .env file or system environment.",
                ));
            }
        }

        if self.agent.max_history < 2 {
            return Err(Error::config(format!(
                "MAX_CONVERSATION_HISTORY must be at least 2, got {}",
                self.agent.max_history
            )));
        }

        if self.agent.max_round_trips == 0 {
            return Err(Error::config("MCP_MAX_ROUND_TRIPS must be at least 1"));
        }

        if self.client.call_timeout.is_zero() {
            return Err(Error::config("MCP_CALL_TIMEOUT_SECS must be at least 1"));
        }

        Ok(())
    }

    /// Endpoint the console uses to reach the tool server.
    ///
    /// A spawned server inherits the console's environment; its log level
    /// is pinned to the console's so both stay equally quiet.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            transport: self.transport.clone(),
            server_command: self.client.server_command.clone(),
            server_args: self.client.server_args.clone(),
            server_env: vec![("MCP_LOG_LEVEL".to_string(), self.logging.level.clone())],
        }
    }
}
