//! Configuration system for the to-do server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/todo-web/config.toml`)
//! 4. Compiled defaults
//!
//! The database settings have no compiled defaults. Selecting the postgres
//! backend without all five of them is a configuration error.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The postgres backend was selected but a connection setting is absent.
    #[error("missing database setting {env} (set --{flag}, {env}, or [database].{key})")]
    MissingDatabaseSetting {
        /// Environment variable name.
        env: &'static str,
        /// CLI flag name without the leading dashes.
        flag: &'static str,
        /// Key in the `[database]` table of the config file.
        key: &'static str,
    },

    /// The database port is not a number in `0..=65535`.
    #[error("invalid database port {value:?} (DB_PORT / --db-port): {source}")]
    InvalidDatabasePort {
        /// Value as given.
        value: String,
        /// Parse failure.
        source: std::num::ParseIntError,
    },
}

/// Which storage backend to run with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local list, lost on restart.
    #[default]
    Memory,
    /// `todos` table in a PostgreSQL database.
    Postgres,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    database: DatabaseFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    backend: Option<BackendKind>,
    template_path: Option<PathBuf>,
}

/// `[database]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct DatabaseFileConfig {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    name: Option<String>,
    max_connections: Option<u32>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the to-do server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Browser to-do list server")]
pub struct CliArgs {
    /// Address to bind the HTTP server to.
    #[arg(short, long, env = "TODO_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/todo-web/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Storage backend.
    #[arg(long, value_enum, env = "TODO_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Page template file. The built-in template is used when unset.
    #[arg(long, env = "TODO_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Database host (postgres backend).
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Database port (postgres backend). Checked only when postgres is
    /// selected.
    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<String>,

    /// Database user (postgres backend).
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password (postgres backend).
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name (postgres backend).
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Maximum pooled database connections.
    #[arg(long)]
    pub db_max_connections: Option<u32>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TODO_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stdout.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Default pool size for the postgres backend.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connection settings for the postgres backend.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub name: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Resolved storage backend, carrying what it needs to start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-memory list.
    #[default]
    Memory,
    /// PostgreSQL table reached with these settings.
    Postgres(DatabaseSettings),
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Storage backend for this deployment.
    pub backend: StoreBackend,
    /// Page template file, or `None` for the built-in template.
    pub template_path: Option<PathBuf>,
    /// Log level filter string.
    pub log_level: String,
    /// Log file, or `None` to log to stdout.
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            backend: StoreBackend::Memory,
            template_path: None,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if the postgres backend is selected without complete
    /// connection settings.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ServerConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let kind = cli.backend.or(file.server.backend).unwrap_or_default();
        let backend = match kind {
            BackendKind::Memory => StoreBackend::Memory,
            BackendKind::Postgres => {
                StoreBackend::Postgres(resolve_database(cli, &file.database)?)
            }
        };

        Ok(Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            backend,
            template_path: cli
                .template
                .clone()
                .or_else(|| file.server.template_path.clone()),
            log_level: cli.log_level.clone(),
            log_file: cli.log_file.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Merge database settings from CLI and file, requiring every connection field.
fn resolve_database(
    cli: &CliArgs,
    file: &DatabaseFileConfig,
) -> Result<DatabaseSettings, ConfigError> {
    let host = cli.db_host.clone().or_else(|| file.host.clone());
    let port = match cli.db_port.as_deref() {
        Some(value) => Some(parse_port(value)?),
        None => file.port,
    };
    let user = cli.db_user.clone().or_else(|| file.user.clone());
    let password = cli.db_password.clone().or_else(|| file.password.clone());
    let name = cli.db_name.clone().or_else(|| file.name.clone());

    Ok(DatabaseSettings {
        host: required(host, "DB_HOST", "db-host", "host")?,
        port: required(port, "DB_PORT", "db-port", "port")?,
        user: required(user, "DB_USER", "db-user", "user")?,
        password: required(password, "DB_PASSWORD", "db-password", "password")?,
        name: required(name, "DB_NAME", "db-name", "name")?,
        max_connections: cli
            .db_max_connections
            .or(file.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    })
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidDatabasePort {
            value: value.to_string(),
            source,
        })
}

fn required<T>(
    value: Option<T>,
    env: &'static str,
    flag: &'static str,
    key: &'static str,
) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingDatabaseSetting { env, flag, key })
}

/// Load and parse a TOML config file.
///
/// An explicit path must exist. The default location is optional.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("todo-web").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
