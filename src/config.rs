use crate::cli::FileFormat;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate the default configuration with every field commented out and documented
    pub fn generate_default_config(&self) -> Result<String> {
        let toml_str = toml::to_string_pretty(&AppConfig::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        Ok(comment_all_fields(&toml_str, &collect_all_comments()))
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path(CONFIG_FILE);

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config()?)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub server: ServerConfig,
    pub data: DataConfig,
    pub paging: PagingConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DataConfig {
    pub path: Option<PathBuf>,
    pub format: Option<String>,
    pub has_header: Option<bool>,
    pub delimiter: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PagingConfig {
    pub dataset_size: usize,
    pub max_window_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub log_pipelines: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            server: ServerConfig::default(),
            data: DataConfig::default(),
            paging: PagingConfig::default(),
            client: ClientConfig::default(),
            logging: LoggingConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            allowed_origins: vec!["http://localhost:4200".to_string()],
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from(&config_manager.config_path(CONFIG_FILE))
    }

    /// Load defaults merged with the file at `path`, if it exists
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = AppConfig::default();

        if path.exists() {
            config.merge(Self::read_file(path)?);
        }

        config.validate().map_err(|e| {
            eyre!("Invalid configuration in {}: {}", path.display(), e)
        })?;

        Ok(config)
    }

    fn read_file(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            eyre!("Failed to read config file at {}: {}", path.display(), e)
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!("Failed to parse config file at {}: {}", path.display(), e)
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.server.merge(other.server);
        self.data.merge(other.data);
        self.paging.merge(other.paging);
        self.client.merge(other.client);
        self.logging.merge(other.logging);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(eyre!("server.host must not be empty"));
        }

        for origin in &self.server.allowed_origins {
            let valid = origin == "*"
                || ((origin.starts_with("http://") || origin.starts_with("https://"))
                    && !origin.ends_with('/')
                    && origin.chars().all(|c| c.is_ascii_graphic()));
            if !valid {
                return Err(eyre!(
                    "Invalid server.allowed_origins entry: {}. Use \"*\" or an origin like http://localhost:4200",
                    origin
                ));
            }
        }

        if let Some(format) = &self.data.format {
            if FileFormat::from_config_name(format).is_none() {
                return Err(eyre!(
                    "Invalid data.format: {}. Must be one of parquet, csv, tsv, json, jsonl",
                    format
                ));
            }
        }

        if let Some(delimiter) = self.data.delimiter {
            if !delimiter.is_ascii() {
                return Err(eyre!("data.delimiter must be an ASCII character"));
            }
        }

        if !(self.client.endpoint.starts_with("http://")
            || self.client.endpoint.starts_with("https://"))
        {
            return Err(eyre!(
                "Invalid client.endpoint: {}. Must start with http:// or https://",
                self.client.endpoint
            ));
        }

        if self.client.timeout_secs == 0 {
            return Err(eyre!("client.timeout_secs must be greater than 0"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(eyre!(
                "Invalid logging.level: {}. Must be one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }

    /// Dataset format from `[data] format`, if set and valid
    pub fn data_format(&self) -> Option<FileFormat> {
        self.data
            .format
            .as_deref()
            .and_then(FileFormat::from_config_name)
    }
}

// Merge implementations for each config section
impl ServerConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ServerConfig::default();
        if other.host != default.host {
            self.host = other.host;
        }
        if other.port != default.port {
            self.port = other.port;
        }
        if other.allowed_origins != default.allowed_origins {
            self.allowed_origins = other.allowed_origins;
        }
    }
}

impl DataConfig {
    pub fn merge(&mut self, other: Self) {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.format.is_some() {
            self.format = other.format;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
    }
}

impl PagingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PagingConfig::default();
        if other.dataset_size != default.dataset_size {
            self.dataset_size = other.dataset_size;
        }
        if other.max_window_rows != default.max_window_rows {
            self.max_window_rows = other.max_window_rows;
        }
    }
}

impl ClientConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ClientConfig::default();
        if other.endpoint != default.endpoint {
            self.endpoint = other.endpoint;
        }
        if other.timeout_secs != default.timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.level != LoggingConfig::default().level {
            self.level = other.level;
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.log_pipelines {
            self.log_pipelines = true;
        }
    }
}

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "server",
        "# ============================================================================\n# HTTP Server (gridrows serve)\n# ============================================================================",
    ),
    (
        "data",
        "# ============================================================================\n# Dataset\n# ============================================================================\n# Used when no PATH is given on the command line.",
    ),
    (
        "paging",
        "# ============================================================================\n# Row Windows\n# ============================================================================",
    ),
    (
        "client",
        "# ============================================================================\n# Client (query/distinct --endpoint)\n# ============================================================================",
    ),
    (
        "logging",
        "# ============================================================================\n# Logging\n# ============================================================================",
    ),
    (
        "debug",
        "# ============================================================================\n# Debug\n# ============================================================================",
    ),
];

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SERVER_COMMENTS: &[(&str, &str)] = &[
    ("host", "Address to bind"),
    ("port", "Port to listen on"),
    (
        "allowed_origins",
        "Browser origins allowed to call the server cross-origin (CORS)\n[\"*\"] allows any origin, [] disables CORS",
    ),
];

const DATA_COMMENTS: &[(&str, &str)] = &[
    ("path", "Dataset file (CSV, TSV, JSON, JSON lines or Parquet)"),
    (
        "format",
        "Force the dataset format: parquet, csv, tsv, json, jsonl\nIf not specified, the format is detected from the file extension",
    ),
    ("has_header", "Whether delimited files have a header row (default: true)"),
    ("delimiter", "Field delimiter for delimited files, e.g. \";\""),
];

const PAGING_COMMENTS: &[(&str, &str)] = &[
    (
        "dataset_size",
        "endRow the client sends when the grid leaves it open\n0 = let the server use the dataset's row count",
    ),
    (
        "max_window_rows",
        "Largest window (endRow - startRow) the server accepts\n0 = unlimited",
    ),
];

const CLIENT_COMMENTS: &[(&str, &str)] = &[
    ("endpoint", "Base URL of a running gridrows server"),
    ("timeout_secs", "Request timeout in seconds"),
];

const LOGGING_COMMENTS: &[(&str, &str)] = &[(
    "level",
    "Log level: error, warn, info, debug, trace\nRUST_LOG overrides this when set",
)];

const DEBUG_COMMENTS: &[(&str, &str)] = &[(
    "log_pipelines",
    "Log every translated query pipeline at info level",
)];

/// Option fields that are not serialized when None but should appear in the template
const OPTION_FIELDS: &[&str] = &["data.path", "data.format", "data.has_header", "data.delimiter"];

fn collect_all_comments() -> HashMap<String, String> {
    let sections: &[(&str, &[(&str, &str)])] = &[
        ("server", SERVER_COMMENTS),
        ("data", DATA_COMMENTS),
        ("paging", PAGING_COMMENTS),
        ("client", CLIENT_COMMENTS),
        ("logging", LOGGING_COMMENTS),
        ("debug", DEBUG_COMMENTS),
    ];

    let mut comments = HashMap::new();
    for (field, comment) in APP_COMMENTS {
        comments.insert(field.to_string(), comment.to_string());
    }
    for (section, fields) in sections {
        for (field, comment) in fields.iter() {
            comments.insert(format!("{}.{}", section, field), comment.to_string());
        }
    }
    comments
}

/// Comment out all fields in the TOML and add comments.
/// Option fields missing from the TOML are added as `# field = ...` placeholders.
fn comment_all_fields(toml: &str, comments: &HashMap<String, String>) -> String {
    let mut result = String::new();
    result.push_str("# gridrows configuration file\n");
    result.push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
    result.push('\n');

    let mut current_section = String::new();
    let mut seen_fields: HashSet<String> = HashSet::new();

    for line in toml.lines() {
        if let Some(section) = extract_section_name(line) {
            flush_missing_options(&mut result, &current_section, comments, &seen_fields);
            current_section = section;

            if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == current_section) {
                result.push_str(header);
                result.push('\n');
            }
            result.push_str("# ");
            result.push_str(line);
            result.push('\n');
            continue;
        }

        if let Some(field_path) = extract_field_path(line, &current_section) {
            push_comment(&mut result, comments.get(&field_path));
            seen_fields.insert(field_path);
            result.push_str("# ");
            result.push_str(line);
            result.push('\n');
        } else if line.trim().is_empty() {
            result.push_str(line);
            result.push('\n');
        } else {
            // Continuation of a multi-line array value
            result.push_str("# ");
            result.push_str(line);
            result.push('\n');
        }
    }
    flush_missing_options(&mut result, &current_section, comments, &seen_fields);

    result
}

fn flush_missing_options(
    result: &mut String,
    section: &str,
    comments: &HashMap<String, String>,
    seen_fields: &HashSet<String>,
) {
    let prefix = format!("{}.", section);
    for path in OPTION_FIELDS {
        if let Some(field) = path.strip_prefix(&prefix) {
            if !seen_fields.contains(*path) {
                push_comment(result, comments.get(*path));
                result.push_str(&format!("# {} = ...\n", field));
            }
        }
    }
}

fn push_comment(result: &mut String, comment: Option<&String>) {
    if let Some(comment) = comment {
        for comment_line in comment.lines() {
            result.push_str("# ");
            result.push_str(comment_line);
            result.push('\n');
        }
    }
}

fn extract_section_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        Some(trimmed[1..trimmed.len() - 1].to_string())
    } else {
        None
    }
}

fn extract_field_path(line: &str, section: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (field, _) = trimmed.split_once('=')?;
    let field = field.trim();
    if section.is_empty() {
        Some(field.to_string())
    } else {
        Some(format!("{}.{}", section, field))
    }
}
