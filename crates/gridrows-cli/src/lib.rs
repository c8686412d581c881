//! Shared CLI definitions for gridrows.
//!
//! Used by the main application and by the build script (manpage).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// File format for dataset files (used to bypass extension-based detection).
/// When `--format` is not specified, format is auto-detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Parquet columnar format
    Parquet,
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// JSON array format, or an object holding a single array
    Json,
    /// JSON Lines / NDJSON (one JSON object per line)
    Jsonl,
}

impl FileFormat {
    /// Detect file format from path extension. A trailing `.gz` or `.zst` is looked through,
    /// so `winners.csv.gz` is detected as CSV. Returns None when the extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        if is_compression_extension(ext) {
            return path
                .file_stem()
                .map(Path::new)
                .and_then(|stem| stem.extension())
                .and_then(|e| e.to_str())
                .and_then(Self::from_extension);
        }
        Self::from_extension(ext)
    }

    /// Parse format from extension string (e.g. "parquet", "csv").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "parquet" => Some(Self::Parquet),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            _ => None,
        }
    }

    /// Parse the `format` value used in the config file.
    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::from_str(name, true).ok()
    }
}

fn is_compression_extension(ext: &str) -> bool {
    matches!(ext.to_lowercase().as_str(), "gz" | "zst" | "zstd")
}

/// Command-line arguments for gridrows
#[derive(Clone, Parser, Debug)]
#[command(
    name = "gridrows",
    version,
    about = "Serve block-loaded, grouped, sorted and filtered row windows to a data grid",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Read configuration from this file instead of ~/.config/gridrows/config.toml
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging and log every translated pipeline
    #[arg(long = "debug", global = true, action)]
    pub debug: bool,

    /// Log level filter (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Force dataset format (parquet, csv, tsv, json, jsonl).
    /// By default format is auto-detected from the file extension.
    #[arg(long = "format", global = true, value_enum)]
    pub format: Option<FileFormat>,

    /// Specify that a delimited dataset file has no header row
    #[arg(long = "no-header", global = true, action)]
    pub no_header: bool,

    /// Specify the delimiter to use when reading a delimited text file
    #[arg(long = "delimiter", global = true, value_name = "CHAR")]
    pub delimiter: Option<char>,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Command {
    /// Load a dataset and serve row windows over HTTP
    Serve {
        /// Dataset to serve (defaults to [data] path from the config file)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Address to bind (overrides [server] host)
        #[arg(long = "host")]
        host: Option<String>,

        /// Port to listen on (overrides [server] port)
        #[arg(long = "port", short = 'p')]
        port: Option<u16>,
    },

    /// Run one row request and print the JSON response
    Query {
        /// Dataset to query (defaults to [data] path from the config file)
        #[arg(value_name = "PATH", conflicts_with = "endpoint")]
        path: Option<PathBuf>,

        /// JSON request file. Reads the request from stdin when omitted.
        #[arg(long = "request", short = 'r', value_name = "FILE")]
        request: Option<PathBuf>,

        /// Send the request to a running server instead of loading a dataset
        #[arg(long = "endpoint", value_name = "URL")]
        endpoint: Option<String>,

        /// Pretty-print the response
        #[arg(long = "pretty", action)]
        pretty: bool,
    },

    /// Print the distinct values of one column, in ascending order
    Distinct {
        /// Column to list
        #[arg(value_name = "FIELD")]
        field: String,

        /// Dataset to query (defaults to [data] path from the config file)
        #[arg(value_name = "PATH", conflicts_with = "endpoint")]
        path: Option<PathBuf>,

        /// Ask a running server instead of loading a dataset
        #[arg(long = "endpoint", value_name = "URL")]
        endpoint: Option<String>,
    },

    /// Generate default configuration file at ~/.config/gridrows/config.toml
    InitConfig {
        /// Overwrite an existing config file
        #[arg(long = "force", action)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(
            FileFormat::from_path(Path::new("data.parquet")),
            Some(FileFormat::Parquet)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("data.csv")),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("data.NDJSON")),
            Some(FileFormat::Jsonl)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("olympic-winners.json")),
            Some(FileFormat::Json)
        );
        assert_eq!(FileFormat::from_path(Path::new("data")), None);
        assert_eq!(FileFormat::from_path(Path::new("data.xlsx")), None);
    }

    #[test]
    fn test_file_format_looks_through_compression() {
        assert_eq!(
            FileFormat::from_path(Path::new("winners.csv.gz")),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("winners.tsv.zst")),
            Some(FileFormat::Tsv)
        );
        assert_eq!(FileFormat::from_path(Path::new("winners.gz")), None);
    }

    #[test]
    fn test_file_format_from_config_name() {
        assert_eq!(FileFormat::from_config_name("JSONL"), Some(FileFormat::Jsonl));
        assert_eq!(FileFormat::from_config_name("csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_config_name("orc"), None);
    }

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::parse_from(["gridrows", "serve", "winners.json", "--port", "4000"]);
        match args.command {
            Command::Serve { path, host, port } => {
                assert_eq!(path, Some(PathBuf::from("winners.json")));
                assert_eq!(host, None);
                assert_eq!(port, Some(4000));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["gridrows", "--debug", "distinct", "sport", "winners.csv"]);
        assert!(args.debug);
        match args.command {
            Command::Distinct { field, path, .. } => {
                assert_eq!(field, "sport");
                assert_eq!(path, Some(PathBuf::from("winners.csv")));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["gridrows", "init-config", "--force"]);
        assert!(matches!(args.command, Command::InitConfig { force: true }));
    }

    #[test]
    fn test_query_path_conflicts_with_endpoint() {
        let result = Args::try_parse_from([
            "gridrows",
            "query",
            "winners.csv",
            "--endpoint",
            "http://localhost:4000",
        ]);
        assert!(result.is_err());
    }
}
