use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use gridrows::cli::{Args, Command};
use gridrows::config::{AppConfig, ConfigManager};
use gridrows::source::{load_store, LoadOptions};
use gridrows::{
    logging, FrameStore, LocalTransport, RowsRequest, ServerSideDatasource, Translator, Transport,
    APP_NAME,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

fn load_options(args: &Args, config: &AppConfig) -> Result<LoadOptions> {
    let delimiter = match args.delimiter.or(config.data.delimiter) {
        Some(c) => Some(u8::try_from(c).map_err(|_| eyre!("Delimiter must be an ASCII character"))?),
        None => None,
    };
    Ok(LoadOptions {
        format: args.format.or_else(|| config.data_format()),
        has_header: if args.no_header {
            Some(false)
        } else {
            config.data.has_header
        },
        delimiter,
    })
}

fn dataset_path(path: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    path.or_else(|| config.data.path.clone()).ok_or_else(|| {
        eyre!("No dataset given. Pass PATH or set [data] path in the config file.")
    })
}

fn build_translator(path: &Path, args: &Args, config: &AppConfig) -> Result<Translator<FrameStore>> {
    let store = load_store(path, &load_options(args, config)?)?;
    Ok(Translator::new(store)
        .with_max_window_rows(config.paging.max_window_rows)
        .with_pipeline_logging(config.debug.log_pipelines || args.debug))
}

/// Transport to a running server, or to a dataset loaded in this process.
/// With neither an endpoint nor a dataset, `[client] endpoint` is used.
fn transport(
    endpoint: Option<String>,
    path: Option<PathBuf>,
    args: &Args,
    config: &AppConfig,
) -> Result<Arc<dyn Transport>> {
    if let Some(endpoint) = endpoint {
        return http_transport(&endpoint, config);
    }
    match path.or_else(|| config.data.path.clone()) {
        Some(path) => {
            let translator = build_translator(&path, args, config)?;
            Ok(Arc::new(LocalTransport::new(Arc::new(translator))))
        }
        None => {
            info!(endpoint = %config.client.endpoint, "no dataset given, using configured endpoint");
            http_transport(&config.client.endpoint, config)
        }
    }
}

#[cfg(feature = "http")]
fn http_transport(endpoint: &str, config: &AppConfig) -> Result<Arc<dyn Transport>> {
    let timeout = std::time::Duration::from_secs(config.client.timeout_secs);
    Ok(Arc::new(gridrows::http::HttpTransport::with_timeout(
        endpoint, timeout,
    )))
}

#[cfg(not(feature = "http"))]
fn http_transport(_endpoint: &str, _config: &AppConfig) -> Result<Arc<dyn Transport>> {
    Err(eyre!("This build does not include the HTTP client (feature \"http\")"))
}

fn read_request(path: Option<&Path>) -> Result<RowsRequest> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read request file {}: {}", path.display(), e))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    if text.trim().is_empty() {
        return Ok(RowsRequest::default());
    }
    serde_json::from_str(&text).map_err(|e| eyre!("Invalid request JSON: {}", e))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[cfg(feature = "server")]
fn serve(
    path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    args: &Args,
    config: &AppConfig,
) -> Result<()> {
    use gridrows::server::{self, ServerState};
    use std::net::ToSocketAddrs;

    let path = dataset_path(path, config)?;
    let translator = build_translator(&path, args, config)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = (host.as_str(), port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| eyre!("Cannot resolve {}:{}", host, port))?;

    let runtime = tokio::runtime::Runtime::new()?;
    let state = ServerState::with_allowed_origins(translator, config.server.allowed_origins.clone());
    runtime.block_on(server::serve(state, addr))
}

#[cfg(not(feature = "server"))]
fn serve(
    _path: Option<PathBuf>,
    _host: Option<String>,
    _port: Option<u16>,
    _args: &Args,
    _config: &AppConfig,
) -> Result<()> {
    Err(eyre!("This build does not include the server (feature \"server\")"))
}

fn run(args: &Args, config: &AppConfig) -> Result<()> {
    let datasource = |transport: Arc<dyn Transport>| {
        let datasource = ServerSideDatasource::new(transport);
        match config.paging.dataset_size {
            0 => datasource,
            size => datasource.with_dataset_size(size),
        }
    };

    match args.command.clone() {
        Command::Serve { path, host, port } => serve(path, host, port, args, config),
        Command::Query {
            path,
            request,
            endpoint,
            pretty,
        } => {
            let request = read_request(request.as_deref())?;
            let datasource = datasource(transport(endpoint, path, args, config)?);
            let page = datasource.fetch_row_window(&request)?;
            print_json(&page, pretty)
        }
        Command::Distinct {
            field,
            path,
            endpoint,
        } => {
            let datasource = datasource(transport(endpoint, path, args, config)?);
            let values = datasource.fetch_distinct_column_values(&field)?;
            print_json(&values, false)
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    match &args.config {
        Some(path) if !path.exists() => Err(eyre!("Config file not found: {}", path.display())),
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(APP_NAME),
    }
}

fn handle_early_exit_commands(args: &Args) -> Result<Option<()>> {
    if let Command::InitConfig { force } = args.command {
        let config_manager = ConfigManager::new(APP_NAME)?;
        let path = config_manager.write_default_config(force)?;
        println!("Configuration written to {}", path.display());
        return Ok(Some(()));
    }
    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();
    color_eyre::install()?;

    if let Some(()) = handle_early_exit_commands(&args)? {
        return Ok(());
    }

    let config = load_config(&args)?;
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    logging::init(&level, args.debug);

    run(&args, &config)
}
