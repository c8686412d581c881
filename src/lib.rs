//! Server-side row windows for block-loaded data grids.
//!
//! A grid asks for rows `[startRow, endRow)` at some depth of its grouping
//! hierarchy, with a sort model and a filter model. [`pipeline::translate`]
//! turns that request into filter, sort, group-narrowing and group-collapse
//! stages; a [`store::RowStore`] runs them; the [`translator::Translator`]
//! pages the result and computes `lastRow`. On the client side,
//! [`datasource::ServerSideDatasource`] builds the requests and sends them
//! through a [`datasource::Transport`].

pub mod cli;
pub mod config;
pub mod datasource;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod logging;
pub mod model;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod source;
pub mod store;
pub mod translator;

pub use cli::Args;
pub use config::{AppConfig, ConfigManager};
pub use datasource::{
    GetRowsParams, LocalTransport, RowCount, RowsCallback, ServerSideDatasource, Transport,
};
pub use error::{GridError, GridResult};
pub use model::{RowsRequest, RowsResponse, Scalar};
pub use store::{FrameStore, RowStore};
pub use translator::Translator;

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "gridrows";
