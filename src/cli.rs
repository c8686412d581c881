//! Command-line definitions, shared with the build script through `gridrows-cli`.

pub use gridrows_cli::{Args, Command, FileFormat};
