//! Seeding: load a dataset file into a lazy frame.

use crate::cli::FileFormat;
use crate::store::FrameStore;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use polars::prelude::*;
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Overrides extension-based detection.
    pub format: Option<FileFormat>,
    pub has_header: Option<bool>,
    pub delimiter: Option<u8>,
}

/// Load `path` as a lazy frame. Parquet, CSV and JSON lines are scanned lazily;
/// JSON documents and compressed delimited files are read eagerly. Only CSV and
/// TSV may be `.gz`/`.zst` compressed.
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<LazyFrame> {
    if !path.exists() {
        return Err(eyre!("Dataset not found: {}", path.display()));
    }
    let format = options
        .format
        .or_else(|| FileFormat::from_path(path))
        .ok_or_else(|| {
            eyre!(
                "Cannot detect the format of {}. Use --format to choose one.",
                path.display()
            )
        })?;

    if is_compressed(path) && !matches!(format, FileFormat::Csv | FileFormat::Tsv) {
        return Err(eyre!(
            "Compressed {:?} input is not supported: {}. Decompress it first; only CSV and TSV can be read compressed.",
            format,
            path.display()
        ));
    }

    let lf = match format {
        FileFormat::Parquet => {
            LazyFrame::scan_parquet(PlPath::Local(Arc::from(path)), Default::default())?
        }
        FileFormat::Csv => load_delimited(path, options.delimiter.unwrap_or(b','), options)?,
        FileFormat::Tsv => load_delimited(path, options.delimiter.unwrap_or(b'\t'), options)?,
        FileFormat::Jsonl => LazyJsonLineReader::new(PlPath::Local(Arc::from(path))).finish()?,
        FileFormat::Json => load_json(path)?,
    };
    Ok(lf)
}

/// Load a dataset and wrap it in a store.
pub fn load_store(path: &Path, options: &LoadOptions) -> Result<FrameStore> {
    let lf = load_dataset(path, options)
        .wrap_err_with(|| format!("Failed to load {}", path.display()))?;
    let store = FrameStore::new(lf)?;
    info!(
        path = %path.display(),
        fields = store.fields().len(),
        "dataset loaded"
    );
    Ok(store)
}

fn load_delimited(path: &Path, delimiter: u8, options: &LoadOptions) -> Result<LazyFrame> {
    let has_header = options.has_header.unwrap_or(true);
    if is_compressed(path) {
        let df = CsvReadOptions::default()
            .with_has_header(has_header)
            .map_parse_options(|opts| opts.with_separator(delimiter))
            .try_into_reader_with_file_path(Some(path.into()))?
            .finish()?;
        return Ok(df.lazy());
    }
    let lf = LazyCsvReader::new(PlPath::Local(Arc::from(path)))
        .with_separator(delimiter)
        .with_has_header(has_header)
        .finish()?;
    Ok(lf)
}

fn is_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "gz" | "zst" | "zstd"))
        .unwrap_or(false)
}

/// Read a JSON array of records. A top-level object holding a single array
/// (`{"olympicWinners": [...]}`) is unwrapped to that array.
fn load_json(path: &Path) -> Result<LazyFrame> {
    let bytes = std::fs::read(path)?;
    let records = match serde_json::from_slice::<Value>(&bytes)? {
        Value::Array(_) => bytes,
        Value::Object(map) => {
            let mut arrays = map.into_iter().filter(|(_, v)| v.is_array());
            match (arrays.next(), arrays.next()) {
                (Some((_, array)), None) => serde_json::to_vec(&array)?,
                _ => {
                    return Err(eyre!(
                        "{} is a JSON object; expected an array of records or an object holding exactly one array",
                        path.display()
                    ))
                }
            }
        }
        _ => return Err(eyre!("{} does not hold JSON records", path.display())),
    };
    let df = JsonReader::new(Cursor::new(records))
        .with_json_format(JsonFormat::Json)
        .finish()?;
    Ok(df.lazy())
}
