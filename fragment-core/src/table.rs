//! Reading and writing the translation tables.
//!
//! Tables are CSV with a header row. A table source is either a local path or
//! an `http(s)://` URL, typically a published spreadsheet export.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::{read_file, Result, ToolError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch the raw bytes of a table from a path or URL.
pub fn load_source(source: &str) -> Result<Vec<u8>> {
    if is_remote(source) {
        tracing::info!(url = source, "downloading table");
        let response = reqwest::blocking::get(source)?.error_for_status()?;
        return Ok(response.bytes()?.to_vec());
    }
    read_file(Path::new(source))
}

pub fn read_rows<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn load_rows<T: DeserializeOwned>(source: &str) -> Result<Vec<T>> {
    let bytes = load_source(source)?;
    read_rows(&bytes).map_err(|err| match err {
        ToolError::Csv(inner) => ToolError::Table {
            source_name: source.to_string(),
            source: inner,
        },
        other => other,
    })
}

/// A row type with a fixed header, written even when a table has no rows.
pub trait Record: Serialize {
    const COLUMNS: &'static [&'static str];
}

pub fn write_rows<T: Record>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(T::COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
