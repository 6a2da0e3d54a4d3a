//! Common utilities for stratum-cmd

use anyhow::{Context, Result};
use std::{path::Path, sync::Arc};
use stratum_date_term::DateTerm;
use stratum_dictionary::DictKey;
use stratum_io::{FileReader, MmapReader, ReadAt};

/// Checks if a file exists and is readable
pub fn validate_file_exists(path: &str) -> Result<()> {
    let file_path = Path::new(path);
    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }
    if !file_path.is_file() {
        anyhow::bail!("Path is not a file: {}", path);
    }
    Ok(())
}

/// Formats file size in human-readable format
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Opens a file as a positional read source, either paged or memory-mapped.
pub fn open_source(path: impl AsRef<Path>, mmap: bool) -> Result<Arc<dyn ReadAt>> {
    let path = path.as_ref();
    let source: Arc<dyn ReadAt> = if mmap {
        Arc::new(MmapReader::open(path).with_context(|| format!("Failed to map {}", path.display()))?)
    } else {
        Arc::new(FileReader::open(path).with_context(|| format!("Failed to open {}", path.display()))?)
    };
    Ok(source)
}

/// Parses a date bound given either as epoch milliseconds or as `y-m-d-h-mi-s-ms`.
pub fn parse_date(value: &str) -> Result<DateTerm> {
    if let Ok(millis) = value.trim().parse::<i64>() {
        return DateTerm::from_timestamp_millis(millis)
            .with_context(|| format!("Timestamp {millis} is not representable"));
    }
    Ok(value.parse::<DateTerm>()?)
}

/// Parses a dictionary key; `null` denotes the null term.
pub fn parse_key(value: &str) -> Result<DictKey> {
    if value.eq_ignore_ascii_case("null") {
        return Ok(DictKey::Null);
    }
    let key = match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    }
    .with_context(|| format!("Invalid key: {value}"))?;
    Ok(DictKey::Term(key))
}
