//! Inspect command implementation

use anyhow::Result;
use serde::Serialize;
use stratum_dictionary::{
    DictKey, DictionaryEntries, DictionaryKind, DictionaryOptions, ITEM_COUNT_PER_BLOCK, KeyWidth,
    open_dictionary,
};

use crate::utils::{format_size, open_source, validate_file_exists};

/// Number of entries printed at the highest verbosity.
const MAX_PRINTED_ENTRIES: usize = 1000;

#[derive(Serialize)]
struct InspectSummary {
    file_size: String,
    key_width: KeyWidth,
    item_count: u64,
    block_count: u32,
    data_len: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    null_value: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    block_index: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    entries: Vec<EntryInfo>,
}

#[derive(Serialize)]
struct EntryInfo {
    key: u64,
    value: u64,
}

pub fn run(verbose: u8, key_width: KeyWidth, dict_path: String) -> Result<()> {
    validate_file_exists(&dict_path)?;
    println!("Inspecting dictionary: {}", dict_path.as_str());

    let source = open_source(&dict_path, true)?;
    let dictionary = open_dictionary(
        DictionaryKind::Tiered,
        key_width,
        source,
        &DictionaryOptions::new(),
    )?;
    let layout = *dictionary.layout();

    let null_value = dictionary.lookup(DictKey::Null)?;
    let mut entries = Vec::new();
    let mut block_index = Vec::new();
    if verbose >= 1 {
        for (i, entry) in DictionaryEntries::new(dictionary.seek(DictKey::Term(0))?).enumerate() {
            let entry = entry?;
            let DictKey::Term(key) = entry.key else {
                continue;
            };
            if i % ITEM_COUNT_PER_BLOCK == 0 {
                block_index.push(key);
            }
            if verbose >= 2 && entries.len() < MAX_PRINTED_ENTRIES {
                entries.push(EntryInfo {
                    key,
                    value: entry.value,
                });
            }
        }
    }

    let summary = InspectSummary {
        file_size: format_size(layout.total_size),
        key_width,
        item_count: layout.item_count,
        block_count: layout.block_count,
        data_len: layout.data_len,
        null_value,
        block_index,
        entries,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
