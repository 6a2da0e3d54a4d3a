//! Lookup command implementation

use anyhow::Result;
use stratum_dictionary::{DictKey, DictionaryKind, DictionaryOptions, KeyWidth, open_dictionary};

use crate::utils::{open_source, parse_key, validate_file_exists};

pub fn run(key_width: KeyWidth, mmap: bool, dict_path: String, keys: Vec<String>) -> Result<()> {
    validate_file_exists(&dict_path)?;
    let keys = keys
        .iter()
        .map(|key| parse_key(key))
        .collect::<Result<Vec<_>>>()?;

    let dictionary = open_dictionary(
        DictionaryKind::Tiered,
        key_width,
        open_source(&dict_path, mmap)?,
        &DictionaryOptions::new(),
    )?;
    for key in keys {
        let label = match key {
            DictKey::Term(key) => key.to_string(),
            DictKey::Null => "null".to_string(),
        };
        match dictionary.lookup(key)? {
            Some(value) => println!("{label}\t{value}"),
            None => println!("{label}\t(not found)"),
        }
    }
    Ok(())
}
