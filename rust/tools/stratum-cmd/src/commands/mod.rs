//! Command implementations for stratum-cmd

use std::path::{Path, PathBuf};

pub mod build;
pub mod decompose;
pub mod inspect;
pub mod locate;
pub mod lookup;

/// Files of an index directory written by `build`.
pub struct IndexFiles {
    pub dictionary: PathBuf,
    pub postings: PathBuf,
    pub summary: PathBuf,
    pub config: PathBuf,
}

impl IndexFiles {
    pub fn new(index_dir: impl AsRef<Path>) -> IndexFiles {
        let dir = index_dir.as_ref();
        IndexFiles {
            dictionary: dir.join("terms.dict"),
            postings: dir.join("postings.bin"),
            summary: dir.join("summary.json"),
            config: dir.join("config.json"),
        }
    }
}
