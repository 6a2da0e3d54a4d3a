//! Locate command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use stratum_date_term::Granularity;
use stratum_locator::{
    DateIndexConfig, LeafPostingLocator, LocatorOptions, LookupMode, PostingFileResolver,
    RangeSummary, ResolvedPosting,
};

use crate::{
    commands::IndexFiles,
    utils::{open_source, parse_date, validate_file_exists},
};

#[derive(Serialize)]
struct LocateSummary {
    from: String,
    to: String,
    query_count: usize,
    document_count_hint: u64,
    inline: Vec<u64>,
    locations: Vec<stratum_locator::PostingLocation>,
}

pub fn run(
    mode: LookupMode,
    search_granularity: Option<Granularity>,
    index_dir: String,
    from: String,
    to: String,
) -> Result<()> {
    let files = IndexFiles::new(&index_dir);
    for path in [&files.config, &files.dictionary, &files.postings] {
        validate_file_exists(&path.to_string_lossy())?;
    }

    let mut config = DateIndexConfig::from_json(&std::fs::read_to_string(&files.config)?)?;
    if search_granularity.is_some() {
        config.search_granularity = search_granularity;
    }
    let options = LocatorOptions {
        lookup_mode: mode,
        ..Default::default()
    };
    let resolver = Arc::new(PostingFileResolver::new(open_source(&files.postings, false)?));
    let mut locator = LeafPostingLocator::open(
        Arc::new(config.strategy()?),
        vec![open_source(&files.dictionary, true)?],
        resolver,
        &options,
    )?;
    if files.summary.exists() {
        let json = std::fs::read_to_string(&files.summary)
            .with_context(|| format!("Failed to read {}", files.summary.display()))?;
        locator = locator.with_summary(RangeSummary::from_json(&json)?);
    }

    let from = parse_date(&from)?;
    let to = parse_date(&to)?;
    let query_count = locator.plan(from.raw(), to.raw())?.len();
    let postings = locator.lookup(from.raw(), to.raw())?;

    let mut summary = LocateSummary {
        from: from.to_string(),
        to: to.to_string(),
        query_count,
        document_count_hint: 0,
        inline: Vec::new(),
        locations: Vec::new(),
    };
    for posting in postings {
        match posting {
            ResolvedPosting::Inline(doc) => {
                summary.document_count_hint += 1;
                summary.inline.push(doc);
            }
            ResolvedPosting::Location(location) => {
                summary.document_count_hint += location.doc_count_hint as u64;
                summary.locations.push(location);
            }
        }
    }
    summary.inline.sort_unstable();
    summary.locations.sort();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
