//! Build command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use stratum_date_term::{DateTerm, Granularity, encode_date_term_to_terms};
use stratum_dictionary::TieredDictionaryWriter;
use stratum_io::{FileWriter, SealingWrite};
use stratum_locator::{
    DateIndexConfig, INLINE_POSTING_FLAG, POSTING_HEADER_SIZE, RangeSummary,
    encode_posting_header,
};

use crate::{
    commands::IndexFiles,
    utils::{format_size, parse_date, validate_file_exists},
};

#[derive(Serialize)]
struct BuildSummary {
    document_count: u32,
    key_count: usize,
    inline_postings: usize,
    postings_size: String,
    min_time: Option<String>,
    max_time: Option<String>,
}

pub fn run(
    granularity: Granularity,
    middle_levels: bool,
    input: String,
    index_dir: String,
) -> Result<()> {
    validate_file_exists(&input)?;
    let text = std::fs::read_to_string(&input).with_context(|| format!("Failed to read {input}"))?;

    let config = DateIndexConfig::new(granularity, middle_levels);
    let format = config.level_format();
    let mut postings_by_key = BTreeMap::<u64, Vec<u32>>::new();
    let mut bounds: Option<(DateTerm, DateTerm)> = None;
    let mut document_count = 0u32;
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let doc = u32::try_from(line_no).context("Too many documents")?;
        let term = parse_date(line).with_context(|| format!("Line {}", line_no + 1))?;
        for key in encode_date_term_to_terms(term, &format) {
            postings_by_key.entry(key).or_default().push(doc);
        }
        bounds = Some(match bounds {
            Some((min, max)) => (min.min(term), max.max(term)),
            None => (term, term),
        });
        document_count += 1;
    }

    std::fs::create_dir_all(&index_dir)
        .with_context(|| format!("Failed to create {index_dir}"))?;
    let files = IndexFiles::new(&index_dir);

    let mut postings = FileWriter::create(&files.postings)?;
    let mut dictionary = TieredDictionaryWriter::<u64, _>::new(FileWriter::create(&files.dictionary)?);
    let mut inline_postings = 0;
    for (key, docs) in &postings_by_key {
        let value = if let [doc] = docs[..] {
            inline_postings += 1;
            INLINE_POSTING_FLAG | doc as u64
        } else {
            let offset = postings.position();
            postings.write_all(&posting_record(docs)?)?;
            offset
        };
        dictionary.add_term(*key, value)?;
    }
    let postings_size = postings.position();
    postings.seal()?;
    dictionary.finish()?;

    std::fs::write(&files.config, serde_json::to_string_pretty(&config)?)?;
    if let Some((min, max)) = bounds {
        let summary = RangeSummary::from_dates(min, max)?;
        std::fs::write(&files.summary, summary.to_date_json()?)?;
    }

    let summary = BuildSummary {
        document_count,
        key_count: postings_by_key.len(),
        inline_postings,
        postings_size: format_size(postings_size),
        min_time: bounds.map(|(min, _)| min.to_string()),
        max_time: bounds.map(|(_, max)| max.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Posting header for a list of `doc_count` u32 document ids.
fn posting_header(doc_count: usize) -> Result<[u8; POSTING_HEADER_SIZE as usize]> {
    let length = doc_count
        .checked_mul(std::mem::size_of::<u32>())
        .and_then(|len| u32::try_from(len).ok())
        .with_context(|| format!("Posting list of {doc_count} documents is too large"))?;
    let doc_count = u32::try_from(doc_count).context("Too many documents in posting list")?;
    Ok(encode_posting_header(length, doc_count))
}

/// Header plus little-endian document ids of a posting list.
fn posting_record(docs: &[u32]) -> Result<Vec<u8>> {
    let header = posting_header(docs.len())?;
    let mut record = Vec::with_capacity(header.len() + docs.len() * std::mem::size_of::<u32>());
    record.extend_from_slice(&header);
    record.extend(docs.iter().flat_map(|doc| doc.to_le_bytes()));
    Ok(record)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stratum_date_term::Granularity;
    use stratum_locator::{
        DateIndexConfig, LeafPostingLocator, LocatorOptions, PostingFileResolver, RangeSummary,
        ResolvedPosting,
    };

    use crate::{commands::IndexFiles, utils::open_source};

    #[test]
    fn test_build_then_locate() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("timestamps.txt");
        // 04:18, 04:19 twice, 05:00, 09:53 on 2018-01-16.
        std::fs::write(
            &input,
            "1516076280000\n1516076340000\n\n1516076340000\n1516078800000\n1516096380000\n",
        )
        .unwrap();
        let index_dir = dir.path().join("index");
        super::run(
            Granularity::Minute,
            false,
            input.to_string_lossy().into_owned(),
            index_dir.to_string_lossy().into_owned(),
        )
        .unwrap();

        let files = IndexFiles::new(&index_dir);
        let config: DateIndexConfig =
            serde_json::from_str(&std::fs::read_to_string(&files.config).unwrap()).unwrap();
        assert_eq!(config, DateIndexConfig::new(Granularity::Minute, false));
        let summary =
            RangeSummary::from_json(&std::fs::read_to_string(&files.summary).unwrap()).unwrap();

        let locator = LeafPostingLocator::open(
            Arc::new(config.strategy().unwrap()),
            vec![open_source(&files.dictionary, false).unwrap()],
            Arc::new(PostingFileResolver::new(open_source(&files.postings, true).unwrap())),
            &LocatorOptions::default(),
        )
        .unwrap()
        .with_summary(summary);

        let postings = locator
            .lookup_timestamps(1_516_076_340_000, 1_516_096_320_000)
            .unwrap();
        let mut docs: u32 = 0;
        let mut inline = Vec::new();
        for posting in postings {
            match posting {
                ResolvedPosting::Inline(doc) => inline.push(doc),
                ResolvedPosting::Location(location) => docs += location.doc_count_hint,
            }
        }
        // Lines 1 and 3 share minute 04:19; line 4 is alone in hour 5.
        assert_eq!(docs, 2);
        assert_eq!(inline, vec![4]);
    }

    #[test]
    fn test_posting_record_layout() {
        let record = super::posting_record(&[3, 7]).unwrap();
        assert_eq!(&record[..8], &stratum_locator::encode_posting_header(8, 2));
        assert_eq!(&record[8..], &[3, 0, 0, 0, 7, 0, 0, 0]);
    }

    #[test]
    fn test_posting_header_length_overflow() {
        // The body length field is u32 bytes, so the list must stay under 2^30 ids.
        let largest = (u32::MAX / 4) as usize;
        assert!(super::posting_header(largest).is_ok());
        let err = super::posting_header(largest + 1).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }
}
