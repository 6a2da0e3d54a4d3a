//! Serializable index configurations and locator options.

use serde::{Deserialize, Serialize};
use stratum_bloom_filters::BloomFilterConfig;
use stratum_common::{Result, error::Error};
use stratum_date_term::{DateLevelFormat, Granularity};
use stratum_dictionary::DictionaryOptions;

use crate::strategy::{DateStrategy, NumericRangeStrategy};

/// How decomposed queries are issued against the dictionaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// One point lookup per emitted key.
    Terms,
    /// One seek and scan per emitted key range.
    #[default]
    Ranges,
}

impl LookupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupMode::Terms => "terms",
            LookupMode::Ranges => "ranges",
        }
    }
}

impl std::fmt::Display for LookupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LookupMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<LookupMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terms" => Ok(LookupMode::Terms),
            "ranges" => Ok(LookupMode::Ranges),
            _ => Err(Error::invalid_arg(
                "lookup_mode",
                format!("'{s}' is neither 'terms' nor 'ranges'"),
            )),
        }
    }
}

/// Build-time description of a date index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateIndexConfig {
    /// Finest level that was indexed.
    pub granularity: Granularity,
    /// Whether the intermediate levels between calendar fields were indexed.
    #[serde(default)]
    pub middle_levels: bool,
    /// Granularity queries are rounded to; defaults to `granularity`.
    #[serde(default)]
    pub search_granularity: Option<Granularity>,
}

impl DateIndexConfig {
    pub fn new(granularity: Granularity, middle_levels: bool) -> DateIndexConfig {
        DateIndexConfig {
            granularity,
            middle_levels,
            search_granularity: None,
        }
    }

    pub fn level_format(&self) -> DateLevelFormat {
        DateLevelFormat::new(self.granularity, self.middle_levels)
    }

    /// Fails with `UnsupportedOperation` when the search granularity is finer than
    /// the indexed one.
    pub fn strategy(&self) -> Result<DateStrategy> {
        DateStrategy::new(self.level_format(), self.search_granularity)
    }

    pub fn from_json(json: &str) -> Result<DateIndexConfig> {
        serde_json::from_str(json)
            .map_err(|e| Error::external("date index config", e))
    }
}

/// Build-time description of a numeric range index.
///
/// Values are stored as `u64`; signed values are mapped with
/// `stratum_date_term::numeric::encode_i64` before indexing when `signed` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeIndexConfig {
    #[serde(default)]
    pub signed: bool,
}

impl RangeIndexConfig {
    pub fn strategy(&self) -> NumericRangeStrategy {
        NumericRangeStrategy::new(self.signed)
    }

    pub fn from_json(json: &str) -> Result<RangeIndexConfig> {
        serde_json::from_str(json)
            .map_err(|e| Error::external("range index config", e))
    }
}

/// Runtime options of a locator and the dictionaries it opens.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorOptions {
    pub lookup_mode: LookupMode,
    /// Hold dictionary entry regions in memory.
    pub load_into_memory: bool,
    /// Build a key filter per dictionary at open.
    pub bloom_filter: Option<BloomFilterConfig>,
}

impl LocatorOptions {
    pub fn dictionary_options(&self) -> DictionaryOptions {
        let options = DictionaryOptions::new().load_into_memory(self.load_into_memory);
        match &self.bloom_filter {
            Some(config) => options.bloom_filter(config.clone()),
            None => options,
        }
    }
}
