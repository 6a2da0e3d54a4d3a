//! Value bounds of the indexed data and their JSON persistence.
//!
//! Date summaries are written as `{"min_time": "y-m-d-h-mi-s-ms", "max_time": ...}`,
//! numeric summaries as `{"min_number": u64, "max_number": u64}`.

use serde::{Deserialize, Serialize};
use stratum_common::{Result, error::Error};
use stratum_date_term::DateTerm;

/// Inclusive bounds of all values present in an index, in the key domain of its
/// strategy (untagged `DateTerm` bits for dates, plain `u64` for numbers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeSummary {
    pub min: u64,
    pub max: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SummaryFile {
    Date { min_time: String, max_time: String },
    Numeric { min_number: u64, max_number: u64 },
}

impl RangeSummary {
    pub fn new(min: u64, max: u64) -> Result<RangeSummary> {
        if min > max {
            return Err(Error::invalid_arg(
                "summary",
                format!("min {min:#x} is greater than max {max:#x}"),
            ));
        }
        Ok(RangeSummary { min, max })
    }

    pub fn from_dates(min: DateTerm, max: DateTerm) -> Result<RangeSummary> {
        RangeSummary::new(min.untagged().raw(), max.untagged().raw())
    }

    pub fn min_date(&self) -> DateTerm {
        DateTerm::from_raw(self.min)
    }

    pub fn max_date(&self) -> DateTerm {
        DateTerm::from_raw(self.max)
    }

    /// The part of `[from, to]` covered by the summary, or `None` when they are
    /// disjoint.
    pub fn clamp(&self, from: u64, to: u64) -> Option<(u64, u64)> {
        let from = from.max(self.min);
        let to = to.min(self.max);
        (from <= to).then_some((from, to))
    }

    /// Parses either summary file form. Malformed JSON is an `External` error,
    /// malformed date strings and inverted bounds are `InvalidArgument`.
    pub fn from_json(json: &str) -> Result<RangeSummary> {
        let file: SummaryFile =
            serde_json::from_str(json).map_err(|e| Error::external("range summary", e))?;
        match file {
            SummaryFile::Date { min_time, max_time } => {
                RangeSummary::from_dates(min_time.parse()?, max_time.parse()?)
            }
            SummaryFile::Numeric {
                min_number,
                max_number,
            } => RangeSummary::new(min_number, max_number),
        }
    }

    pub fn to_date_json(&self) -> Result<String> {
        let file = SummaryFile::Date {
            min_time: self.min_date().to_string(),
            max_time: self.max_date().to_string(),
        };
        serde_json::to_string(&file).map_err(|e| Error::external("range summary", e))
    }

    pub fn to_numeric_json(&self) -> Result<String> {
        let file = SummaryFile::Numeric {
            min_number: self.min,
            max_number: self.max,
        };
        serde_json::to_string(&file).map_err(|e| Error::external("range summary", e))
    }
}
