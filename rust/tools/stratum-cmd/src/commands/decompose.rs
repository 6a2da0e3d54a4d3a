//! Decompose command implementation

use anyhow::Result;
use stratum_date_term::{DateLevelFormat, DateTerm, Granularity, calculate_ranges, calculate_terms};

use crate::utils::parse_date;

fn describe(key: u64) -> String {
    let term = DateTerm::from_raw(key);
    format!("{key:#018x}\tlevel {:>2}\t{term}", term.level())
}

pub fn run(
    granularity: Granularity,
    middle_levels: bool,
    ranges: bool,
    from: String,
    to: String,
) -> Result<()> {
    let format = DateLevelFormat::new(granularity, middle_levels);
    let from = parse_date(&from)?;
    let to = parse_date(&to)?;
    println!("Decomposing [{from}, {to}] at {granularity} granularity");

    if ranges {
        let ranges = calculate_ranges(from, to, &format);
        for range in &ranges {
            println!("{} ..= {}", describe(range.from), describe(range.to));
        }
        println!("{} ranges", ranges.len());
    } else {
        let terms = calculate_terms(from, to, &format);
        for term in &terms {
            println!("{}", describe(*term));
        }
        println!("{} terms", terms.len());
    }
    Ok(())
}
