use anyhow::Result;
use clap::{Parser, Subcommand};
use stratum_date_term::Granularity;
use stratum_dictionary::KeyWidth;
use stratum_locator::LookupMode;

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "stratum-cmd")]
#[command(about = "Command-line utility for stratum dictionaries and date indexes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a date index from a file of epoch-millisecond timestamps, one per line
    Build {
        /// Finest indexed granularity
        #[arg(short, long, default_value = "minute")]
        granularity: Granularity,

        /// Index the intermediate levels between calendar fields
        #[arg(long)]
        middle_levels: bool,

        /// Timestamp file; the line number is the document id
        input: String,

        /// Output directory for the index files
        index_dir: String,
    },

    /// Inspect a dictionary and display its layout
    Inspect {
        /// Increase verbosity (-v prints the block index, -vv prints entries)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Key width of the dictionary
        #[arg(short, long, default_value = "u64")]
        key_width: KeyWidth,

        /// Dictionary file path
        dict_path: String,
    },

    /// Look up keys in a dictionary
    Lookup {
        #[arg(short, long, default_value = "u64")]
        key_width: KeyWidth,

        /// Map the file into memory instead of reading blocks on demand
        #[arg(long)]
        mmap: bool,

        /// Dictionary file path
        dict_path: String,

        /// Keys to look up; `null` denotes the null term
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Show the dictionary keys covering a date range
    Decompose {
        #[arg(short, long, default_value = "minute")]
        granularity: Granularity,

        #[arg(long)]
        middle_levels: bool,

        /// Emit key ranges instead of individual keys
        #[arg(long)]
        ranges: bool,

        /// Range start, as epoch milliseconds or `y-m-d-h-mi-s-ms`
        from: String,

        /// Range end (inclusive)
        to: String,
    },

    /// Locate the postings of a date range in an index built by `build`
    Locate {
        #[arg(short, long, default_value = "ranges")]
        mode: LookupMode,

        /// Round the query to this granularity
        #[arg(long)]
        search_granularity: Option<Granularity>,

        /// Index directory
        index_dir: String,

        from: String,

        to: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            granularity,
            middle_levels,
            input,
            index_dir,
        } => commands::build::run(granularity, middle_levels, input, index_dir),
        Commands::Inspect {
            verbose,
            key_width,
            dict_path,
        } => commands::inspect::run(verbose, key_width, dict_path),
        Commands::Lookup {
            key_width,
            mmap,
            dict_path,
            keys,
        } => commands::lookup::run(key_width, mmap, dict_path, keys),
        Commands::Decompose {
            granularity,
            middle_levels,
            ranges,
            from,
            to,
        } => commands::decompose::run(granularity, middle_levels, ranges, from, to),
        Commands::Locate {
            mode,
            search_granularity,
            index_dir,
            from,
            to,
        } => commands::locate::run(mode, search_granularity, index_dir, from, to),
    }
}
