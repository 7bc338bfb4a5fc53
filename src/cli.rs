//! Command-line interface definition for linedup
//!
//! Provides argument parsing and validation for the line filtering tool.

use crate::matcher::MatchStrategy;
use crate::progress::DEFAULT_PROGRESS_EVERY;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// File names used inside a `--dir` working directory
pub const DIR_SOURCE: &str = "source.txt";
pub const DIR_FILTER: &str = "filter.txt";
pub const DIR_OUTPUT: &str = "output.txt";

/// Remove every line of a text file that contains any line of a filter file
#[derive(Parser, Debug, Clone)]
#[command(
    name = "linedup",
    version,
    about = "Remove every source line that contains any filter line",
    long_about = r#"
Reads the filter file once, then streams the source file and drops every line
that contains (as a plain, case-sensitive substring) any non-blank filter line.
Surviving lines are written in their original order. The output file is only
replaced once the whole pass has succeeded.

EXAMPLES:
    # Explicit paths
    linedup -s source.txt -f filter.txt -o output.txt

    # Working directory holding source.txt, filter.txt (writes output.txt)
    linedup -d ./work

    # Show every removed line and the filter line that caused it
    linedup -d ./work --show-removed

    # Only count, write nothing
    linedup -s big.txt -f filter.txt -o out.txt --dry-run
"#
)]
pub struct Args {
    /// Source file to filter
    #[arg(short, long, value_name = "PATH")]
    pub source: Option<PathBuf>,

    /// Filter file: one substring per line
    #[arg(short, long, value_name = "PATH")]
    pub filter: Option<PathBuf>,

    /// Output file for the surviving lines
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Working directory with source.txt, filter.txt and output.txt
    /// (explicit paths take precedence)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Report progress every N lines (0 disables)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PROGRESS_EVERY)]
    pub progress_every: u64,

    /// Matching backend
    #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
    pub strategy: StrategyArg,

    /// Strip surrounding whitespace from filter lines before matching
    #[arg(long, default_value_t = false)]
    pub trim_filters: bool,

    /// Print each removed line with the filter line it contains
    #[arg(long, default_value_t = false)]
    pub show_removed: bool,

    /// Evaluate lines on a thread pool (output order is preserved)
    #[arg(long, default_value_t = false)]
    pub parallel: bool,

    /// Number of threads for --parallel (default: auto-detect)
    #[arg(short = 't', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Buffer size for the output file (default: 8MB)
    #[arg(long, value_name = "SIZE", default_value = "8MB")]
    pub buffer_size: String,

    /// Dry run - count what would be removed without writing files
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Verbose mode - detailed logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Matching backend as exposed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Scan for small filter files, automaton for large ones
    Auto,
    /// Try each filter line in turn
    Scan,
    /// Aho-Corasick automaton over all filter lines
    Automaton,
}

impl From<StrategyArg> for MatchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => MatchStrategy::Auto,
            StrategyArg::Scan => MatchStrategy::Scan,
            StrategyArg::Automaton => MatchStrategy::Automaton,
        }
    }
}

impl Args {
    /// Resolve source, filter and output paths from explicit flags and `--dir`
    pub fn resolve_paths(&self) -> anyhow::Result<(PathBuf, PathBuf, PathBuf)> {
        let pick = |explicit: &Option<PathBuf>, name: &str, flag: &str| -> anyhow::Result<PathBuf> {
            match (explicit, &self.dir) {
                (Some(path), _) => Ok(path.clone()),
                (None, Some(dir)) => Ok(dir.join(name)),
                (None, None) => anyhow::bail!("Missing --{} (or --dir)", flag),
            }
        };

        Ok((
            pick(&self.source, DIR_SOURCE, "source")?,
            pick(&self.filter, DIR_FILTER, "filter")?,
            pick(&self.output, DIR_OUTPUT, "output")?,
        ))
    }

    /// Parse buffer size string to bytes
    pub fn parse_buffer_size(&self) -> anyhow::Result<usize> {
        parse_size(&self.buffer_size)
    }
}

/// Parse human-readable size string to bytes
fn parse_size(size_str: &str) -> anyhow::Result<usize> {
    let size_str = size_str.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(num) = size_str.strip_suffix("GB") {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = size_str.strip_suffix("MB") {
        (num, 1024 * 1024)
    } else if let Some(num) = size_str.strip_suffix("KB") {
        (num, 1024)
    } else if let Some(num) = size_str.strip_suffix('B') {
        (num, 1)
    } else {
        (size_str.as_str(), 1)
    };

    let num: usize = num_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size format: '{}'", size_str))?;

    if num == 0 {
        anyhow::bail!("Size must be greater than zero: '{}'", size_str);
    }

    Ok(num * multiplier)
}
