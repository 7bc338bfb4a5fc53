//! # linedup
//!
//! Removes every line of a (possibly very large) text file that contains any
//! line of a filter file as a substring.
//!
//! ## Features
//!
//! - **Containment filtering**: a source line is dropped when it contains any
//!   non-blank filter line
//! - **Streaming**: the source is memory-mapped and read line by line
//! - **Order preserving**: surviving lines keep their original order and multiplicity
//! - **Atomic output**: the output file is replaced only after a successful pass
//! - **Multi-pattern search**: Aho-Corasick for large filter files
//! - **Parallel evaluation**: optional rayon-backed mode with identical output
//!
//! ## Usage
//!
//! ```bash
//! linedup -s source.txt -f filter.txt -o output.txt
//!
//! # Working directory holding source.txt and filter.txt
//! linedup -d ./work
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use linedup::progress::NoProgress;
//! use linedup::runner::{FilterRunner, RunConfig};
//!
//! let mut config = RunConfig::new("source.txt", "filter.txt", "output.txt");
//! config.progress_every = 10_000;
//!
//! let stats = FilterRunner::new(config).run(&mut NoProgress).unwrap();
//! println!("kept {} of {}", stats.kept_lines, stats.total_lines);
//! ```

pub mod cli;
pub mod error;
pub mod matcher;
pub mod output;
pub mod progress;
pub mod runner;
pub mod source;

pub use cli::Args;
pub use error::{LinedupError, Stage};
pub use matcher::{MatchEngine, MatchOptions, MatchStrategy};
pub use progress::{ProgressReporter, RunStats};
pub use runner::{run, FilterRunner, RunConfig};
