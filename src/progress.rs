//! Run statistics and progress reporting
//!
//! `ProgressTracker` owns the counters of a run. Rendering is left to a
//! `ProgressReporter` supplied by the caller; the console implementation used
//! by the binary lives here too.

use crate::matcher::FilterSummary;
use crate::source::SourceLine;
use bytesize::ByteSize;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Default number of lines between progress notifications
pub const DEFAULT_PROGRESS_EVERY: u64 = 1000;

/// Line counters of a run
///
/// `total_lines == kept_lines + removed_lines` holds at every point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total_lines: u64,
    pub kept_lines: u64,
    pub removed_lines: u64,
}

/// Snapshot handed to the reporter on each notification
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub stats: RunStats,
    pub bytes_read: u64,
    pub total_bytes: u64,
}

/// Receives notifications during a run; every method defaults to a no-op
pub trait ProgressReporter {
    fn on_filters_loaded(&mut self, _summary: &FilterSummary) {}

    fn on_progress(&mut self, _update: &ProgressUpdate) {}

    fn on_removed(&mut self, _line: &SourceLine, _matched_by: &str) {}

    fn on_finish(&mut self, _stats: &RunStats) {}
}

/// Reporter that ignores everything
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Counter owner for a single run
#[derive(Debug, Default)]
pub struct ProgressTracker {
    stats: RunStats,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one processed line
    #[inline]
    pub fn record_step(&mut self, matched: bool) {
        self.stats.total_lines += 1;
        if matched {
            self.stats.removed_lines += 1;
        } else {
            self.stats.kept_lines += 1;
        }
    }

    /// Notify the reporter when the line count is a multiple of `every_n`.
    /// `every_n == 0` disables notifications.
    pub fn emit_progress(
        &self,
        every_n: u64,
        bytes_read: u64,
        total_bytes: u64,
        reporter: &mut dyn ProgressReporter,
    ) {
        if every_n == 0 || self.stats.total_lines == 0 || self.stats.total_lines % every_n != 0 {
            return;
        }

        reporter.on_progress(&ProgressUpdate {
            stats: self.stats,
            bytes_read,
            total_bytes,
        });
    }

    /// Running snapshot
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Final counts; the tracker is consumed
    pub fn finalize(self) -> RunStats {
        self.stats
    }
}

/// Print the application banner
pub fn print_banner() {
    let banner = r#"
╔══════════════════════════════════════════════════════════════╗
║                                                              ║
║   ██╗     ██╗███╗   ██╗███████╗██████╗ ██╗   ██╗██████╗      ║
║   ██║     ██║████╗  ██║██╔════╝██╔══██╗██║   ██║██╔══██╗     ║
║   ██║     ██║██╔██╗ ██║█████╗  ██║  ██║██║   ██║██████╔╝     ║
║   ██║     ██║██║╚██╗██║██╔══╝  ██║  ██║██║   ██║██╔═══╝      ║
║   ███████╗██║██║ ╚████║███████╗██████╔╝╚██████╔╝██║          ║
║   ╚══════╝╚═╝╚═╝  ╚═══╝╚══════╝╚═════╝  ╚═════╝ ╚═╝          ║
║                                                              ║
║              Substring Line Filter        v1.0.0             ║
╚══════════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner.green());
}

/// Print a section header
pub fn print_header(text: &str) {
    println!("\n{} {}", "▶".green(), text.green().bold());
}

/// Print an info message
pub fn print_info(text: &str) {
    println!("  {} {}", "ℹ".cyan(), text);
}

/// Print a success message
pub fn print_success(text: &str) {
    println!("  {} {}", "✔".green(), text.green());
}

/// Print a warning message
pub fn print_warning(text: &str) {
    println!("  {} {}", "⚠".yellow(), text.yellow());
}

/// Print an error message
pub fn print_error(text: &str) {
    eprintln!("  {} {}", "✖".red(), text.red());
}

/// Print a bullet point
pub fn print_bullet(text: &str) {
    println!("  {} {}", "•".green(), text);
}

/// Create a bytes-based progress bar
pub fn create_bytes_progress_bar(total_bytes: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);

    if let Ok(style) = ProgressStyle::default_bar().template(concat!(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.green/dim}] ",
        "{bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
    )) {
        pb.set_style(style.progress_chars("█▓░"));
    }

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Format a number with thousand separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}

/// Console reporter: byte progress bar, optional removal log, final summary
pub struct ConsoleReporter {
    bar: ProgressBar,
    show_removed: bool,
    quiet: bool,
    start_time: Instant,
    total_bytes: u64,
}

impl ConsoleReporter {
    pub fn new(total_bytes: u64, quiet: bool, show_removed: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            create_bytes_progress_bar(total_bytes, "Filtering...")
        };

        Self {
            bar,
            show_removed: show_removed && !quiet,
            quiet,
            start_time: Instant::now(),
            total_bytes,
        }
    }

    fn lines_per_second(&self, stats: &RunStats) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            stats.total_lines as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print final statistics
    pub fn print_summary(&self, stats: &RunStats) {
        let elapsed = self.start_time.elapsed();

        println!();
        println!("{}", "═".repeat(60).green());
        println!("{}", "                    FILTERING COMPLETE".green().bold());
        println!("{}", "═".repeat(60).green());
        println!();

        println!("  {} {}", "Source size:    ".green(), ByteSize(self.total_bytes));
        println!("  {} {}", "Total lines:    ".green(), format_number(stats.total_lines));
        println!("  {} {}", "Removed lines:  ".red(), format_number(stats.removed_lines));
        println!(
            "  {} {}",
            "Kept lines:     ".green().bold(),
            format_number(stats.kept_lines).green().bold()
        );

        println!();
        println!("  {} {}", "Duration:       ".green(), format_duration(elapsed));
        println!(
            "  {} {:.2} lines/sec",
            "Throughput:     ".green(),
            self.lines_per_second(stats)
        );
        println!();
        println!("{}", "═".repeat(60).green());
    }
}

impl ProgressReporter for ConsoleReporter {
    fn on_filters_loaded(&mut self, summary: &FilterSummary) {
        log::info!("matcher: {} over {} filters", summary.strategy, summary.retained);
        if self.quiet {
            return;
        }

        print_info(&format!(
            "Filter lines: {} loaded, {} blank, {} distinct",
            format_number(summary.loaded as u64),
            format_number(summary.blank as u64),
            format_number(summary.retained as u64)
        ));

        if !summary.duplicates.is_empty() {
            print_warning(&format!("{} filter lines are duplicated", summary.duplicates.len()));
            for (line, count) in &summary.duplicates {
                print_bullet(&format!("{:?} appears {} times", line, count));
            }
        }

        if summary.retained == 0 {
            print_warning("No usable filter lines, every source line will be kept");
        }
    }

    fn on_progress(&mut self, update: &ProgressUpdate) {
        self.bar.set_position(update.bytes_read);
        self.bar.set_message(format!(
            "{} lines, {} removed",
            format_number(update.stats.total_lines),
            format_number(update.stats.removed_lines)
        ));
    }

    fn on_removed(&mut self, line: &SourceLine, matched_by: &str) {
        if self.show_removed {
            self.bar.println(format!(
                "  {} {} {}",
                "✖".red(),
                line.text.red(),
                format!("(contains {:?})", matched_by).yellow()
            ));
        }
    }

    fn on_finish(&mut self, stats: &RunStats) {
        self.bar.set_position(self.total_bytes);
        self.bar.finish_with_message("Complete".green().to_string());

        if !self.quiet {
            self.print_summary(stats);
        }
    }
}
