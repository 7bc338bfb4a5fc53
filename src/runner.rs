//! Filtering pass
//!
//! Loads the filter file once, streams the source through the match engine
//! and writes the surviving lines, in source order, to the output.

use crate::cli::Args;
use crate::error::{Result, Stage};
use crate::matcher::{MatchEngine, MatchOptions, MatchStrategy};
use crate::output::{OutputMode, DEFAULT_BUFFER_SIZE};
use crate::progress::{
    NoProgress, ProgressReporter, ProgressTracker, RunStats, DEFAULT_PROGRESS_EVERY,
};
use crate::source::{self, LineStream, SourceLine};

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Lines evaluated per batch in parallel mode
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_path: PathBuf,
    pub filter_path: PathBuf,
    pub output_path: PathBuf,
    pub progress_every: u64,
    pub strategy: MatchStrategy,
    pub trim_filters: bool,
    pub buffer_size: usize,
    pub dry_run: bool,
    pub parallel: bool,
    pub chunk_size: usize,
}

impl RunConfig {
    pub fn new(
        source_path: impl Into<PathBuf>,
        filter_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            filter_path: filter_path.into(),
            output_path: output_path.into(),
            progress_every: DEFAULT_PROGRESS_EVERY,
            strategy: MatchStrategy::Auto,
            trim_filters: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            dry_run: false,
            parallel: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let (source_path, filter_path, output_path) = args.resolve_paths()?;

        Ok(Self {
            source_path,
            filter_path,
            output_path,
            progress_every: args.progress_every,
            strategy: args.strategy.into(),
            trim_filters: args.trim_filters,
            buffer_size: args.parse_buffer_size()?,
            dry_run: args.dry_run,
            parallel: args.parallel,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }
}

/// Filter `source` by `filter` into `output` with default settings
pub fn run(source: &Path, filter: &Path, output: &Path) -> Result<RunStats> {
    FilterRunner::new(RunConfig::new(source, filter, output)).run(&mut NoProgress)
}

/// One end-to-end filtering pass
pub struct FilterRunner {
    config: RunConfig,
}

impl FilterRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute the pass
    ///
    /// Missing or undecodable inputs fail before the output is created. On
    /// any failure the output path is left as it was.
    pub fn run(&self, reporter: &mut dyn ProgressReporter) -> Result<RunStats> {
        let filters = source::load_all(&self.config.filter_path, Stage::Filter)?;
        let engine = MatchEngine::build_with(
            filters,
            MatchOptions {
                strategy: self.config.strategy,
                trim_filters: self.config.trim_filters,
            },
        );
        reporter.on_filters_loaded(engine.summary());

        let mut lines = source::stream(&self.config.source_path, Stage::Source)?;

        let mut output = if self.config.dry_run {
            OutputMode::discard()
        } else {
            OutputMode::file(self.config.output_path.clone(), self.config.buffer_size)?
        };

        let mut tracker = ProgressTracker::new();
        if self.config.parallel {
            self.filter_parallel(&engine, &mut lines, &mut tracker, &mut output, reporter)?;
        } else {
            self.filter_sequential(&engine, &mut lines, &mut tracker, &mut output, reporter)?;
        }
        drop(lines);

        output.finish()?;

        let stats = tracker.finalize();
        reporter.on_finish(&stats);
        Ok(stats)
    }

    fn filter_sequential(
        &self,
        engine: &MatchEngine,
        lines: &mut LineStream,
        tracker: &mut ProgressTracker,
        output: &mut OutputMode,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<()> {
        let every = self.config.progress_every;
        let total_bytes = lines.total_bytes();

        while let Some(line) = lines.next() {
            let matched_by = engine.matches(&line.text);
            self.forward(&line, matched_by, tracker, output, reporter)?;
            tracker.emit_progress(every, lines.bytes_read(), total_bytes, reporter);
        }

        Ok(())
    }

    /// Evaluate containment for a chunk on the rayon pool, then record and
    /// write the chunk in source order
    fn filter_parallel(
        &self,
        engine: &MatchEngine,
        lines: &mut LineStream,
        tracker: &mut ProgressTracker,
        output: &mut OutputMode,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<()> {
        let every = self.config.progress_every;
        let total_bytes = lines.total_bytes();
        let chunk_size = self.config.chunk_size.max(1);

        loop {
            let chunk: Vec<SourceLine> = lines.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }

            let outcomes: Vec<Option<&str>> = chunk
                .par_iter()
                .map(|line| engine.matches(&line.text))
                .collect();

            for (line, matched_by) in chunk.iter().zip(outcomes) {
                self.forward(line, matched_by, tracker, output, reporter)?;
                tracker.emit_progress(every, lines.bytes_read(), total_bytes, reporter);
            }
        }

        Ok(())
    }

    fn forward(
        &self,
        line: &SourceLine,
        matched_by: Option<&str>,
        tracker: &mut ProgressTracker,
        output: &mut OutputMode,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<()> {
        tracker.record_step(matched_by.is_some());

        match matched_by {
            Some(filter) => reporter.on_removed(line, filter),
            None => output.write_line(&line.text)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinedupError;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new(source: &str, filter: &str) -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("source.txt"), source).unwrap();
            std::fs::write(dir.path().join("filter.txt"), filter).unwrap();
            Self { dir }
        }

        fn config(&self) -> RunConfig {
            RunConfig::new(
                self.dir.path().join("source.txt"),
                self.dir.path().join("filter.txt"),
                self.dir.path().join("output.txt"),
            )
        }

        fn output(&self) -> String {
            std::fs::read_to_string(self.dir.path().join("output.txt")).unwrap()
        }
    }

    #[derive(Default)]
    struct Collect {
        removed: Vec<(u64, String)>,
        finished: Option<RunStats>,
    }

    impl ProgressReporter for Collect {
        fn on_removed(&mut self, line: &SourceLine, matched_by: &str) {
            self.removed.push((line.index, matched_by.to_string()));
        }

        fn on_finish(&mut self, stats: &RunStats) {
            self.finished = Some(*stats);
        }
    }

    #[test]
    fn test_basic_run() {
        let fx = Fixture::new("apple pie\nbanana split\ncherry tart\n", "pie\ntart\n");
        let mut collect = Collect::default();

        let stats = FilterRunner::new(fx.config()).run(&mut collect).unwrap();

        assert_eq!(fx.output(), "banana split\n");
        assert_eq!(stats, RunStats { total_lines: 3, kept_lines: 1, removed_lines: 2 });
        assert_eq!(collect.removed, vec![(0, "pie".to_string()), (2, "tart".to_string())]);
        assert_eq!(collect.finished, Some(stats));
    }

    #[test]
    fn test_survivors_keep_order_and_duplicates() {
        let fx = Fixture::new("b\na\nzz\nb\nc\n", "z\n");
        let stats = FilterRunner::new(fx.config()).run(&mut NoProgress).unwrap();

        assert_eq!(fx.output(), "b\na\nb\nc\n");
        assert_eq!(stats.kept_lines, 4);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let source: String = (0..5000).map(|i| format!("line {} tag{}\n", i, i % 17)).collect();
        let fx = Fixture::new(&source, "tag3\ntag11\n99\n");

        let sequential = FilterRunner::new(fx.config()).run(&mut NoProgress).unwrap();
        let expected = fx.output();

        let mut config = fx.config();
        config.parallel = true;
        config.chunk_size = 333;
        let parallel = FilterRunner::new(config).run(&mut NoProgress).unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(fx.output(), expected);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let fx = Fixture::new("keep\ndrop me\n", "drop\n");
        let mut config = fx.config();
        config.dry_run = true;

        let stats = FilterRunner::new(config).run(&mut NoProgress).unwrap();

        assert_eq!(stats, RunStats { total_lines: 2, kept_lines: 1, removed_lines: 1 });
        assert!(!fx.dir.path().join("output.txt").exists());
    }

    #[test]
    fn test_missing_filter_creates_no_output() {
        let fx = Fixture::new("a\n", "");
        let mut config = fx.config();
        config.filter_path = fx.dir.path().join("absent.txt");

        let err = FilterRunner::new(config).run(&mut NoProgress).unwrap_err();

        assert!(matches!(err, LinedupError::NotFound { stage: Stage::Filter, .. }));
        assert!(!fx.dir.path().join("output.txt").exists());
    }

    #[test]
    fn test_undecodable_filter_creates_no_output() {
        let fx = Fixture::new("a\n", "");
        std::fs::write(fx.dir.path().join("filter.txt"), b"\xFF\n").unwrap();

        let err = FilterRunner::new(fx.config()).run(&mut NoProgress).unwrap_err();

        assert!(matches!(
            err,
            LinedupError::Encoding { stage: Stage::Filter, line: 1, .. }
        ));
        let mut names: Vec<_> = std::fs::read_dir(fx.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["filter.txt", "source.txt"]);
    }

    #[test]
    fn test_undecodable_source_keeps_previous_output() {
        let fx = Fixture::new("", "x\n");
        std::fs::write(fx.dir.path().join("source.txt"), b"ok\n\xC3\x28\n").unwrap();
        std::fs::write(fx.dir.path().join("output.txt"), "old\n").unwrap();

        let err = FilterRunner::new(fx.config()).run(&mut NoProgress).unwrap_err();

        assert!(matches!(err, LinedupError::Encoding { stage: Stage::Source, line: 2, .. }));
        assert_eq!(fx.output(), "old\n");
    }

    #[test]
    fn test_progress_notifications() {
        #[derive(Default)]
        struct Count(Vec<u64>);
        impl ProgressReporter for Count {
            fn on_progress(&mut self, update: &crate::progress::ProgressUpdate) {
                assert!(update.bytes_read <= update.total_bytes);
                self.0.push(update.stats.total_lines);
            }
        }

        let source: String = (0..25).map(|i| format!("{i}\n")).collect();
        let fx = Fixture::new(&source, "1\n");
        let mut config = fx.config();
        config.progress_every = 10;

        let mut count = Count::default();
        FilterRunner::new(config).run(&mut count).unwrap();

        assert_eq!(count.0, vec![10, 20]);
    }
}
