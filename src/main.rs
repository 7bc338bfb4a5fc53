//! linedup - remove lines containing any filter line
//!
//! Main entry point for the command-line application.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

use linedup::cli::Args;
use linedup::output::ensure_output_dir;
use linedup::progress::{
    print_banner, print_error, print_header, print_info, print_success, ConsoleReporter,
};
use linedup::runner::{FilterRunner, RunConfig};

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    } else if !args.quiet {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // Configure thread pool
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    // Run the application
    if let Err(e) = run(args) {
        print_error(&format!("{}", e));

        // Print chain of errors
        let mut source = e.source();
        while let Some(err) = source {
            print_error(&format!("  Caused by: {}", err));
            source = err.source();
        }

        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    // Print banner unless quiet mode
    if !args.quiet {
        print_banner();
    }

    let config = RunConfig::from_args(&args)?;
    validate_config(&config)?;

    if !args.quiet && args.verbose {
        print_config(&args, &config);
    }

    // Directory provisioning belongs to the caller, not the engine
    if !config.dry_run {
        ensure_output_dir(&config.output_path)?;
    }

    let total_bytes = std::fs::metadata(&config.source_path)
        .map(|m| m.len())
        .unwrap_or(0);
    let mut reporter = ConsoleReporter::new(total_bytes, args.quiet, args.show_removed);

    if !args.quiet {
        print_header("Filtering...");
    }

    log::debug!("run config: {:?}", config);
    let runner = FilterRunner::new(config);
    let stats = runner.run(&mut reporter)?;
    log::debug!("run finished: {:?}", stats);

    if !args.quiet {
        if runner.config().dry_run {
            print_info("Dry run, no output written");
        } else {
            print_success(&format!("Output written to: {:?}", runner.config().output_path));
        }
    }

    Ok(())
}

/// Reject configurations the engine would mishandle
fn validate_config(config: &RunConfig) -> anyhow::Result<()> {
    let output = resolved(&config.output_path);
    if resolved(&config.source_path) == output {
        anyhow::bail!(
            "Output path must differ from the source path: {:?}",
            config.source_path
        );
    }
    if resolved(&config.filter_path) == output {
        anyhow::bail!(
            "Output path must differ from the filter path: {:?}",
            config.filter_path
        );
    }
    Ok(())
}

/// Canonical form of `path`, or of its parent when the file does not exist yet
fn resolved(path: &Path) -> PathBuf {
    if let Ok(path) = std::fs::canonicalize(path) {
        return path;
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (std::fs::canonicalize(parent), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// Print configuration summary
fn print_config(args: &Args, config: &RunConfig) {
    print_header("Configuration");

    print_info(&format!("Source:         {:?}", config.source_path));
    print_info(&format!("Filter:         {:?}", config.filter_path));
    print_info(&format!("Output:         {:?}", config.output_path));
    print_info(&format!("Strategy:       {:?}", config.strategy));
    print_info(&format!("Trim filters:   {}", config.trim_filters));
    print_info(&format!("Progress every: {} lines", config.progress_every));
    print_info(&format!("Buffer size:    {} MB", config.buffer_size / (1024 * 1024)));
    print_info(&format!("Dry run:        {}", config.dry_run));
    if config.parallel {
        print_info(&format!("Threads:        {}", args.threads.unwrap_or_else(num_cpus::get)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path, output: PathBuf) -> RunConfig {
        RunConfig::new(dir.join("source.txt"), dir.join("filter.txt"), output)
    }

    #[test]
    fn test_output_aliasing_source_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("source.txt"), "a\n").unwrap();

        let config = config_in(dir.path(), dir.path().join(".").join("source.txt"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("source path"));
    }

    #[test]
    fn test_output_aliasing_filter_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("filter.txt"), "x\n").unwrap();

        let output = dir.path().join("sub").join("..").join("filter.txt");
        let err = validate_config(&config_in(dir.path(), output)).unwrap_err();
        assert!(err.to_string().contains("filter path"));
    }

    #[test]
    fn test_distinct_new_output_is_accepted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("source.txt"), "a\n").unwrap();
        std::fs::write(dir.path().join("filter.txt"), "x\n").unwrap();

        let config = config_in(dir.path(), dir.path().join("output.txt"));
        assert!(validate_config(&config).is_ok());
    }
}
