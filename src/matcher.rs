//! Containment matching
//!
//! A source line matches when any retained filter line occurs in it as a
//! substring. Two interchangeable backends exist:
//! - Scan: one `memmem` finder per filter, tried in load order
//! - Automaton: a single aho-corasick automaton over all filters
//!
//! Both report the first matching filter in load order, so the choice of
//! backend never changes a result.

use crate::source::SourceLine;
use aho_corasick::{AhoCorasick, MatchKind};
use ahash::RandomState;
use hashbrown::HashMap;
use memchr::memmem::Finder;

/// Filter count above which `Auto` switches to the automaton
pub const AUTOMATON_THRESHOLD: usize = 32;

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// Pick based on the number of retained filters
    #[default]
    Auto,
    /// Linear scan with `memmem`
    Scan,
    /// Aho-Corasick automaton
    Automaton,
}

/// Options applied while building the engine
///
/// By default filters are matched verbatim; whitespace only decides which
/// lines count as blank.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    pub strategy: MatchStrategy,
    /// Strip surrounding whitespace from retained filter lines
    pub trim_filters: bool,
}

/// What `build` did with the filter lines it was given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSummary {
    /// Lines handed to `build`
    pub loaded: usize,
    /// Empty or whitespace-only lines discarded
    pub blank: usize,
    /// Distinct filters kept
    pub retained: usize,
    /// Filters that appeared more than once, with their count, in load order
    pub duplicates: Vec<(String, usize)>,
    /// Backend chosen for the retained filters
    pub strategy: &'static str,
}

/// Outcome of testing one source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'a> {
    pub line: SourceLine,
    pub matched_by: Option<&'a str>,
}

impl MatchResult<'_> {
    pub fn matched(&self) -> bool {
        self.matched_by.is_some()
    }
}

/// Backend contract: index of the first filter (in load order) contained in `text`
pub trait ContainmentMatcher: Send + Sync {
    fn first_match(&self, text: &str) -> Option<usize>;

    fn is_match(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    fn name(&self) -> &'static str;
}

/// Linear scan over per-filter finders
pub struct ScanMatcher {
    finders: Vec<Finder<'static>>,
    shortest: usize,
}

impl ScanMatcher {
    pub fn new(filters: &[String]) -> Self {
        let finders = filters
            .iter()
            .map(|f| Finder::new(f.as_bytes()).into_owned())
            .collect();
        let shortest = filters.iter().map(String::len).min().unwrap_or(0);
        Self { finders, shortest }
    }
}

impl ContainmentMatcher for ScanMatcher {
    #[inline]
    fn first_match(&self, text: &str) -> Option<usize> {
        let haystack = text.as_bytes();
        if self.finders.is_empty() || haystack.len() < self.shortest {
            return None;
        }

        self.finders.iter().position(|finder| {
            finder.needle().len() <= haystack.len() && finder.find(haystack).is_some()
        })
    }

    fn name(&self) -> &'static str {
        "scan"
    }
}

/// Aho-Corasick automaton over all filters
pub struct AutomatonMatcher {
    automaton: AhoCorasick,
}

impl AutomatonMatcher {
    pub fn new(filters: &[String]) -> Result<Self, aho_corasick::BuildError> {
        // Standard semantics are required for overlapping search
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(filters)?;
        Ok(Self { automaton })
    }
}

impl ContainmentMatcher for AutomatonMatcher {
    fn first_match(&self, text: &str) -> Option<usize> {
        if !self.automaton.is_match(text) {
            return None;
        }

        let mut first: Option<usize> = None;
        for m in self.automaton.find_overlapping_iter(text) {
            let id = m.pattern().as_usize();
            if id == 0 {
                return Some(0);
            }
            if first.map_or(true, |f| id < f) {
                first = Some(id);
            }
        }
        first
    }

    fn is_match(&self, text: &str) -> bool {
        self.automaton.is_match(text)
    }

    fn name(&self) -> &'static str {
        "automaton"
    }
}

/// Create the backend for a strategy, falling back to a scan if the
/// automaton cannot be built
pub fn create_matcher(
    strategy: MatchStrategy,
    filters: &[String],
) -> Box<dyn ContainmentMatcher> {
    let use_automaton = match strategy {
        MatchStrategy::Scan => false,
        MatchStrategy::Automaton => true,
        MatchStrategy::Auto => filters.len() > AUTOMATON_THRESHOLD,
    };

    if use_automaton {
        if let Ok(matcher) = AutomatonMatcher::new(filters) {
            return Box::new(matcher);
        }
    }
    Box::new(ScanMatcher::new(filters))
}

/// Read-only containment engine built once per run
pub struct MatchEngine {
    filters: Vec<String>,
    matcher: Box<dyn ContainmentMatcher>,
    summary: FilterSummary,
}

impl MatchEngine {
    /// Build with default options
    pub fn build<I, S>(filter_lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build_with(filter_lines, MatchOptions::default())
    }

    /// Discard blank lines, deduplicate, and compile the retained filters
    pub fn build_with<I, S>(filter_lines: I, options: MatchOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = FilterSummary::default();
        let mut filters: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize, RandomState> =
            HashMap::with_hasher(RandomState::new());

        for line in filter_lines {
            let line = line.as_ref();
            summary.loaded += 1;

            if line.trim().is_empty() {
                summary.blank += 1;
                continue;
            }

            let filter = if options.trim_filters { line.trim() } else { line };
            let count = counts.entry(filter.to_string()).or_insert(0);
            if *count == 0 {
                filters.push(filter.to_string());
            }
            *count += 1;
        }

        summary.retained = filters.len();
        summary.duplicates = filters
            .iter()
            .filter_map(|f| {
                let count = counts.get(f.as_str()).copied().unwrap_or(0);
                (count > 1).then(|| (f.clone(), count))
            })
            .collect();

        let matcher = create_matcher(options.strategy, &filters);
        summary.strategy = matcher.name();

        Self {
            filters,
            matcher,
            summary,
        }
    }

    /// First retained filter (in load order) contained in `text`
    #[inline]
    pub fn matches(&self, text: &str) -> Option<&str> {
        self.matcher
            .first_match(text)
            .map(|idx| self.filters[idx].as_str())
    }

    /// Whether any retained filter is contained in `text`
    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    /// Test a source line, keeping it together with the outcome
    pub fn evaluate(&self, line: SourceLine) -> MatchResult<'_> {
        let matched_by = self.matches(&line.text);
        MatchResult { line, matched_by }
    }

    pub fn summary(&self) -> &FilterSummary {
        &self.summary
    }
}
