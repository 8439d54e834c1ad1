//! Tool-name and pattern filters used to narrow MCP tool discovery.

use regex::Regex;
use std::collections::HashSet;

/// Decides whether a discovered tool, identified by `name`/`description`,
/// should be kept.
pub trait Filter: Send + Sync {
    fn matches(&self, name: &str, description: &str) -> bool;
}

/// Keeps every tool. The identity filter.
pub struct NoFilter;

impl Filter for NoFilter {
    fn matches(&self, _name: &str, _description: &str) -> bool {
        true
    }
}

/// Keeps only tools whose name is in the given set. An empty set passes
/// everything through.
pub struct Include {
    names: HashSet<String>,
}

impl Include {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter for Include {
    fn matches(&self, name: &str, _description: &str) -> bool {
        self.names.is_empty() || self.names.contains(name)
    }
}

/// Drops tools whose name is in the given set. An empty set passes
/// everything through.
pub struct Exclude {
    names: HashSet<String>,
}

impl Exclude {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter for Exclude {
    fn matches(&self, name: &str, _description: &str) -> bool {
        self.names.is_empty() || !self.names.contains(name)
    }
}

/// Which projection(s) of a tool a pattern filter is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternTarget {
    Name,
    Description,
    Both,
}

/// Keeps tools whose name and/or description match at least one pattern. An
/// empty pattern list passes everything through.
pub struct PatternInclude {
    patterns: Vec<Regex>,
    target: PatternTarget,
}

impl PatternInclude {
    pub fn new(patterns: Vec<Regex>, target: PatternTarget) -> Self {
        Self { patterns, target }
    }
}

impl Filter for PatternInclude {
    fn matches(&self, name: &str, description: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        self.patterns
            .iter()
            .any(|re| pattern_target_matches(re, self.target, name, description))
    }
}

/// Drops tools whose name and/or description match any pattern. An empty
/// pattern list passes everything through.
pub struct PatternExclude {
    patterns: Vec<Regex>,
    target: PatternTarget,
}

impl PatternExclude {
    pub fn new(patterns: Vec<Regex>, target: PatternTarget) -> Self {
        Self { patterns, target }
    }
}

impl Filter for PatternExclude {
    fn matches(&self, name: &str, description: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        !self
            .patterns
            .iter()
            .any(|re| pattern_target_matches(re, self.target, name, description))
    }
}

fn pattern_target_matches(re: &Regex, target: PatternTarget, name: &str, description: &str) -> bool {
    match target {
        PatternTarget::Name => re.is_match(name),
        PatternTarget::Description => re.is_match(description),
        PatternTarget::Both => re.is_match(name) || re.is_match(description),
    }
}

/// Wraps an arbitrary closure as a [`Filter`].
pub struct FuncFilter<F> {
    func: F,
}

impl<F> FuncFilter<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Filter for FuncFilter<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, name: &str, description: &str) -> bool {
        (self.func)(name, description)
    }
}

/// Applies a sequence of filters left to right; a tool survives only if it
/// passes every filter in the chain.
pub struct Composite {
    filters: Vec<Box<dyn Filter>>,
}

impl Composite {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }
}

impl Filter for Composite {
    fn matches(&self, name: &str, description: &str) -> bool {
        self.filters.iter().all(|f| f.matches(name, description))
    }
}
