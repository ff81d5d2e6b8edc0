//! Regex-backed name filters.
//!
//! A [`NameFilter`] is an ordered chain of include/exclude rules matched
//! against file paths or dotted type names. The last rule that matches wins;
//! when nothing matches, a name is accepted unless the chain contains at
//! least one include rule. An empty filter accepts everything.

use crate::error::{ClassmapError, Result};
use regex::Regex;

#[derive(Debug, Clone)]
enum Rule {
    Include(Regex),
    Exclude(Regex),
}

impl Rule {
    fn matches(&self, name: &str) -> bool {
        match self {
            Rule::Include(re) | Rule::Exclude(re) => re.is_match(name),
        }
    }
}

/// An ordered include/exclude chain over names.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    rules: Vec<Rule>,
}

impl NameFilter {
    /// An empty filter that accepts every name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an include rule for the given regex.
    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.rules.push(Rule::Include(compile(pattern)?));
        Ok(self)
    }

    /// Append an exclude rule for the given regex.
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.rules.push(Rule::Exclude(compile(pattern)?));
        Ok(self)
    }

    /// Include everything under a dotted package prefix.
    pub fn include_package(self, package: &str) -> Result<Self> {
        self.include(&package_pattern(package))
    }

    /// Exclude everything under a dotted package prefix.
    pub fn exclude_package(self, package: &str) -> Result<Self> {
        self.exclude(&package_pattern(package))
    }

    /// Parse a comma-separated chain of signed patterns, e.g.
    /// `"+com\\.app\\..*, -com\\.app\\.internal\\..*"`. A leading `+` marks
    /// an include rule and `-` an exclude rule; a pattern with neither sign
    /// is treated as an include.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut filter = NameFilter::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            filter = if let Some(rest) = part.strip_prefix('+') {
                filter.include(rest)?
            } else if let Some(rest) = part.strip_prefix('-') {
                filter.exclude(rest)?
            } else {
                filter.include(part)?
            };
        }
        Ok(filter)
    }

    /// Whether the chain accepts `name`. Rules are evaluated in order and
    /// the last match decides; an unmatched name is accepted only when the
    /// chain has no include rules.
    pub fn test(&self, name: &str) -> bool {
        let mut accept = !self.rules.iter().any(|r| matches!(r, Rule::Include(_)));
        for rule in &self.rules {
            if rule.matches(name) {
                accept = matches!(rule, Rule::Include(_));
            }
        }
        accept
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ClassmapError::Filter {
        pattern: pattern.to_string(),
        source,
    })
}

fn package_pattern(package: &str) -> String {
    let mut pattern = regex::escape(package);
    if !package.is_empty() && !package.ends_with('.') {
        pattern.push_str(r"\.");
    }
    pattern.push_str(".*");
    pattern
}
