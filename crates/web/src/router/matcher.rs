//! Longest and nearest path matching.
//!
//! A path is matched against an ordered list of [`Pattern`]s. The winners are the matches
//! with the smallest start offset, and among those the longest ones. Candidates tied on both
//! stay in registration order so the router can try each of them in turn.

use std::cmp::Ordering;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::request::RouteParams;

/// A route pattern: a literal path or a regular expression.
///
/// Both kinds match case-insensitively. A literal only matches the whole path.
#[derive(Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(path: impl Into<String>) -> Self {
        Pattern::Literal(path.into())
    }

    /// Compiles `re` as a case-insensitive regular expression.
    pub fn regex(re: &str) -> Result<Self, regex::Error> {
        RegexBuilder::new(re).case_insensitive(true).build().map(Pattern::Regex)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(literal) => literal,
            Pattern::Regex(regex) => regex.as_str(),
        }
    }

    fn find(&self, path: &str, index: usize) -> Option<PatternMatch> {
        match self {
            Pattern::Literal(literal) => path
                .eq_ignore_ascii_case(literal)
                .then(|| PatternMatch { index, offset: 0, len: literal.len(), params: RouteParams::default() }),
            Pattern::Regex(regex) => {
                let captures = regex.captures(path)?;
                let whole = captures.get(0)?;
                Some(PatternMatch {
                    index,
                    offset: whole.start(),
                    len: whole.len(),
                    params: RouteParams::from_captures(regex, &captures),
                })
            }
        }
    }
}

impl From<&str> for Pattern {
    fn from(literal: &str) -> Self {
        Pattern::literal(literal)
    }
}

impl From<String> for Pattern {
    fn from(literal: String) -> Self {
        Pattern::Literal(literal)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(literal) => f.debug_tuple("Literal").field(literal).finish(),
            Pattern::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
        }
    }
}

/// One matching pattern, identified by its position in the searched list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
    pub params: RouteParams,
}

/// Returns every pattern whose match starts earliest in `path` and, among those, is the
/// longest. Ties are returned in the order of `patterns`; no match gives an empty vec.
pub fn find_longest_and_nearest_matches<'a, I>(path: &str, patterns: I) -> Vec<PatternMatch>
where
    I: IntoIterator<Item = &'a Pattern>,
{
    let mut best: Vec<PatternMatch> = Vec::new();

    for (index, pattern) in patterns.into_iter().enumerate() {
        let Some(found) = pattern.find(path, index) else {
            continue;
        };

        let ordering = match best.first() {
            Some(current) => found.offset.cmp(&current.offset).then(current.len.cmp(&found.len)),
            None => Ordering::Less,
        };

        match ordering {
            Ordering::Less => {
                best.clear();
                best.push(found);
            }
            Ordering::Equal => best.push(found),
            Ordering::Greater => {}
        }
    }

    best
}
