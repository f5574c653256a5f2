//! Fuzzy resolution of user-supplied column labels.
//!
//! Labels coming out of natural-language plans rarely match headers exactly
//! ("Customer's Age" for `age`, "order date" for `orderDate`). Resolution
//! walks four strategies in order and stops at the first hit:
//!
//! 1. exact, case-sensitive match;
//! 2. case-insensitive match;
//! 3. normalized label (leading possessive/article and interior prepositions
//!    removed) contained in a header, or containing one;
//! 4. camelCase / snake_case / PascalCase variants of the normalized label.
//!
//! A miss is reported as `None`, never as an error.

use std::sync::OnceLock;

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use log::debug;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    CaseInsensitive,
    Substring,
    CaseVariant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMatch {
    pub index: usize,
    pub header: String,
    pub strategy: MatchStrategy,
}

pub struct ColumnResolver<'a> {
    headers: &'a [String],
}

impl<'a> ColumnResolver<'a> {
    pub fn new(headers: &'a [String]) -> Self {
        Self { headers }
    }

    pub fn resolve(&self, label: &str) -> Option<ColumnMatch> {
        let resolved = self.resolve_inner(label.trim());
        match &resolved {
            Some(found) => debug!(
                "Resolved column '{label}' to '{}' via {:?}",
                found.header, found.strategy
            ),
            None => debug!("Column '{label}' did not match any header"),
        }
        resolved
    }

    fn resolve_inner(&self, label: &str) -> Option<ColumnMatch> {
        if label.is_empty() {
            return None;
        }
        if let Some(idx) = self.headers.iter().position(|h| h == label) {
            return Some(self.found(idx, MatchStrategy::Exact));
        }
        let lowered = label.to_lowercase();
        if let Some(idx) = self
            .headers
            .iter()
            .position(|h| h.to_lowercase() == lowered)
        {
            return Some(self.found(idx, MatchStrategy::CaseInsensitive));
        }

        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return None;
        }
        if let Some(idx) = self.headers.iter().position(|h| {
            let header = h.to_lowercase();
            !header.is_empty() && (header.contains(&normalized) || normalized.contains(&header))
        }) {
            return Some(self.found(idx, MatchStrategy::Substring));
        }

        let variants = [
            normalized.to_lower_camel_case(),
            normalized.to_snake_case(),
            normalized.to_upper_camel_case(),
        ];
        self.headers
            .iter()
            .position(|h| {
                variants
                    .iter()
                    .any(|variant| variant.eq_ignore_ascii_case(h))
            })
            .map(|idx| self.found(idx, MatchStrategy::CaseVariant))
    }

    fn found(&self, index: usize, strategy: MatchStrategy) -> ColumnMatch {
        ColumnMatch {
            index,
            header: self.headers[index].clone(),
            strategy,
        }
    }
}

fn leading_qualifier() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[a-z0-9_]+'s|the|a|an)\s+").expect("qualifier pattern is a valid regex")
    })
}

fn interior_preposition() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\s+(?:of|for|in|at|on)\s+").expect("preposition pattern is a valid regex")
    })
}

/// Lower-cases the label, strips a leading possessive or article, and collapses
/// interior prepositions ("the price of item" becomes "price item").
pub fn normalize_label(label: &str) -> String {
    let lowered = label.trim().to_lowercase().replace('\u{2019}', "'");
    let stripped = leading_qualifier().replace(&lowered, "");
    let collapsed = interior_preposition().replace_all(&stripped, " ");
    collapsed.split_whitespace().collect::<Vec<_>>().join(" ")
}
