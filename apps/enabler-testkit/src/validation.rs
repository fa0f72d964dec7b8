//! Reusable output checks for the listener harness.

use crate::models::{ParsedOutput, ValidationOutcome};
use std::collections::HashSet;
use std::hash::Hash;
use tracing::{debug, error};

/// Values that repeat an earlier element, in input order.
///
/// Every occurrence past the first is reported, so a value seen three times
/// appears twice: `[1, 2, 2, 3, 3, 3]` yields `[2, 3, 3]`.
pub fn find_duplicates<T: Eq + Hash + Clone>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|it| !seen.insert(*it))
        .cloned()
        .collect()
}

/// Baseline check: nothing outside the expected message template.
pub fn validate_default(parsed: &ParsedOutput) -> ValidationOutcome {
    if parsed.unmatched.is_empty() {
        return ValidationOutcome::Success;
    }
    error!(
        "{} unexpected line(s) in output: {:?}",
        parsed.unmatched.len(),
        parsed.unmatched
    );
    ValidationOutcome::StderrOutput
}

/// What a listener run is expected to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expectations {
    /// Exact number of matched samples.
    pub samples: Option<usize>,
    /// Maximum tolerated duplicate payloads.
    pub max_duplicates: Option<usize>,
}

/// Default check, then duplicate ceiling, then exact sample count.
pub fn validate_listener(parsed: &ParsedOutput, expect: &Expectations) -> ValidationOutcome {
    let ret = validate_default(parsed);
    if !ret.is_success() {
        return ret;
    }

    if let Some(allowed) = expect.max_duplicates {
        let duplicated = find_duplicates(&parsed.matched).len();
        if duplicated > allowed {
            error!(
                "{} duplicated messages found. Maximum allowed {}.",
                duplicated, allowed
            );
            return ValidationOutcome::DuplicatesExceeded;
        }
        debug!("{} duplicated messages (allowed {})", duplicated, allowed);
    }

    if let Some(samples) = expect.samples {
        if parsed.matched.len() != samples {
            error!(
                "Number of messages received: {}. Expected {}",
                parsed.matched.len(),
                samples
            );
            return ValidationOutcome::NotValidMessages;
        }
    }

    ValidationOutcome::Success
}
