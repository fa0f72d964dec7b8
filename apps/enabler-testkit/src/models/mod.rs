//! Shared data models for the fixture generator and the listener harness.

pub mod outcome;
pub mod record;

pub use outcome::ValidationOutcome;
pub use record::StructRecord;

use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
/// Captured output split into template payloads and everything else.
pub struct ParsedOutput {
    pub matched: Vec<String>,
    pub unmatched: Vec<String>,
}
