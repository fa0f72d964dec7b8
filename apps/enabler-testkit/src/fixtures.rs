//! Typed-test fixture regeneration.
//!
//! Keeps three artifacts in sync with the discovered struct records:
//! - the types header: one `#include` per IDL file, before the last `#endif`;
//! - the test source: one test-registration macro per struct, after a marker
//!   comment;
//! - the CMake list: one test name per struct inside `set(TEST_LIST ...)`.
//!
//! Struct-name ignore patterns filter the macros and the test list but never
//! the header includes, since ignored types may still be referenced by
//! other generated code.

use crate::models::StructRecord;
use crate::region::{self, MarkerBlock, PatchError, PatchResult, PatternBlock, SentinelBlock};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Marker comment that precedes the generated macro block.
pub const DEFAULT_MARKER: &str =
    "// This macros are updated automatically using the update_headers_and_create_cases.py script";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
/// Naming conventions of the generated test code.
pub struct FixtureLayout {
    /// Directory prefix of generated type headers in `#include` lines.
    pub include_dir: String,
    pub macro_name: String,
    pub test_prefix: String,
    pub marker: String,
    /// CMake variable holding the test list.
    pub test_list: String,
}

impl Default for FixtureLayout {
    fn default() -> Self {
        Self {
            include_dir: "types".to_string(),
            macro_name: "DEFINE_DDSENABLER_TYPED_TEST".to_string(),
            test_prefix: "ddsenabler_send_samples_".to_string(),
            marker: DEFAULT_MARKER.to_string(),
            test_list: "TEST_LIST".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid struct ignore pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Glob-style struct-name filter (`*`, `?`, `[...]`).
#[derive(Debug, Clone, Default)]
pub struct StructFilter {
    patterns: Vec<glob::Pattern>,
}

impl StructFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p.as_ref()).map_err(|source| FilterError::Pattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

fn tested<'a>(
    records: &'a BTreeSet<StructRecord>,
    filter: &'a StructFilter,
) -> impl Iterator<Item = &'a StructRecord> + 'a {
    records.iter().filter(move |r| {
        let ignored = filter.is_ignored(&r.name);
        if ignored {
            debug!("Ignoring struct {} from {}", r.name, r.idl_file);
        }
        !ignored
    })
}

/// Sorted, deduplicated include lines, one per IDL file.
pub fn render_includes(records: &BTreeSet<StructRecord>, layout: &FixtureLayout) -> String {
    let lines: BTreeSet<String> = records
        .iter()
        .map(|r| {
            format!(
                "#include \"{}/{}PubSubTypes.hpp\"\n",
                layout.include_dir, r.idl_file
            )
        })
        .collect();
    lines.into_iter().collect()
}

/// One macro invocation per non-ignored struct, in (file, struct) order.
pub fn render_macros(
    records: &BTreeSet<StructRecord>,
    filter: &StructFilter,
    layout: &FixtureLayout,
) -> String {
    tested(records, filter)
        .map(|r| {
            format!(
                "{}({}{}, {});\n",
                layout.macro_name,
                layout.test_prefix,
                r.name,
                r.pubsub_type()
            )
        })
        .collect()
}

/// Full `set(<LIST> ...)` command for the non-ignored structs.
pub fn render_test_list(
    records: &BTreeSet<StructRecord>,
    filter: &StructFilter,
    layout: &FixtureLayout,
) -> String {
    let mut out = format!("set({}\n", layout.test_list);
    for r in tested(records, filter) {
        out.push_str(&format!("    {}{}\n", layout.test_prefix, r.name));
    }
    out.push(')');
    out
}

/// Regenerate the include block of the types header.
pub fn update_types_header_file(
    path: &Path,
    records: &BTreeSet<StructRecord>,
    layout: &FixtureLayout,
    write: bool,
) -> Result<PatchResult, PatchError> {
    let body = format!("\n\n{}\n", render_includes(records, layout));
    let locator = SentinelBlock {
        sentinel: "#endif",
        entry_prefix: "#include \"",
    };
    let res = region::patch_file(path, &locator, &body, write)?;
    log_result("Header file", &res);
    Ok(res)
}

/// Regenerate the test-registration macros after the marker comment.
pub fn update_tests_macros(
    path: &Path,
    records: &BTreeSet<StructRecord>,
    filter: &StructFilter,
    layout: &FixtureLayout,
    write: bool,
) -> Result<PatchResult, PatchError> {
    let body = render_macros(records, filter, layout);
    let entry_prefix = format!("{}(", layout.macro_name);
    let locator = MarkerBlock {
        marker: &layout.marker,
        entry_prefix: &entry_prefix,
    };
    let res = region::patch_file(path, &locator, &body, write)?;
    log_result("Test macros", &res);
    Ok(res)
}

/// Regenerate the `set(TEST_LIST ...)` block of the CMake file.
pub fn update_tests_cmake(
    path: &Path,
    records: &BTreeSet<StructRecord>,
    filter: &StructFilter,
    layout: &FixtureLayout,
    write: bool,
) -> Result<PatchResult, PatchError> {
    let body = render_test_list(records, filter, layout);
    let pattern = Regex::new(&format!(
        r"(?s)set\({}\s*\n.*?\)",
        regex::escape(&layout.test_list)
    ))
    .map_err(|e| PatchError::NotFound {
        what: format!("usable test list name: {}", e),
    })?;
    let what = format!("set({} ...) block", layout.test_list);
    let locator = PatternBlock {
        pattern: &pattern,
        what: &what,
    };
    let res = region::patch_file(path, &locator, &body, write)?;
    log_result("Test list", &res);
    Ok(res)
}

fn log_result(what: &str, res: &PatchResult) {
    if res.wrote {
        info!("{} '{}' updated successfully.", what, res.path.display());
    } else if res.changed {
        info!("{} '{}' is out of date.", what, res.path.display());
    } else {
        info!("{} '{}' already up to date.", what, res.path.display());
    }
}
