//! Managed-region patching for generated files.
//!
//! A target file is split into `(prefix, block, suffix)` by a
//! [`RegionLocator`]; the block is replaced with freshly rendered content and
//! the file is written back through a temp file in the same directory
//! followed by a rename, so an interrupted run never leaves a truncated
//! target behind.

use regex::Regex;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Locate {
        path: PathBuf,
        #[source]
        source: Box<PatchError>,
    },
}

/// Finds the byte range of the managed block inside a file's text.
pub trait RegionLocator {
    fn locate(&self, text: &str) -> Result<Range<usize>, PatchError>;
}

/// Byte offset just past the end of the line containing `pos`.
fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map(|i| pos + i + 1).unwrap_or(text.len())
}

/// Block of entry lines directly following a marker line.
///
/// The block is the run of lines starting with `entry_prefix` (after
/// leading whitespace) right after the line that holds `marker`. An empty
/// run yields an empty range positioned after the marker line.
pub struct MarkerBlock<'a> {
    pub marker: &'a str,
    pub entry_prefix: &'a str,
}

impl RegionLocator for MarkerBlock<'_> {
    fn locate(&self, text: &str) -> Result<Range<usize>, PatchError> {
        let at = text.find(self.marker).ok_or_else(|| PatchError::NotFound {
            what: format!("marker `{}`", self.marker),
        })?;
        let start = line_end(text, at);
        let mut end = start;
        while end < text.len() {
            let next = line_end(text, end);
            if !text[end..next].trim_start().starts_with(self.entry_prefix) {
                break;
            }
            end = next;
        }
        Ok(start..end)
    }
}

/// Block of entry lines (and blank lines) immediately preceding the last
/// occurrence of a sentinel such as `#endif`.
///
/// The range starts right after the last line that is neither blank nor an
/// entry and stops at the sentinel, so it also covers the line break that
/// ends that line.
pub struct SentinelBlock<'a> {
    pub sentinel: &'a str,
    pub entry_prefix: &'a str,
}

impl RegionLocator for SentinelBlock<'_> {
    fn locate(&self, text: &str) -> Result<Range<usize>, PatchError> {
        let end = text.rfind(self.sentinel).ok_or_else(|| PatchError::NotFound {
            what: format!("sentinel `{}`", self.sentinel),
        })?;
        let mut start = text[..end].trim_end().len();
        loop {
            let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let line = text[line_start..start].trim();
            if !line.starts_with(self.entry_prefix) {
                break;
            }
            start = text[..line_start].trim_end().len();
        }
        Ok(start..end)
    }
}

/// Block matched by a regular expression (first match).
pub struct PatternBlock<'a> {
    pub pattern: &'a Regex,
    pub what: &'a str,
}

impl RegionLocator for PatternBlock<'_> {
    fn locate(&self, text: &str) -> Result<Range<usize>, PatchError> {
        self.pattern
            .find(text)
            .map(|m| m.range())
            .ok_or_else(|| PatchError::NotFound {
                what: self.what.to_string(),
            })
    }
}

/// Replace the block found by `locator` with `body`.
pub fn patch_text(
    text: &str,
    locator: &dyn RegionLocator,
    body: &str,
) -> Result<String, PatchError> {
    let range = locator.locate(text)?;
    let mut out = String::with_capacity(text.len() + body.len());
    out.push_str(&text[..range.start]);
    out.push_str(body);
    out.push_str(&text[range.end..]);
    Ok(out)
}

/// Outcome of patching one file.
#[derive(Debug, Clone)]
pub struct PatchResult {
    pub path: PathBuf,
    pub changed: bool,
    pub wrote: bool,
}

/// Patch the managed block of `path`. Writes only when `write` is set and
/// the content actually changes.
pub fn patch_file(
    path: &Path,
    locator: &dyn RegionLocator,
    body: &str,
    write: bool,
) -> Result<PatchResult, PatchError> {
    let original = fs::read_to_string(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let updated = patch_text(&original, locator, body).map_err(|e| PatchError::Locate {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    let changed = updated != original;
    let wrote = changed && write;
    if wrote {
        write_atomic(path, &updated)?;
    }
    Ok(PatchResult {
        path: path.to_path_buf(),
        changed,
        wrote,
    })
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), PatchError> {
    let err = |source| PatchError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(err)?;
    tmp.write_all(contents.as_bytes()).map_err(err)?;
    tmp.as_file().sync_all().map_err(err)?;
    // keep the target's permissions
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(err)?;
    }
    tmp.persist(path).map_err(|e| err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_marker_block_covers_following_entries_only() {
        let text = "head\n// marker\nENTRY(a);\n  ENTRY(b);\n\nENTRY(c);\ntail\n";
        let loc = MarkerBlock {
            marker: "// marker",
            entry_prefix: "ENTRY(",
        };
        let r = loc.locate(text).unwrap();
        assert_eq!(&text[r.clone()], "ENTRY(a);\n  ENTRY(b);\n");
        let out = patch_text(text, &loc, "ENTRY(z);\n").unwrap();
        assert_eq!(out, "head\n// marker\nENTRY(z);\n\nENTRY(c);\ntail\n");
    }

    #[test]
    fn test_marker_block_empty_run_inserts_after_marker() {
        let text = "// marker\n\n}\n";
        let loc = MarkerBlock {
            marker: "// marker",
            entry_prefix: "ENTRY(",
        };
        let out = patch_text(text, &loc, "ENTRY(x);\n").unwrap();
        assert_eq!(out, "// marker\nENTRY(x);\n\n}\n");
    }

    #[test]
    fn test_missing_marker_is_an_error() {
        let loc = MarkerBlock {
            marker: "// marker",
            entry_prefix: "ENTRY(",
        };
        assert!(matches!(
            loc.locate("nothing here"),
            Err(PatchError::NotFound { .. })
        ));
    }

    #[test]
    fn test_sentinel_block_spans_entries_and_blanks_before_last_sentinel() {
        let text = "#ifndef X\n#define X\n// note\n\n#include \"a.h\"\n\n#include \"b.h\"\n\n#endif /* X */\n";
        let loc = SentinelBlock {
            sentinel: "#endif",
            entry_prefix: "#include \"",
        };
        let r = loc.locate(text).unwrap();
        assert_eq!(
            &text[r],
            "\n\n#include \"a.h\"\n\n#include \"b.h\"\n\n"
        );
        let out = patch_text(text, &loc, "\n\n#include \"c.h\"\n\n").unwrap();
        assert_eq!(
            out,
            "#ifndef X\n#define X\n// note\n\n#include \"c.h\"\n\n#endif /* X */\n"
        );
    }

    #[test]
    fn test_pattern_block() {
        let re = Regex::new(r"(?s)set\(LIST\s*\n.*?\)").unwrap();
        let loc = PatternBlock {
            pattern: &re,
            what: "LIST",
        };
        let text = "a\nset(LIST\n    x\n    y\n)\nb\n";
        let out = patch_text(text, &loc, "set(LIST\n    z\n)").unwrap();
        assert_eq!(out, "a\nset(LIST\n    z\n)\nb\n");
    }

    #[test]
    fn test_patch_file_is_idempotent_and_skips_unchanged_writes() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("target.cpp");
        fs::write(&path, "// marker\nENTRY(old);\nrest\n").unwrap();
        let loc = MarkerBlock {
            marker: "// marker",
            entry_prefix: "ENTRY(",
        };
        let first = patch_file(&path, &loc, "ENTRY(new);\n", true).unwrap();
        assert!(first.changed && first.wrote);
        let after_first = fs::read_to_string(&path).unwrap();
        let second = patch_file(&path, &loc, "ENTRY(new);\n", true).unwrap();
        assert!(!second.changed && !second.wrote);
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
        assert_eq!(after_first, "// marker\nENTRY(new);\nrest\n");
    }

    #[test]
    fn test_patch_file_without_write_leaves_target() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("target.cpp");
        fs::write(&path, "// marker\nENTRY(old);\n").unwrap();
        let loc = MarkerBlock {
            marker: "// marker",
            entry_prefix: "ENTRY(",
        };
        let res = patch_file(&path, &loc, "ENTRY(new);\n", false).unwrap();
        assert!(res.changed && !res.wrote);
        assert_eq!(fs::read_to_string(&path).unwrap(), "// marker\nENTRY(old);\n");
        // no stray temp files left behind
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
