//! IDL tree discovery.
//!
//! Walks a directory for `*.idl` files, skips ignored file names and turns
//! every struct declaration into a [`StructRecord`].

use crate::idl::{self, IdlError};
use crate::models::StructRecord;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IDL root not found: {0}")]
    MissingRoot(PathBuf),
    #[error("invalid glob for {path}: {source}")]
    Pattern {
        path: PathBuf,
        #[source]
        source: glob::PatternError,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: glob::GlobError,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: IdlError,
    },
}

/// Scan `root` recursively and collect struct records from every IDL file
/// whose file name is not listed in `ignored_file_names`.
pub fn scan(
    root: &Path,
    ignored_file_names: &BTreeSet<String>,
) -> Result<BTreeSet<StructRecord>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }
    info!("Searching for .idl files in {}", root.display());
    let pattern = glob::Pattern::escape(&root.to_string_lossy()) + "/**/*.idl";
    let entries = glob::glob(&pattern).map_err(|source| ScanError::Pattern {
        path: root.to_path_buf(),
        source,
    })?;

    let mut records = BTreeSet::new();
    for entry in entries {
        let path = entry.map_err(|source| ScanError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !path.is_file() {
            continue;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if ignored_file_names.contains(&file_name) {
            debug!("Skipping ignored IDL file: {}", path.display());
            continue;
        }
        info!("Found .idl file: {}", path.display());
        let text = fs::read_to_string(&path).map_err(|source| ScanError::Read {
            path: path.clone(),
            source,
        })?;
        let decls = idl::extract_structures(&text).map_err(|source| ScanError::Parse {
            path: path.clone(),
            source,
        })?;
        let idl_file = idl_file_name(root, &path);
        for d in decls {
            debug!("  struct {} (module '{}')", d.name, d.module_path());
            records.insert(StructRecord::new(
                d.name.clone(),
                idl_file.clone(),
                d.module_path(),
                root,
            ));
        }
    }
    Ok(records)
}

/// Path of `file` relative to `root`, without extension, `/`-separated.
fn idl_file_name(root: &Path, file: &Path) -> String {
    let rel = pathdiff::diff_paths(file, root).unwrap_or_else(|| file.to_path_buf());
    let rel = rel.with_extension("");
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    #[test]
    fn test_scan_collects_records_with_relative_names() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        write(root, "primitives.idl", "struct ShortStruct { short var_short; };");
        write(
            root,
            "helpers/basic_inner_types.idl",
            "module Inner { struct InnerStructure { long l; }; };",
        );
        write(root, "notes.txt", "struct NotIdl { long x; };");

        let records = scan(root, &BTreeSet::new()).unwrap();
        let got: Vec<_> = records
            .iter()
            .map(|r| (r.idl_file.as_str(), r.name.as_str(), r.module.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("helpers/basic_inner_types", "InnerStructure", "Inner"),
                ("primitives", "ShortStruct", ""),
            ]
        );
        assert!(records.iter().all(|r| r.root == root));
    }

    #[test]
    fn test_scan_skips_ignored_file_names() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        write(root, "declarations.idl", "struct Declared { long x; };");
        write(root, "sub/declarations.idl", "struct AlsoDeclared { long x; };");
        write(root, "kept.idl", "struct Kept { long x; };");

        let ignored: BTreeSet<String> = ["declarations.idl".to_string()].into_iter().collect();
        let records = scan(root, &ignored).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Kept"]);
    }

    #[test]
    fn test_scan_reports_parse_errors_with_path() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "broken.idl", "module m { struct A { long x; };");
        let err = scan(tmp.path(), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
        assert!(err.to_string().contains("broken.idl"));
    }

    #[test]
    fn test_scan_missing_root() {
        let tmp = tempdir().unwrap();
        let err = scan(&tmp.path().join("nope"), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, ScanError::MissingRoot(_)));
    }
}
