//! Configuration discovery and effective settings resolution.
//!
//! The testkit reads `testkit.toml|yaml|yml` from the current directory (or
//! the closest ancestor, stopping at a `.git` directory), or from an explicit
//! `--config` path, and merges it with CLI flags.
//! Defaults:
//! - `output`: `human`
//! - `idl.test_dir`: current directory
//! - `idl.root`: `<test_dir>/../resources/dds-types-test/IDL`
//! - `listener.command`: the ROS 2 demo listener
//! - `listener.timeout`: 5 seconds, `listener.delay`: 0, `listener.grace`: 2
//!
//! Overrides precedence: CLI > config file > defaults. Relative paths from
//! the config file resolve against the file's directory; relative CLI paths
//! resolve against the current directory.

use crate::fixtures::FixtureLayout;
use crate::listener::MessageTemplate;
use crate::validation::Expectations;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_NAMES: [&str; 3] = ["testkit.toml", "testkit.yaml", "testkit.yml"];

/// IDL files that never produce fixtures.
pub const DEFAULT_IGNORED_FILES: [&str; 4] = [
    "declarations.idl",
    "external.idl",
    // @autoid(HASH) cannot be expressed through the dynamic type API
    "member_id.idl",
    "relative_path_include.idl",
];

/// Struct names excluded from generated tests.
pub const DEFAULT_IGNORED_STRUCTS: [&str; 4] = [
    "MapWString*",
    "MapInnerAliasBoundedWStringHelper*",
    "AnnotatedStruct",
    "foo",
];

pub const DEFAULT_LISTENER: [&str; 2] = ["python3", "/opt/ros/jazzy/lib/demo_nodes_py/listener"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `testkit.toml|yaml`.
pub struct TestkitConfig {
    pub output: Option<String>,
    pub idl: Option<IdlCfg>,
    pub listener: Option<ListenerCfg>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Fixture generator section under `[idl]`.
pub struct IdlCfg {
    pub root: Option<String>,
    pub test_dir: Option<String>,
    pub header: Option<String>,
    pub tests_source: Option<String>,
    pub cmake: Option<String>,
    pub ignore_files: Option<Vec<String>>,
    pub ignore_structs: Option<Vec<String>>,
    pub layout: Option<FixtureLayout>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Harness section under `[listener]`.
pub struct ListenerCfg {
    pub command: Option<Vec<String>>,
    pub samples: Option<usize>,
    pub timeout: Option<u64>,
    pub delay: Option<f64>,
    pub allow_duplicates: Option<usize>,
    pub timeout_as_error: Option<bool>,
    pub grace: Option<f64>,
    pub template: Option<MessageTemplate>,
}

/// A loaded config file and the directory its relative paths resolve from.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub config: TestkitConfig,
    pub base: PathBuf,
}

/// Walk upward from `start` to the directory holding a config file.
///
/// Stops at the first directory with a `testkit.*` file or a `.git`
/// directory; falls back to `start`.
pub fn detect_config_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Parse one config file, choosing the format by extension.
pub fn load_file(path: &Path) -> Result<TestkitConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&s).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        toml::from_str(&s).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load `testkit.toml` or `testkit.yaml|yml` from `root` if present.
pub fn load_config(root: &Path) -> Result<Option<TestkitConfig>, ConfigError> {
    for name in CONFIG_NAMES {
        let p = root.join(name);
        if p.exists() {
            return load_file(&p).map(Some);
        }
    }
    Ok(None)
}

/// Load an explicit config file, or discover one upward from `cwd`.
pub fn locate(explicit: Option<&str>, cwd: &Path) -> Result<Option<Loaded>, ConfigError> {
    if let Some(p) = explicit {
        let path = cwd.join(p);
        let config = load_file(&path)?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());
        return Ok(Some(Loaded { config, base }));
    }
    let root = detect_config_root(cwd);
    Ok(load_config(&root)?.map(|config| Loaded { config, base: root }))
}

fn resolve_output(cli: Option<&str>, cfg: Option<&TestkitConfig>) -> Result<String, ConfigError> {
    let output = cli
        .map(str::to_string)
        .or_else(|| cfg.and_then(|c| c.output.clone()))
        .unwrap_or_else(|| "human".to_string());
    match output.as_str() {
        "human" | "json" => Ok(output),
        other => Err(ConfigError::Invalid {
            key: "output",
            reason: format!("expected human|json, got `{}`", other),
        }),
    }
}

/// CLI inputs for the fixture generator.
#[derive(Debug, Default, Clone)]
pub struct IdlArgs<'a> {
    pub config: Option<&'a str>,
    pub idl_dir: Option<&'a str>,
    pub test_dir: Option<&'a str>,
    pub output: Option<&'a str>,
}

#[derive(Debug, Clone)]
/// Fully-resolved fixture generator settings.
pub struct IdlEffective {
    pub idl_root: PathBuf,
    pub test_dir: PathBuf,
    pub header: PathBuf,
    pub tests_source: PathBuf,
    pub cmake: PathBuf,
    pub ignore_files: BTreeSet<String>,
    pub ignore_structs: Vec<String>,
    pub layout: FixtureLayout,
    pub output: String,
    pub config_file_found: bool,
}

/// Resolve generator settings by merging CLI flags, config and defaults.
pub fn resolve_idl(args: &IdlArgs<'_>, cwd: &Path) -> Result<IdlEffective, ConfigError> {
    let loaded = locate(args.config, cwd)?;
    let cfg = loaded.as_ref().map(|l| &l.config);
    let base = loaded.as_ref().map(|l| l.base.as_path()).unwrap_or(cwd);
    let idl = cfg.and_then(|c| c.idl.clone()).unwrap_or_default();

    let test_dir = match (args.test_dir, idl.test_dir.as_deref()) {
        (Some(p), _) => cwd.join(p),
        (None, Some(p)) => base.join(p),
        (None, None) => cwd.to_path_buf(),
    };
    let idl_root = match (args.idl_dir, idl.root.as_deref()) {
        (Some(p), _) => cwd.join(p),
        (None, Some(p)) => base.join(p),
        (None, None) => test_dir.join("../resources/dds-types-test/IDL"),
    };
    let in_test_dir = |v: Option<&str>, default: &str| test_dir.join(v.unwrap_or(default));

    Ok(IdlEffective {
        header: in_test_dir(idl.header.as_deref(), "DdsEnablerTypedTestTypeHeaders.hpp"),
        tests_source: in_test_dir(idl.tests_source.as_deref(), "DdsEnablerTypedTest.cpp"),
        cmake: in_test_dir(idl.cmake.as_deref(), "CMakeLists.txt"),
        ignore_files: idl
            .ignore_files
            .unwrap_or_else(|| DEFAULT_IGNORED_FILES.iter().map(|s| s.to_string()).collect())
            .into_iter()
            .collect(),
        ignore_structs: idl
            .ignore_structs
            .unwrap_or_else(|| DEFAULT_IGNORED_STRUCTS.iter().map(|s| s.to_string()).collect()),
        layout: idl.layout.unwrap_or_default(),
        output: resolve_output(args.output, cfg)?,
        config_file_found: loaded.is_some(),
        idl_root,
        test_dir,
    })
}

/// CLI inputs for the listener harness.
#[derive(Debug, Default, Clone)]
pub struct ListenerArgs<'a> {
    pub config: Option<&'a str>,
    pub samples: Option<usize>,
    pub timeout: Option<u64>,
    pub delay: Option<f64>,
    pub allow_duplicates: Option<usize>,
    /// `Some` when `--timeout-as-error` or `--no-timeout-as-error` was given.
    pub timeout_as_error: Option<bool>,
    pub grace: Option<f64>,
    pub output: Option<&'a str>,
    pub command: &'a [String],
}

#[derive(Debug, Clone)]
/// Fully-resolved harness settings.
pub struct ListenerEffective {
    pub command: Vec<String>,
    pub timeout: Duration,
    pub delay: Duration,
    pub grace: Duration,
    pub timeout_as_error: bool,
    pub expectations: Expectations,
    pub template: MessageTemplate,
    pub output: String,
}

fn seconds(key: &'static str, v: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(v).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

/// Resolve harness settings by merging CLI flags, config and defaults.
///
/// Without `--allow-duplicates` (or `listener.allow_duplicates`) the ceiling
/// is 0, so any duplicate sample fails the run.
pub fn resolve_listener(
    args: &ListenerArgs<'_>,
    cwd: &Path,
) -> Result<ListenerEffective, ConfigError> {
    let loaded = locate(args.config, cwd)?;
    let cfg = loaded.as_ref().map(|l| &l.config);
    let lc = cfg.and_then(|c| c.listener.clone()).unwrap_or_default();

    let command = if !args.command.is_empty() {
        args.command.to_vec()
    } else {
        lc.command
            .unwrap_or_else(|| DEFAULT_LISTENER.iter().map(|s| s.to_string()).collect())
    };
    if command.is_empty() {
        return Err(ConfigError::Invalid {
            key: "listener.command",
            reason: "command must not be empty".to_string(),
        });
    }

    Ok(ListenerEffective {
        command,
        timeout: Duration::from_secs(args.timeout.or(lc.timeout).unwrap_or(5)),
        delay: seconds("delay", args.delay.or(lc.delay).unwrap_or(0.0))?,
        grace: seconds("grace", args.grace.or(lc.grace).unwrap_or(2.0))?,
        timeout_as_error: args
            .timeout_as_error
            .or(lc.timeout_as_error)
            .unwrap_or(false),
        expectations: Expectations {
            samples: args.samples.or(lc.samples),
            max_duplicates: Some(args.allow_duplicates.or(lc.allow_duplicates).unwrap_or(0)),
        },
        template: lc.template.unwrap_or_default(),
        output: resolve_output(args.output, cfg)?,
    })
}
