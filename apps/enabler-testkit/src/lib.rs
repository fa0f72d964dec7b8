//! Enabler testkit core library.
//!
//! Tooling around the DDS enabler test suite: regenerating typed-test
//! fixtures from IDL sources and validating the output of listener runs.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `idl`: Struct/module extraction from IDL text.
//! - `scan`: IDL tree discovery producing struct records.
//! - `region`: Managed-region patching with atomic writes.
//! - `fixtures`: Header, test-macro and CMake list regeneration.
//! - `listener`: Listener output parsing.
//! - `validation`: Output checks and duplicate detection.
//! - `harness`: Child process supervision and the run/parse/validate pipeline.
//! - `models`: Struct records, parsed output and validation outcomes.
//! - `output`: Human/JSON printers.
//! - `logging`: Subscriber setup for the binary.
pub mod cli;
pub mod config;
pub mod fixtures;
pub mod harness;
pub mod idl;
pub mod listener;
pub mod logging;
pub mod models;
pub mod output;
pub mod region;
pub mod scan;
pub mod validation;
