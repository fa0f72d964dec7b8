//! Output rendering for the fixture generator and the listener harness.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-item fields and a top-level summary.

use crate::models::{ParsedOutput, ValidationOutcome};
use crate::region::PatchResult;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

/// Summary of one fixture generator run.
pub struct FixtureReport {
    pub structs: usize,
    pub tested: usize,
    pub files: Vec<PatchResult>,
}

/// Print per-file fixture results in the requested format.
pub fn print_fixtures(report: &FixtureReport, output: &str) {
    match output {
        "json" => println!("{:#}", compose_fixtures_json(report)),
        _ => {
            let color = use_colors(output);
            for f in &report.files {
                let file = f.path.to_string_lossy();
                let (label, plain) = if f.wrote {
                    ("✏️  updated:".green().bold().to_string(), "✏️  updated:")
                } else if f.changed {
                    ("⚠️  out of date:".yellow().bold().to_string(), "⚠️  out of date:")
                } else {
                    ("no changes:".bright_black().to_string(), "no changes:")
                };
                if color {
                    println!("{} {}", label, file.bold());
                } else {
                    println!("{} {}", plain, file);
                }
            }
            let summary = format!(
                "— Summary — structs={} tested={} changed={}",
                report.structs,
                report.tested,
                report.files.iter().filter(|f| f.changed).count()
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

/// Print the harness verdict.
pub fn print_verdict(outcome: ValidationOutcome, parsed: Option<&ParsedOutput>, output: &str) {
    match output {
        "json" => println!("{:#}", compose_verdict_json(outcome, parsed)),
        _ => {
            let text = format!("listener validator exited with code {}", outcome);
            if !use_colors(output) {
                println!("{}", text);
            } else if outcome.is_success() {
                println!("{} {}", "✔".green(), text.bold());
            } else {
                println!("{} {}", "✖".red(), text.red().bold());
            }
        }
    }
}

/// Compose fixture JSON object (pure) for testing/snapshot purposes.
pub fn compose_fixtures_json(report: &FixtureReport) -> JsonVal {
    let items: Vec<_> = report
        .files
        .iter()
        .map(|f| {
            json!({
                "file": f.path.to_string_lossy(),
                "changed": f.changed,
                "wrote": f.wrote,
            })
        })
        .collect();
    let summary = json!({
        "structs": report.structs,
        "tested": report.tested,
        "changed": report.files.iter().filter(|f| f.changed).count(),
        "wrote": report.files.iter().filter(|f| f.wrote).count(),
    });
    json!({"results": items, "summary": summary})
}

/// Compose verdict JSON object (pure) for testing/snapshot purposes.
pub fn compose_verdict_json(outcome: ValidationOutcome, parsed: Option<&ParsedOutput>) -> JsonVal {
    json!({
        "outcome": outcome,
        "code": outcome.code(),
        "matched": parsed.map(|p| p.matched.len()),
        "unmatched": parsed.map(|p| p.unmatched.len()),
    })
}
