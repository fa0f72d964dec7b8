//! enabler-testkit CLI binary entry point.
//! Delegates to the library for fixture generation and listener validation.

use anyhow::Context;
use clap::Parser;
use enabler_testkit::cli::{Cli, Commands};
use enabler_testkit::config::{self, IdlArgs, ListenerArgs};
use enabler_testkit::fixtures::{self, StructFilter};
use enabler_testkit::harness::{self, Invocation};
use enabler_testkit::models::{ParsedOutput, ValidationOutcome};
use enabler_testkit::output::{self, FixtureReport};
use enabler_testkit::{logging, scan, validation};
use owo_colors::OwoColorize;
use tracing::{debug, error, info};

/// Exit code for fixture generator errors.
const EXIT_ERROR: i32 = 2;

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        // listener exit codes are outcomes, so usage errors get their own code
        let listener = std::env::args().nth(1).as_deref() == Some("listener");
        if listener && e.use_stderr() {
            let _ = e.print();
            std::process::exit(ValidationOutcome::SetupFailed.code());
        }
        e.exit()
    });
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::IdlCases {
            idl_dir,
            test_dir,
            check,
            output,
            config,
            debug,
        } => {
            logging::init(debug);
            let args = IdlArgs {
                config: config.as_deref(),
                idl_dir: idl_dir.as_deref(),
                test_dir: test_dir.as_deref(),
                output: output.as_deref(),
            };
            match run_idl_cases(&args, check) {
                Ok(code) => std::process::exit(code),
                Err(e) => {
                    eprintln!("{} {:#}", "error:".red().bold(), e);
                    std::process::exit(EXIT_ERROR);
                }
            }
        }
        Commands::Listener {
            samples,
            timeout,
            delay,
            allow_duplicates,
            timeout_as_error,
            no_timeout_as_error,
            grace,
            output,
            config,
            debug,
            command,
        } => {
            logging::init(debug);
            let args = ListenerArgs {
                config: config.as_deref(),
                samples,
                timeout,
                delay,
                allow_duplicates,
                timeout_as_error: match (timeout_as_error, no_timeout_as_error) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                grace,
                output: output.as_deref(),
                command: &command,
            };
            match run_listener(&args) {
                Ok(code) => std::process::exit(code),
                Err(e) => {
                    eprintln!("{} {:#}", "error:".red().bold(), e);
                    std::process::exit(ValidationOutcome::SetupFailed.code());
                }
            }
        }
    }
}

fn run_idl_cases(args: &IdlArgs<'_>, check: bool) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let eff = config::resolve_idl(args, &cwd)?;
    info!("Updating the types header and the test cases for every struct found in the IDL files.");
    if !eff.config_file_found {
        info!("No testkit.toml found; using defaults.");
    }
    info!("Struct names to ignore: {:?}", eff.ignore_structs);
    info!("IDL files to ignore: {:?}", eff.ignore_files);

    let filter = StructFilter::new(eff.ignore_structs.as_slice())?;
    let records = scan::scan(&eff.idl_root, &eff.ignore_files)
        .with_context(|| format!("scanning {}", eff.idl_root.display()))?;
    if records.is_empty() {
        error!("No structures found in the IDL files.");
        error!("Expected to find them in: {}", eff.idl_root.display());
        return Ok(EXIT_ERROR);
    }
    info!("Found {} struct(s)", records.len());

    let write = !check;
    let files = vec![
        fixtures::update_types_header_file(&eff.header, &records, &eff.layout, write)?,
        fixtures::update_tests_macros(&eff.tests_source, &records, &filter, &eff.layout, write)?,
        fixtures::update_tests_cmake(&eff.cmake, &records, &filter, &eff.layout, write)?,
    ];
    let report = FixtureReport {
        structs: records.len(),
        tested: records.iter().filter(|r| !filter.is_ignored(&r.name)).count(),
        files,
    };
    output::print_fixtures(&report, &eff.output);

    if check && report.files.iter().any(|f| f.changed) {
        return Ok(1);
    }
    Ok(0)
}

fn run_listener(args: &ListenerArgs<'_>) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let eff = config::resolve_listener(args, &cwd)?;
    let inv = Invocation {
        command: eff.command.clone(),
        timeout: eff.timeout,
        delay: eff.delay,
        timeout_as_error: eff.timeout_as_error,
        grace: eff.grace,
    };

    let mut parsed: Option<ParsedOutput> = None;
    let outcome = harness::run_and_validate(
        &inv,
        |stdout, stderr| eff.template.parse_output(stdout, stderr),
        |p| {
            parsed = Some(p.clone());
            validation::validate_listener(p, &eff.expectations)
        },
    );

    debug!("listener validator exited with code {}", outcome);
    output::print_verdict(outcome, parsed.as_ref(), &eff.output);
    Ok(outcome.code())
}
