//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "enabler-testkit",
    version,
    about = "DDS enabler test tooling",
    long_about = "enabler-testkit: regenerate typed-test fixtures from IDL files and validate listener runs.\n\nConfiguration precedence: CLI > testkit.toml > defaults.",
    after_help = "Examples:\n  enabler-testkit idl-cases\n  enabler-testkit idl-cases --idl-dir ../resources/dds-types-test/IDL --check\n  enabler-testkit listener -s 10 -t 20\n  enabler-testkit listener --allow-duplicates -- ./my_listener --domain 3",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(
        about = "Show version",
        long_about = "Print the current enabler-testkit version."
    )]
    Version,
    /// Regenerate typed-test fixtures from IDL files
    #[command(
        about = "Regenerate typed-test fixtures",
        long_about = "Scan an IDL tree for struct declarations and rewrite the types header, the test macros and the CMake test list.",
        after_help = "Examples:\n  enabler-testkit idl-cases\n  enabler-testkit idl-cases --check --output json"
    )]
    IdlCases {
        #[arg(long, help = "Root of the IDL tree (default: ../resources/dds-types-test/IDL)")]
        idl_dir: Option<String>,
        #[arg(long, help = "Directory holding the generated files (default: current dir)")]
        test_dir: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Exit non-zero if any file would change; write nothing")]
        check: bool,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Path to testkit.toml|yaml (default: discovered)")]
        config: Option<String>,
        #[arg(short = 'd', long, action = clap::ArgAction::SetTrue, help = "Print debugging info")]
        debug: bool,
    },
    /// Run a listener and validate what it received
    #[command(
        about = "Validate listener output",
        long_about = "Launch the listener, stop it after the timeout and check the received samples. The exit code is the validation outcome.",
        after_help = "Exit codes:\n  0 success, 1 timeout, 2 hard timeout, 3 wrong sample count,\n  4 command failed, 5 unexpected output, 6 too many duplicates, 7 launch failed,\n  8 invalid arguments or configuration"
    )]
    Listener {
        #[arg(short = 's', long, help = "Samples to receive")]
        samples: Option<usize>,
        #[arg(short = 't', long, help = "Timeout for the subscriber application in seconds (default: 5)")]
        timeout: Option<u64>,
        #[arg(long, help = "Time to wait before starting execution in seconds (default: 0)")]
        delay: Option<f64>,
        #[arg(
            long,
            num_args = 0..=1,
            default_missing_value = "1",
            help = "Allow receiving duplicated data (default ceiling when given: 1)"
        )]
        allow_duplicates: Option<usize>,
        #[arg(
            long,
            action = clap::ArgAction::SetTrue,
            overrides_with = "no_timeout_as_error",
            help = "Treat reaching the timeout as a failure"
        )]
        timeout_as_error: bool,
        #[arg(
            long,
            action = clap::ArgAction::SetTrue,
            overrides_with = "timeout_as_error",
            help = "Treat reaching the timeout as the normal end of the run (overrides config)"
        )]
        no_timeout_as_error: bool,
        #[arg(long, help = "Seconds to wait after interrupting the listener (default: 2)")]
        grace: Option<f64>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Path to testkit.toml|yaml (default: discovered)")]
        config: Option<String>,
        #[arg(short = 'd', long, action = clap::ArgAction::SetTrue, help = "Print test debugging info")]
        debug: bool,
        #[arg(last = true, help = "Listener command (default: ROS 2 demo listener)")]
        command: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_flags() {
        let cli = Cli::try_parse_from([
            "enabler-testkit",
            "listener",
            "-s",
            "3",
            "-t",
            "7",
            "--delay",
            "0.5",
            "--allow-duplicates",
            "-d",
            "--",
            "sh",
            "-c",
            "true",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Listener {
                samples,
                timeout,
                delay,
                allow_duplicates,
                debug,
                command,
                ..
            } => {
                assert_eq!(samples, Some(3));
                assert_eq!(timeout, Some(7));
                assert_eq!(delay, Some(0.5));
                assert_eq!(allow_duplicates, Some(1));
                assert!(debug);
                assert_eq!(command, vec!["sh", "-c", "true"]);
            }
            _ => panic!("expected listener"),
        }
    }

    #[test]
    fn test_allow_duplicates_value_and_absence() {
        let cli =
            Cli::try_parse_from(["enabler-testkit", "listener", "--allow-duplicates", "4"]).unwrap();
        match cli.cmd {
            Commands::Listener {
                allow_duplicates, ..
            } => assert_eq!(allow_duplicates, Some(4)),
            _ => panic!("expected listener"),
        }
        let cli = Cli::try_parse_from(["enabler-testkit", "listener"]).unwrap();
        match cli.cmd {
            Commands::Listener {
                allow_duplicates,
                command,
                ..
            } => {
                assert_eq!(allow_duplicates, None);
                assert!(command.is_empty());
            }
            _ => panic!("expected listener"),
        }
    }

    #[test]
    fn test_timeout_as_error_last_flag_wins() {
        let parse = |flags: &[&str]| {
            let mut argv = vec!["enabler-testkit", "listener"];
            argv.extend_from_slice(flags);
            match Cli::try_parse_from(argv).unwrap().cmd {
                Commands::Listener {
                    timeout_as_error,
                    no_timeout_as_error,
                    ..
                } => (timeout_as_error, no_timeout_as_error),
                _ => panic!("expected listener"),
            }
        };
        assert_eq!(parse(&[]), (false, false));
        assert_eq!(parse(&["--timeout-as-error"]), (true, false));
        assert_eq!(
            parse(&["--timeout-as-error", "--no-timeout-as-error"]),
            (false, true)
        );
        assert_eq!(
            parse(&["--no-timeout-as-error", "--timeout-as-error"]),
            (true, false)
        );
    }

    #[test]
    fn test_idl_cases_without_flags() {
        let cli = Cli::try_parse_from(["enabler-testkit", "idl-cases"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Commands::IdlCases {
                check: false,
                idl_dir: None,
                ..
            }
        ));
    }
}
