mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ctlwire", version, about = "Driver/worker control channel CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "ctlwire",
            "send",
            "127.0.0.1:7000",
            "--tag",
            "done",
            "--data",
            "rows=3",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.addr, "127.0.0.1:7000");
                assert_eq!(args.data, "rows=3");
                assert_eq!(args.timeout, "5s");
                assert!(!args.buffered);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_buffered_flag() {
        let cli = Cli::try_parse_from([
            "ctlwire",
            "send",
            "127.0.0.1:7000",
            "--tag",
            "run",
            "--data",
            "task=smoke;seed=1234",
            "--buffered",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => assert!(args.buffered),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_tag_without_text() {
        let err = Cli::try_parse_from([
            "ctlwire",
            "send",
            "127.0.0.1:7000",
            "--tag",
            "ping",
            "--data",
            "x",
        ])
        .expect_err("ping cannot carry text");

        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_drive_subcommand() {
        let cli = Cli::try_parse_from([
            "ctlwire",
            "--format",
            "json",
            "drive",
            "127.0.0.1:0",
            "--task",
            "suite=smoke",
            "--wait",
            "10s",
        ])
        .expect("drive args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Drive(_)));
    }

    #[test]
    fn parses_worker_with_count() {
        let cli = Cli::try_parse_from(["ctlwire", "worker", "127.0.0.1:7000", "--count", "2"])
            .expect("worker args should parse");
        match cli.command {
            Command::Worker(args) => assert_eq!(args.count, Some(2)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
