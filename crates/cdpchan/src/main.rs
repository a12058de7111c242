mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "cdpchan", version, about = "Multiplexed session channel frame tool")]
struct Cli {
    /// Output format for decoded frames.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "CDPCHAN_LOG_LEVEL",
        global = true
    )]
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
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from([
            "cdpchan",
            "encode",
            "--channel",
            "5",
            "--message-id",
            "9",
            "--data",
            "hello",
            "--header",
            "1=00000000000000ff",
            "--header",
            "2=aa",
        ])
        .expect("encode args should parse");

        let Command::Encode(args) = cli.command else {
            panic!("expected encode");
        };
        assert_eq!(args.channel, 5);
        assert_eq!(args.message_id, 9);
        assert_eq!(args.headers.len(), 2);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from(["cdpchan", "encode", "--hex", "00", "--data", "hello"])
            .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_decode_with_global_format() {
        let cli = Cli::try_parse_from(["cdpchan", "decode", "frames.bin", "--format", "pretty"])
            .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
