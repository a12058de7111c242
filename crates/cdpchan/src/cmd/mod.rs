use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one session message and write its frames to stdout.
    Encode(EncodeArgs),
    /// Read frames from a file or stdin and print them.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Channel id to address.
    #[arg(long, short = 'c', default_value = "1")]
    pub channel: u64,
    /// Message id carried in the binary message sub-header.
    #[arg(long, short = 'm', default_value = "0")]
    pub message_id: u32,
    /// Session id stamped into the common header.
    #[arg(long, default_value = "0")]
    pub session_id: u64,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Additional header as TYPE=HEXVALUE (repeatable).
    #[arg(long = "header", value_name = "TYPE=HEX")]
    pub headers: Vec<String>,
    /// Maximum body bytes per frame before fragmenting.
    #[arg(long, value_name = "BYTES")]
    pub max_fragment: Option<usize>,
    /// Write frames as hex text instead of raw bytes.
    #[arg(long)]
    pub hex_output: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File to read frames from. Reads stdin when omitted or `-`.
    pub path: Option<PathBuf>,
    /// Input is hex text (whitespace ignored).
    #[arg(long)]
    pub hex_input: bool,
    /// Stop after N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Reject frames larger than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
