use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

use cdpchan_frame::{Frame, FrameConfig, FrameError, FrameReader};
use tracing::debug;

use crate::cmd::encode::decode_hex;
use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        max_frame_size: args
            .max_frame_size
            .unwrap_or(FrameConfig::default().max_frame_size),
    };

    let input = open_input(args.path.as_deref())?;
    let input: Box<dyn Read> = if args.hex_input {
        let mut text = String::new();
        let mut input = input;
        input
            .read_to_string(&mut text)
            .map_err(|err| io_error("failed reading input", err))?;
        Box::new(Cursor::new(decode_hex("input", &text)?))
    } else {
        input
    };

    let frames = read_frames(input, config, args.count)?;
    debug!(frames = frames.len(), "decoded input");
    print_frames(&frames, format);

    Ok(SUCCESS)
}

fn open_input(path: Option<&Path>) -> CliResult<Box<dyn Read>> {
    match path {
        None => Ok(Box::new(io::stdin())),
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdin())),
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Ok(Box::new(file))
        }
    }
}

fn read_frames<R: Read>(
    input: R,
    config: FrameConfig,
    limit: Option<usize>,
) -> CliResult<Vec<Frame>> {
    let mut frames = Vec::new();
    for frame in FrameReader::with_config(input, config) {
        match frame {
            Ok(frame) => frames.push(frame),
            Err(FrameError::ConnectionClosed) => {
                return Err(CliError::new(
                    DATA_INVALID,
                    format!("input ends inside frame {}", frames.len() + 1),
                ));
            }
            Err(err) => {
                return Err(frame_error(&format!("frame {}", frames.len() + 1), err));
            }
        }
        if limit.is_some_and(|limit| frames.len() >= limit) {
            break;
        }
    }
    Ok(frames)
}
