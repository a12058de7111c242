use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use cdpchan_frame::{AdditionalHeader, AdditionalHeaderType, Message};
use cdpchan_session::{HandlerError, Session, SessionConfig, DEFAULT_MAX_FRAGMENT_PAYLOAD};
use cdpchan_transport::{StreamTransport, Transport};
use tracing::info;

use crate::cmd::EncodeArgs;
use crate::exit::{io_error, session_error, CliError, CliResult, SUCCESS};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let headers = args
        .headers
        .iter()
        .map(|entry| parse_header(entry))
        .collect::<CliResult<Vec<_>>>()?;

    let max_fragment_payload = args.max_fragment.unwrap_or(DEFAULT_MAX_FRAGMENT_PAYLOAD);
    if max_fragment_payload == 0 {
        return Err(CliError::usage("--max-fragment must be greater than zero"));
    }

    let transport: Arc<dyn Transport> = if args.hex_output {
        Arc::new(StreamTransport::new(HexWriter::new(io::stdout())))
    } else {
        Arc::new(StreamTransport::new(io::stdout()))
    };

    // The session's first channel id is the one requested.
    let session = Session::new(SessionConfig {
        session_id: args.session_id,
        first_channel_id: args.channel,
        max_fragment_payload,
        ..SessionConfig::default()
    });
    let channel = session
        .create_channel(Arc::new(outbound_only), transport)
        .map_err(|err| session_error("channel setup failed", err))?;

    channel
        .send(
            |writer| {
                writer.extend_from_slice(&payload);
                Ok(())
            },
            args.message_id,
            headers,
        )
        .map_err(|err| session_error("encode failed", err))?;
    info!(
        channel_id = channel.id(),
        message_id = args.message_id,
        bytes = payload.len(),
        "message encoded"
    );

    channel
        .dispose(true, true)
        .map_err(|err| session_error("flush failed", err))?;
    if args.hex_output {
        println!();
    }

    Ok(SUCCESS)
}

fn outbound_only(message: &Message) -> Result<(), HandlerError> {
    Err(format!("unexpected inbound message on channel {}", message.channel_id()).into())
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(text) = &args.hex {
        return decode_hex("--hex", text);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

/// Parse `TYPE=HEX`, e.g. `1=00000000000000ff`.
fn parse_header(entry: &str) -> CliResult<AdditionalHeader> {
    let (kind, value) = entry
        .split_once('=')
        .ok_or_else(|| CliError::usage(format!("--header expects TYPE=HEX, got {entry:?}")))?;
    let kind: u8 = kind
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid header type: {kind:?}")))?;
    if kind == 0 {
        return Err(CliError::usage("header type 0 is reserved"));
    }
    let value = decode_hex("--header", value)?;
    Ok(AdditionalHeader::new(AdditionalHeaderType(kind), value))
}

pub(crate) fn decode_hex(flag: &str, text: &str) -> CliResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.strip_prefix("0x").unwrap_or(&compact);
    hex::decode(compact).map_err(|err| CliError::usage(format!("{flag} is not valid hex: {err}")))
}

/// Writes every byte as two lowercase hex digits.
struct HexWriter<W> {
    inner: W,
}

impl<W: Write> HexWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for HexWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(hex::encode(buf).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_argument() {
        let header = parse_header("1=00000000000000ff").unwrap();
        assert_eq!(header.header_type, AdditionalHeaderType::REPLY_TO_ID);
        assert_eq!(header.value.as_ref(), &[0u8, 0, 0, 0, 0, 0, 0, 0xff]);
    }

    #[test]
    fn rejects_bad_header_arguments() {
        assert!(parse_header("nope").is_err());
        assert!(parse_header("0=aa").is_err());
        assert!(parse_header("300=aa").is_err());
        assert!(parse_header("2=zz").is_err());
    }

    #[test]
    fn hex_accepts_prefix_and_whitespace() {
        assert_eq!(decode_hex("--hex", "0x de ad\nbe ef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn hex_writer_doubles_output() {
        let mut writer = HexWriter::new(Vec::new());
        writer.write_all(&[0x30, 0x30, 0x01]).unwrap();
        assert_eq!(writer.inner, b"303001");
    }
}
