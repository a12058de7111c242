use std::io::{IsTerminal, Write};

use cdpchan_frame::{BinaryMsgHeader, Frame, MessageType};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

const PREVIEW_LIMIT: usize = 64;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdditionalHeaderOutput {
    pub header_type: u8,
    pub value: String,
}

/// Printable view of one decoded frame.
#[derive(Debug, Serialize)]
pub struct FrameOutput {
    pub message_type: &'static str,
    pub flags: u16,
    pub sequence: u32,
    pub request_id: u64,
    pub fragment: String,
    pub session_id: u64,
    pub channel_id: u64,
    pub additional_headers: Vec<AdditionalHeaderOutput>,
    /// Present on the first fragment of session messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u32>,
    pub body_size: usize,
    pub body: String,
}

impl FrameOutput {
    pub fn from_frame(frame: &Frame) -> Self {
        let header = &frame.header;
        let mut body = frame.payload.clone();
        let first_of_session = header.message_type == MessageType::Session
            && header.fragment_index == 0;
        let message_id = if first_of_session {
            BinaryMsgHeader::read_from(&mut body)
                .ok()
                .map(|sub| sub.message_id)
        } else {
            None
        };

        Self {
            message_type: header.message_type.name(),
            flags: header.flags.0,
            sequence: header.sequence_number,
            request_id: header.request_id,
            fragment: format!("{}/{}", u32::from(header.fragment_index) + 1, header.fragment_count),
            session_id: header.session_id,
            channel_id: header.channel_id,
            additional_headers: header
                .additional_headers
                .iter()
                .map(|h| AdditionalHeaderOutput {
                    header_type: h.header_type.0,
                    value: hex::encode(&h.value),
                })
                .collect(),
            message_id,
            body_size: body.len(),
            body: body_preview(&body),
        }
    }
}

pub fn print_frames(frames: &[Frame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                println!(
                    "{}",
                    serde_json::to_string(&FrameOutput::from_frame(frame))
                        .unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "TYPE", "SESSION", "CHANNEL", "SEQ", "FRAG", "MSG ID", "SIZE", "BODY",
                ]);
            for frame in frames {
                let out = FrameOutput::from_frame(frame);
                table.add_row(vec![
                    out.message_type.to_string(),
                    out.session_id.to_string(),
                    out.channel_id.to_string(),
                    out.sequence.to_string(),
                    out.fragment,
                    out.message_id.map(|id| id.to_string()).unwrap_or_default(),
                    out.body_size.to_string(),
                    out.body,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                let out = FrameOutput::from_frame(frame);
                print!(
                    "{} session={} channel={} seq={} frag={}",
                    out.message_type, out.session_id, out.channel_id, out.sequence, out.fragment
                );
                if let Some(id) = out.message_id {
                    print!(" message_id={id}");
                }
                for h in &out.additional_headers {
                    print!(" header[{}]={}", h.header_type, h.value);
                }
                println!(" size={} body={}", out.body_size, out.body);
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(frame.payload.as_ref());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) if body.len() <= PREVIEW_LIMIT => format!("0x{}", hex::encode(body)),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}
