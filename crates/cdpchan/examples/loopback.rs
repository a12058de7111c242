//! Loopback example: two channels multiplexed over one Unix socket pair.
//!
//! The "server" session echoes every message back on the same channel with a
//! reply-to header naming the original message id.
//!
//! Run with:
//!   cargo run --example loopback

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::{mpsc, Arc};
    use std::thread;

    use cdpchan::frame::{AdditionalHeader, AdditionalHeaderType, FrameReader, Message};
    use cdpchan::session::HandlerError;
    use cdpchan::transport::{SocketTransport, Transport};
    use cdpchan::{Session, SessionConfig};

    let (client_end, server_end) = SocketTransport::pair()?;
    let client_reader = client_end.try_clone_reader()?;
    let server_reader = server_end.try_clone_reader()?;
    let client_end: Arc<dyn Transport> = Arc::new(client_end);
    let server_end: Arc<dyn Transport> = Arc::new(server_end);

    // Server: queue inbound messages, answer them from its own thread.
    let server = Session::new(SessionConfig {
        session_id: 2,
        ..SessionConfig::default()
    });
    let (inbox_tx, inbox_rx) = mpsc::channel::<Message>();
    for _ in 0..2 {
        let inbox_tx = inbox_tx.clone();
        server.create_channel(
            Arc::new(move |message: &Message| -> Result<(), HandlerError> {
                inbox_tx.send(message.clone())?;
                Ok(())
            }),
            Arc::clone(&server_end),
        )?;
    }
    drop(inbox_tx);

    let server_pump = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            for frame in FrameReader::new(server_reader) {
                let Ok(frame) = frame else { break };
                if let Err(err) = server.receive(frame) {
                    eprintln!("[server] receive failed: {err}");
                }
            }
            // Disposing the session drops the handlers, which closes the inbox.
            server.dispose();
        })
    };
    let responder = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            for message in inbox_rx {
                let Ok((sub_header, body)) = message.read_binary() else {
                    continue;
                };
                let Some(channel) = server.channel(message.channel_id()) else {
                    continue;
                };
                let reply = channel.send(
                    |w| {
                        w.extend_from_slice(b"echo: ");
                        w.extend_from_slice(&body);
                        Ok(())
                    },
                    sub_header.message_id,
                    vec![AdditionalHeader::reply_to(u64::from(sub_header.message_id))],
                );
                if let Err(err) = reply {
                    eprintln!("[server] reply failed: {err}");
                }
            }
        })
    };

    // Client: print replies as they arrive.
    let client = Session::new(SessionConfig {
        session_id: 1,
        ..SessionConfig::default()
    });
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let print_reply = move |message: &Message| -> Result<(), HandlerError> {
        let (_, body) = message.read_binary()?;
        let reply_to = message
            .header
            .additional_header(AdditionalHeaderType::REPLY_TO_ID)
            .map(|h| be_u64(&h.value))
            .unwrap_or_default();
        eprintln!(
            "[client] channel={} reply_to={reply_to} body={}",
            message.channel_id(),
            String::from_utf8_lossy(&body)
        );
        done_tx.send(())?;
        Ok(())
    };
    let print_reply: Arc<dyn cdpchan::MessageHandler> = Arc::new(print_reply);
    let commands = client.create_channel(Arc::clone(&print_reply), Arc::clone(&client_end))?;
    let data = client.create_channel(print_reply, Arc::clone(&client_end))?;

    let client_pump = {
        let client = Arc::clone(&client);
        thread::spawn(move || {
            for frame in FrameReader::new(client_reader) {
                let Ok(frame) = frame else { break };
                if let Err(err) = client.receive(frame) {
                    eprintln!("[client] receive failed: {err}");
                }
            }
        })
    };

    commands.send_binary(br#"{"action":"ping"}"#, 100)?;
    data.send_binary(&[b'x'; 40_000], 200)?;
    for _ in 0..2 {
        done_rx.recv()?;
    }

    // Tear everything down: closing the client transport ends both pumps.
    data.dispose(true, true)?;
    server_end.close()?;
    let _ = server_pump.join();
    let _ = responder.join();
    let _ = client_pump.join();
    Ok(())
}

#[cfg(unix)]
fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, b| (acc << 8) | u64::from(*b))
}

#[cfg(not(unix))]
fn main() {
    eprintln!("the loopback example needs Unix domain sockets");
}
