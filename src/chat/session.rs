/// Per-connection session — handshake, receive loop, command dispatch,
/// file relay, disconnect cleanup.
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{info, warn};

use super::codec::{ChatCodec, Frame, Outbound, MAX_FILE_BYTES};
use super::command::Command;
use super::emoji;
use super::history::History;
use super::registry::{ClientHandle, SharedRegistry};

/// Minimum gap between two `TYPING:` emissions from one session.
const TYPING_INTERVAL: Duration = Duration::from_millis(2000);

/// How many history lines a joining client is replayed.
const HISTORY_REPLAY_LINES: usize = 50;

type Transport = Framed<TcpStream, ChatCodec>;

/// An accepted `/file` offer waiting for (or consuming) its body bytes.
struct FileTransfer {
    recipient: String,
    filename: String,
    remaining: u64,
}

/// Drive one accepted connection from handshake to cleanup.
pub(crate) async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    state: SharedRegistry,
    history: Arc<History>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut framed = Framed::new(socket, ChatCodec::new());

    framed.send(Outbound::line("SUBMITNAME")).await?;
    let name = match framed.next().await {
        Some(Ok(Frame::Line(line))) => line,
        Some(Ok(_)) => return Ok(()), // file frames cannot arrive in line mode
        Some(Err(e)) => return Err(e.into()),
        None => return Ok(()), // gone before naming themselves
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let accepted = {
        let mut st = state.write().await;
        st.try_register(ClientHandle {
            name: name.clone(),
            tx,
        })
    };
    if let Err(e) = accepted {
        info!(%addr, %name, "handshake rejected: {e}");
        framed.send(Outbound::line("NAME_IN_USE")).await?;
        return Ok(());
    }
    info!(%addr, %name, "joined");

    // Whatever ends the active phase, the session leaves the registry and
    // its departure is announced exactly once.
    let result = run_active(&mut framed, rx, &name, &state, &history).await;
    disconnect(&name, &state, &history).await;
    result
}

/// The active phase: announce the join, then multiplex socket reads with
/// the session's outbound queue until either side fails.
async fn run_active(
    framed: &mut Transport,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    name: &str,
    state: &SharedRegistry,
    history: &History,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    framed.send(Outbound::line("NAMEACCEPTED")).await?;

    // Replay precedes the join announcement, so the joiner sees only lines
    // that predate it.
    match history.head(HISTORY_REPLAY_LINES).await {
        Ok(lines) => {
            for line in lines {
                framed.send(Outbound::Line(format!("HISTORY:{line}"))).await?;
            }
        }
        Err(e) => warn!(name, "history replay failed: {e}"),
    }

    let joined = format!("SERVER: {name} joined the chat");
    {
        let st = state.read().await;
        st.broadcast(&joined);
        st.broadcast(&st.roster_line());
    }
    persist(history, &joined).await;

    let mut last_typing: Option<Instant> = None;
    let mut transfer: Option<FileTransfer> = None;

    loop {
        tokio::select! {
            // Incoming frame from the client's TCP stream.
            frame = framed.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        warn!(name, "read error: {e}");
                        break;
                    }
                    None => break, // connection closed
                };

                match frame {
                    Frame::Line(line) => {
                        if let Some(t) =
                            handle_command(&line, name, &mut last_typing, state, history).await
                        {
                            // The next bytes on this stream are the length
                            // header and body of the offered file.
                            framed.codec_mut().expect_file();
                            transfer = Some(t);
                        }
                    }
                    Frame::FileHeader(len) => {
                        transfer = relay_header(transfer.take(), len, name, state, history).await;
                    }
                    Frame::FileChunk(chunk) => {
                        transfer = relay_chunk(transfer.take(), chunk, name, state, history).await;
                    }
                }
            }

            // Outgoing frame from other sessions' fan-outs or our own replies.
            Some(out) = rx.recv() => {
                framed.send(out).await?;
            }
        }
    }

    Ok(())
}

/// Parse one received line and act on it. Returns the pending transfer when
/// a `/file` offer was accepted and the codec must switch to file framing.
async fn handle_command(
    line: &str,
    sender: &str,
    last_typing: &mut Option<Instant>,
    state: &SharedRegistry,
    history: &History,
) -> Option<FileTransfer> {
    match Command::parse(line) {
        Err(e) => {
            reply(state, sender, &format!("SERVER: {e}")).await;
            None
        }

        Ok(Command::Typing) => {
            let now = Instant::now();
            let throttled =
                last_typing.is_some_and(|prev| now.duration_since(prev) < TYPING_INTERVAL);
            if !throttled {
                let st = state.read().await;
                st.broadcast_except(sender, &format!("TYPING:{sender}"));
                *last_typing = Some(now);
            }
            None
        }

        Ok(Command::Chat(body)) => {
            let formatted = emoji::substitute(&format!("{sender}: {body}"));
            state.read().await.broadcast(&formatted);
            persist(history, &formatted).await;
            None
        }

        Ok(Command::PrivateMessage { recipient, body }) => {
            let formatted =
                emoji::substitute(&format!("[PM] {sender} → {recipient}: {body}"));
            let delivered = {
                let st = state.read().await;
                match st.find(recipient) {
                    Some(peer) => {
                        peer.send_line(&formatted);
                        // A self-PM collapses delivery and echo into the
                        // single write above.
                        if recipient != sender {
                            if let Some(me) = st.find(sender) {
                                me.send_line(&formatted);
                            }
                        }
                        true
                    }
                    None => {
                        if let Some(me) = st.find(sender) {
                            me.send_line(&format!("SERVER: User '{recipient}' not found"));
                        }
                        false
                    }
                }
            };
            if delivered {
                persist(history, &formatted).await;
            }
            None
        }

        Ok(Command::FileOffer {
            recipient,
            filename,
        }) => {
            let st = state.read().await;
            match st.find(recipient) {
                Some(peer) => {
                    peer.send_line(&format!("FILE:{sender}:{filename}"));
                    Some(FileTransfer {
                        recipient: recipient.to_owned(),
                        filename: filename.to_owned(),
                        remaining: 0,
                    })
                }
                None => {
                    if let Some(me) = st.find(sender) {
                        me.send_line(&format!("SERVER: User '{recipient}' not found"));
                    }
                    None
                }
            }
        }
    }
}

/// Handle the 8-byte length header of an accepted transfer.
async fn relay_header(
    transfer: Option<FileTransfer>,
    len: u64,
    sender: &str,
    state: &SharedRegistry,
    history: &History,
) -> Option<FileTransfer> {
    let mut t = transfer?;
    if len > MAX_FILE_BYTES {
        // The codec is already discarding the announced bytes.
        warn!(sender, len, "file transfer over the size limit");
        reply(state, sender, "SERVER: File exceeds 5MB limit").await;
        return None;
    }
    {
        let st = state.read().await;
        if let Some(peer) = st.find(&t.recipient) {
            peer.send_data(Bytes::copy_from_slice(&len.to_be_bytes()));
        }
    }
    if len == 0 {
        finish_transfer(&t, sender, state, history).await;
        return None;
    }
    t.remaining = len;
    Some(t)
}

/// Relay one body segment; announce completion once all bytes have passed.
async fn relay_chunk(
    transfer: Option<FileTransfer>,
    chunk: Bytes,
    sender: &str,
    state: &SharedRegistry,
    history: &History,
) -> Option<FileTransfer> {
    let mut t = transfer?;
    t.remaining = t.remaining.saturating_sub(chunk.len() as u64);
    {
        let st = state.read().await;
        if let Some(peer) = st.find(&t.recipient) {
            peer.send_data(chunk);
        }
    }
    if t.remaining == 0 {
        finish_transfer(&t, sender, state, history).await;
        return None;
    }
    Some(t)
}

async fn finish_transfer(
    t: &FileTransfer,
    sender: &str,
    state: &SharedRegistry,
    history: &History,
) {
    let notice = emoji::substitute(&format!(
        "SERVER: {sender} sent file to {}: {}",
        t.recipient, t.filename
    ));
    state.read().await.broadcast(&notice);
    persist(history, &notice).await;
}

/// Send a line to the named session only, through its own queue so it
/// stays serialised with concurrent fan-outs.
async fn reply(state: &SharedRegistry, name: &str, line: &str) {
    let st = state.read().await;
    if let Some(handle) = st.find(name) {
        handle.send_line(line);
    }
}

async fn persist(history: &History, line: &str) {
    if let Err(e) = history.append(line).await {
        warn!("failed to persist chat line: {e}");
    }
}

/// Leave the registry and announce the departure. Safe to call once per
/// session; a session that never registered has nothing to do here.
async fn disconnect(name: &str, state: &SharedRegistry, history: &History) {
    let removed = state.write().await.unregister(name).is_some();
    if !removed {
        return;
    }
    let left = format!("SERVER: {name} left the chat");
    {
        let st = state.read().await;
        st.broadcast(&left);
        st.broadcast(&st.roster_line());
    }
    persist(history, &left).await;
    info!(name, "left the chat");
}
