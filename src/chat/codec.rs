/// Chat line codec — frames a TCP byte stream into protocol frames.
///
/// The default mode splits on `\n` (a trailing `\r` is stripped) and yields
/// UTF-8 lines. After the server accepts a `/file` offer it calls
/// [`ChatCodec::expect_file`], switching the decoder to an 8-byte big-endian
/// length header followed by exactly that many body bytes. The switch
/// happens on the same codec instance and read buffer, so body bytes the
/// client pipelined behind the `/file` line are framed correctly instead of
/// being lost to read-ahead.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum line length (including the terminator).
const MAX_LINE_LENGTH: usize = 8192;

/// Largest accepted file body. Announcing more aborts the transfer.
pub const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Size of the big-endian file length header.
const FILE_HEADER_LEN: usize = 8;

/// An inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One text line, terminator stripped.
    Line(String),
    /// Announced length of an incoming file body. Oversized announcements
    /// are still surfaced; the decoder discards their body bytes itself.
    FileHeader(u64),
    /// A segment of the file body, at most the announced length in total.
    FileChunk(Bytes),
}

/// An outbound frame: a text line, or raw bytes relayed during a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Line(String),
    Data(Bytes),
}

impl Outbound {
    pub fn line(s: impl Into<String>) -> Self {
        Self::Line(s.into())
    }
}

/// Codec error: framing violation or an I/O error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("line exceeds maximum length ({MAX_LINE_LENGTH} bytes)")]
    LineTooLong,
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Mode {
    #[default]
    Lines,
    FileHeader,
    FileBody {
        remaining: u64,
    },
    /// Oversized transfer: consume the announced bytes without yielding them.
    Discard {
        remaining: u64,
    },
}

#[derive(Debug, Default)]
pub struct ChatCodec {
    mode: Mode,
}

impl ChatCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a file length header next instead of a text line.
    pub fn expect_file(&mut self) {
        self.mode = Mode::FileHeader;
    }
}

impl Decoder for ChatCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        match self.mode {
            Mode::Lines => {
                let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                    if src.len() > MAX_LINE_LENGTH {
                        return Err(CodecError::LineTooLong);
                    }
                    return Ok(None);
                };
                let line_bytes = src.split_to(pos);
                src.advance(1); // skip \n
                let line = std::str::from_utf8(&line_bytes)
                    .map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Some(Frame::Line(line.trim_end_matches('\r').to_owned())))
            }
            Mode::FileHeader => {
                if src.len() < FILE_HEADER_LEN {
                    return Ok(None);
                }
                let len = src.get_u64();
                self.mode = if len > MAX_FILE_BYTES {
                    Mode::Discard { remaining: len }
                } else if len == 0 {
                    Mode::Lines
                } else {
                    Mode::FileBody { remaining: len }
                };
                Ok(Some(Frame::FileHeader(len)))
            }
            Mode::FileBody { remaining } => {
                if src.is_empty() {
                    return Ok(None);
                }
                let take = src.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
                let chunk = src.split_to(take).freeze();
                let left = remaining - take as u64;
                self.mode = if left == 0 {
                    Mode::Lines
                } else {
                    Mode::FileBody { remaining: left }
                };
                Ok(Some(Frame::FileChunk(chunk)))
            }
            Mode::Discard { remaining } => {
                if src.is_empty() {
                    return Ok(None);
                }
                let take = src.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
                src.advance(take);
                let left = remaining - take as u64;
                if left == 0 {
                    self.mode = Mode::Lines;
                    // Bytes were consumed without producing a frame; keep
                    // decoding so a pipelined line in the buffer isn't
                    // stranded until the next read.
                    self.decode(src)
                } else {
                    self.mode = Mode::Discard { remaining: left };
                    Ok(None)
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // A partial line or truncated file body at EOF is discarded.
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Outbound> for ChatCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), CodecError> {
        match item {
            Outbound::Line(line) => {
                dst.reserve(line.len() + 1);
                dst.put_slice(line.as_bytes());
                dst.put_u8(b'\n');
            }
            Outbound::Data(bytes) => {
                dst.reserve(bytes.len());
                dst.put_slice(&bytes);
            }
        }
        Ok(())
    }
}
