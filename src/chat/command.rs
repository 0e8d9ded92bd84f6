/// Client command parsing.
///
/// Every received line is one command. Reserved prefixes are `/typing`,
/// `/pm ` and `/file `; any other line — including ones starting with an
/// unknown `/word` — is public chat. `/pm` and `/file` need exactly three
/// space-separated fields; fewer is a parse error answered to the sender
/// only, and the `Display` of the error is the wire reply text.

/// A parsed client command. Borrows from the received line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Typing heartbeat, rate-limited per sender.
    Typing,
    /// Targeted message, delivered to recipient and echoed to sender.
    PrivateMessage { recipient: &'a str, body: &'a str },
    /// File-transfer offer; binary framing follows on the sender's stream.
    FileOffer { recipient: &'a str, filename: &'a str },
    /// Everything else: the whole line is the chat body.
    Chat(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid private message format")]
    InvalidPrivateMessage,
    #[error("Invalid file format")]
    InvalidFileOffer,
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Result<Self, ParseError> {
        if line.starts_with("/typing") {
            return Ok(Self::Typing);
        }
        if let Some(rest) = line.strip_prefix("/pm ") {
            let (recipient, body) = rest
                .split_once(' ')
                .ok_or(ParseError::InvalidPrivateMessage)?;
            return Ok(Self::PrivateMessage { recipient, body });
        }
        if let Some(rest) = line.strip_prefix("/file ") {
            let (recipient, filename) =
                rest.split_once(' ').ok_or(ParseError::InvalidFileOffer)?;
            return Ok(Self::FileOffer {
                recipient,
                filename,
            });
        }
        Ok(Self::Chat(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Reserved prefixes ────────────────────────────────────────

    #[test]
    fn parse_typing() {
        assert_eq!(Command::parse("/typing"), Ok(Command::Typing));
    }

    #[test]
    fn parse_typing_with_trailing_text() {
        assert_eq!(Command::parse("/typing extra"), Ok(Command::Typing));
    }

    #[test]
    fn parse_private_message() {
        assert_eq!(
            Command::parse("/pm alice secret stuff"),
            Ok(Command::PrivateMessage {
                recipient: "alice",
                body: "secret stuff",
            })
        );
    }

    #[test]
    fn parse_private_message_empty_body() {
        assert_eq!(
            Command::parse("/pm alice "),
            Ok(Command::PrivateMessage {
                recipient: "alice",
                body: "",
            })
        );
    }

    #[test]
    fn parse_file_offer() {
        assert_eq!(
            Command::parse("/file bob notes.txt"),
            Ok(Command::FileOffer {
                recipient: "bob",
                filename: "notes.txt",
            })
        );
    }

    // ── Parse errors ─────────────────────────────────────────────

    #[test]
    fn pm_without_body_is_an_error() {
        assert_eq!(
            Command::parse("/pm alice"),
            Err(ParseError::InvalidPrivateMessage)
        );
    }

    #[test]
    fn file_without_filename_is_an_error() {
        assert_eq!(
            Command::parse("/file bob"),
            Err(ParseError::InvalidFileOffer)
        );
    }

    #[test]
    fn error_display_matches_wire_reply() {
        assert_eq!(
            ParseError::InvalidPrivateMessage.to_string(),
            "Invalid private message format"
        );
        assert_eq!(ParseError::InvalidFileOffer.to_string(), "Invalid file format");
    }

    // ── Chat fallthrough ─────────────────────────────────────────

    #[test]
    fn plain_line_is_chat() {
        assert_eq!(Command::parse("hello there"), Ok(Command::Chat("hello there")));
    }

    #[test]
    fn empty_line_is_chat() {
        assert_eq!(Command::parse(""), Ok(Command::Chat("")));
    }

    #[test]
    fn bare_pm_without_space_is_chat() {
        assert_eq!(Command::parse("/pm"), Ok(Command::Chat("/pm")));
    }

    #[test]
    fn unknown_slash_command_is_chat() {
        assert_eq!(Command::parse("/dance"), Ok(Command::Chat("/dance")));
    }
}
