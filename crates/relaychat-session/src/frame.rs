//! Mapping between chat text and WebSocket frames.
//!
//! There is no application-level framing: one chat message is one WebSocket
//! text frame, payload UTF-8. Binary frames are accepted when they hold
//! valid UTF-8, since some relays forward text as binary.

use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Reason text carried in the close frames this client sends.
pub const NORMAL_CLOSE_REASON: &str = "normal closure";

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A chat message.
    Text(String),
    /// The peer started (or acknowledged) the close handshake.
    Close(Option<CloseDetails>),
    /// Ping, pong, or raw frame; answered by the transport itself.
    Control,
    /// A binary frame whose payload is not UTF-8.
    Undecodable {
        /// Payload size in bytes.
        len: usize,
    },
}

/// Code and reason from a close frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseDetails {
    /// Numeric close code (1000 = normal).
    pub code: u16,
    /// Reason text, possibly empty.
    pub reason: String,
}

/// Encode chat text as a single complete text frame.
pub fn encode_text(text: &str) -> Message {
    Message::text(text.to_owned())
}

/// The close frame sent when this side ends the session.
pub fn normal_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: NORMAL_CLOSE_REASON.to_owned().into(),
    }))
}

/// Decode an inbound frame.
pub fn decode(message: Message) -> Inbound {
    match message {
        Message::Text(text) => Inbound::Text(text.to_string()),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Inbound::Text(text),
            Err(e) => Inbound::Undecodable {
                len: e.as_bytes().len(),
            },
        },
        Message::Close(frame) => Inbound::Close(frame.map(|f| CloseDetails {
            code: u16::from(f.code),
            reason: f.reason.to_string(),
        })),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_survives_encode_decode() {
        for text in ["Hello from client!", "", "héllo wörld ✓", "line one\nline two"] {
            assert_eq!(decode(encode_text(text)), Inbound::Text(text.to_owned()));
        }
    }

    #[test]
    fn encode_produces_text_frame() {
        assert!(matches!(encode_text("hi"), Message::Text(_)));
    }

    #[test]
    fn utf8_binary_decodes_as_text() {
        let msg = Message::binary(b"echo:hi".to_vec());
        assert_eq!(decode(msg), Inbound::Text("echo:hi".into()));
    }

    #[test]
    fn invalid_utf8_binary_is_undecodable() {
        let msg = Message::binary(vec![0xff, 0xfe, 0x00]);
        assert_eq!(decode(msg), Inbound::Undecodable { len: 3 });
    }

    #[test]
    fn close_frame_details() {
        let msg = Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: String::from("server restarting").into(),
        }));
        assert_eq!(
            decode(msg),
            Inbound::Close(Some(CloseDetails {
                code: 1001,
                reason: "server restarting".into(),
            }))
        );
        assert_eq!(decode(Message::Close(None)), Inbound::Close(None));
    }

    #[test]
    fn normal_close_uses_code_1000() {
        match decode(normal_close()) {
            Inbound::Close(Some(details)) => {
                assert_eq!(details.code, 1000);
                assert_eq!(details.reason, NORMAL_CLOSE_REASON);
            }
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[test]
    fn control_frames() {
        assert_eq!(decode(Message::Ping(Vec::new().into())), Inbound::Control);
        assert_eq!(decode(Message::Pong(Vec::new().into())), Inbound::Control);
    }
}
