//! Packet codec for the admin protocol.
//!
//! One [`Packet`] is one request or response frame. Encoding produces
//! the full frame including the length prefix; decoding consumes a
//! frame *without* the prefix (the client reads the prefix itself to
//! know how much to pull off the socket).

use crate::AuthorityError;

/// Packets larger than this are rejected as malformed. The protocol
/// caps bodies at 4096 bytes; the extra headroom covers the header.
pub(crate) const MAX_FRAME_LEN: usize = 4096 + 10;

/// Minimum frame: two i32 fields plus the two terminating NULs.
const MIN_FRAME_LEN: usize = 10;

/// The role of a packet within the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Server response carrying command output.
    Response,
    /// Command execution request; the server also uses this type code
    /// for its auth response.
    Command,
    /// Authentication request carrying the password.
    Auth,
}

impl PacketKind {
    fn code(self) -> i32 {
        match self {
            Self::Response => 0,
            Self::Command => 2,
            Self::Auth => 3,
        }
    }

    fn from_code(code: i32) -> Result<Self, AuthorityError> {
        match code {
            0 => Ok(Self::Response),
            2 => Ok(Self::Command),
            3 => Ok(Self::Auth),
            other => Err(AuthorityError::Protocol(format!(
                "unknown packet type {other}"
            ))),
        }
    }
}

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Caller-chosen id, echoed by the server. −1 in a response means
    /// the authentication was rejected.
    pub id: i32,
    /// What this packet is.
    pub kind: PacketKind,
    /// Command text or response payload. ASCII in practice.
    pub body: String,
}

impl Packet {
    /// Builds an authentication request.
    pub fn auth(id: i32, password: &str) -> Self {
        Self {
            id,
            kind: PacketKind::Auth,
            body: password.to_owned(),
        }
    }

    /// Builds a command request.
    pub fn command(id: i32, cmd: &str) -> Self {
        Self {
            id,
            kind: PacketKind::Command,
            body: cmd.to_owned(),
        }
    }

    /// Encodes the packet as a full frame, length prefix included.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        // id + type + body + two NUL terminators.
        let len = 4 + 4 + body.len() + 2;
        let mut buf = Vec::with_capacity(4 + len);
        buf.extend_from_slice(&(len as i32).to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.code().to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    /// Decodes a frame that has already been stripped of its length
    /// prefix.
    pub fn decode(frame: &[u8]) -> Result<Self, AuthorityError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(AuthorityError::Protocol(format!(
                "frame too short: {} bytes",
                frame.len()
            )));
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(AuthorityError::Protocol(format!(
                "frame too long: {} bytes",
                frame.len()
            )));
        }

        let id = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let code = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let kind = PacketKind::from_code(code)?;

        let tail = &frame[8..];
        let [body @ .., 0, 0] = tail else {
            return Err(AuthorityError::Protocol(
                "frame missing NUL terminators".into(),
            ));
        };
        let body = std::str::from_utf8(body)
            .map_err(|e| AuthorityError::Protocol(format!("non-UTF-8 body: {e}")))?
            .to_owned();

        Ok(Self { id, kind, body })
    }
}
