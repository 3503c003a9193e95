//! Admin-protocol client for Roster.
//!
//! The game server's admin protocol (RCON) is the single source of
//! ground-truth liveness: a `list` command returns who is online right
//! now. This crate owns one authenticated TCP connection to it and
//! exposes exactly two things to the rest of the system:
//!
//! - [`AuthorityClient::poll`] — "who is online?", as a set of display
//!   names, with one transparent reconnect attempt on failure.
//! - [`AuthorityClient::state`] — connection state, for observability
//!   only. Callers must not branch application logic on it beyond
//!   logging; failure handling belongs to the tracker's governor.
//!
//! # Wire format
//!
//! Length-prefixed packets, all integers little-endian:
//!
//! ```text
//! | i32 length | i32 request id | i32 type | body bytes | 0x00 | 0x00 |
//! ```
//!
//! `length` counts everything after itself. Auth is type 3, commands are
//! type 2, responses type 0/2; the server signals a rejected password by
//! echoing request id −1.

mod client;
mod error;
mod list;
mod packet;

pub use client::{AuthorityClient, AuthorityConfig, ConnectionState};
pub use error::AuthorityError;
pub use list::parse_online_list;
pub use packet::{Packet, PacketKind};
