//! # Roster
//!
//! Keeps an authoritative record of who is online on a remote game
//! server when the only trustworthy signal is polling its admin
//! protocol, and join/leave events can silently go missing.
//!
//! The stack, bottom to top:
//!
//! ```text
//! roster-authority   admin-protocol client (connect, auth, poll)
//! roster-resolver    display name → stable identity
//! roster-store       durable player/session table (SQLite)
//! roster-tracker     reconciliation engine + governor + tasks
//! roster (this)      one context wiring it all together
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use roster::Roster;
//!
//! # async fn run() -> Result<(), roster::RosterError> {
//! let mut roster = Roster::builder()
//!     .authority("127.0.0.1:25575", "hunter2")
//!     .store_path("players.db")
//!     .build()?;
//! roster.start().await?;
//!
//! // Feed it events from your log parser:
//! roster.on_join("Alice").await?;
//!
//! // ...and read the projection:
//! for player in roster.players().await? {
//!     println!("{} {}ms", player.display_name, player.cumulative_online_ms);
//! }
//!
//! roster.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod context;
mod error;

pub use context::{DefaultResolver, Roster, RosterBuilder};
pub use error::RosterError;

pub use roster_authority::{AuthorityConfig, ConnectionState};
pub use roster_resolver::{PlayerId, Resolve};
pub use roster_store::PlayerRecord;
pub use roster_tracker::{Governor, GovernorConfig, JoinOutcome};
