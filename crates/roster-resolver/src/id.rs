//! The stable player identity type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stable, unique identifier for a player.
///
/// Distinct from the display name on purpose: names are mutable (players
/// rename themselves), identities are not. Everything keyed durably —
/// the player table, session state — uses `PlayerId`, never the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Derives the deterministic offline identity for a display name.
    ///
    /// UUIDv3 (md5) over `"OfflinePlayer:{name}"`, so the same name
    /// always yields the same identity. This is the fallback used when
    /// the remote resolver is unreachable; it must stay stable across
    /// releases or offline players would fork into new records.
    pub fn offline(display_name: &str) -> Self {
        let seed = format!("OfflinePlayer:{display_name}");
        Self(Uuid::new_v3(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }

    /// Returns the underlying UUID.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for PlayerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
