//! Parser for the `list` command's response.
//!
//! The server answers with a single human-readable line:
//!
//! ```text
//! There are 3 of a max of 20 players online: Alice, Bob, Carol
//! ```
//!
//! Zero players leaves nothing after the colon. Anything without the
//! colon separator is treated as a protocol error rather than an empty
//! roster, so a garbled response counts as a poll failure instead of
//! silently reporting an empty server.

use std::collections::HashSet;

use crate::AuthorityError;

/// Parses the set of online display names out of a `list` response.
pub fn parse_online_list(body: &str) -> Result<HashSet<String>, AuthorityError> {
    let (_, names) = body.split_once(':').ok_or_else(|| {
        AuthorityError::Protocol(format!("unrecognized list response: {body:?}"))
    })?;

    Ok(names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect())
}
