//! The SQLite-backed player store.

use std::collections::HashSet;
use std::path::Path;

use roster_resolver::PlayerId;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::{PlayerRecord, StoreError};

/// Schema bootstrap, applied on every open. Identities are stored as
/// hyphenated UUID text so the file is inspectable with plain sqlite3.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS players (
    identity                  TEXT PRIMARY KEY,
    display_name              TEXT NOT NULL,
    first_seen_at             INTEGER NOT NULL,
    last_seen_at              INTEGER NOT NULL,
    cumulative_online_ms      INTEGER NOT NULL DEFAULT 0,
    session_count             INTEGER NOT NULL DEFAULT 0,
    active_session_started_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_players_display_name ON players (display_name);
CREATE INDEX IF NOT EXISTS idx_players_last_seen_at ON players (last_seen_at);
CREATE INDEX IF NOT EXISTS idx_players_cumulative ON players (cumulative_online_ms);
";

const RECORD_COLUMNS: &str = "identity, display_name, first_seen_at, last_seen_at, \
     cumulative_online_ms, session_count, active_session_started_at";

/// Durable table of player records, keyed by identity.
///
/// All mutating operations take an explicit `now_ms` so callers (and
/// tests) control the clock. The connection is `Send` but not `Sync`;
/// the tracker serializes access behind an async mutex.
pub struct PlayerStore {
    conn: Connection,
}

impl PlayerStore {
    /// Opens (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(&path)?;
        let store = Self { conn };
        store.bootstrap()?;
        tracing::info!(path = %path.as_ref().display(), "player store opened");
        Ok(store)
    }

    /// Opens an in-memory store. Used by tests and the demo.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.bootstrap()?;
        tracing::debug!("in-memory player store opened");
        Ok(store)
    }

    fn bootstrap(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // -- Mutations ---------------------------------------------------------

    /// Creates the record if absent, otherwise refreshes `display_name`
    /// and `last_seen_at`. `first_seen_at` is set once and never moves.
    pub fn upsert(
        &mut self,
        identity: PlayerId,
        display_name: &str,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO players (identity, display_name, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(identity) DO UPDATE SET
                 display_name = excluded.display_name,
                 last_seen_at = excluded.last_seen_at",
            params![identity.to_string(), display_name, now_ms],
        )?;
        Ok(())
    }

    /// Opens a session: sets the start marker, bumps `session_count`.
    ///
    /// Conditional on no session being open. Returns `false` (and
    /// changes nothing) if one already is — the caller decides whether
    /// that is a bug or an expected re-join.
    pub fn start_session(&mut self, identity: PlayerId, now_ms: i64) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE players SET
                 active_session_started_at = ?2,
                 session_count = session_count + 1,
                 last_seen_at = ?2
             WHERE identity = ?1 AND active_session_started_at IS NULL",
            params![identity.to_string(), now_ms],
        )?;
        Ok(changed == 1)
    }

    /// Closes the open session, crediting its duration to
    /// `cumulative_online_ms`, and returns that duration.
    ///
    /// Idempotent: an unknown identity or an already-closed session
    /// returns `0`. The read and conditional write share one
    /// transaction, so two racing closers cannot both credit time.
    pub fn end_session(&mut self, identity: PlayerId, now_ms: i64) -> Result<u64, StoreError> {
        let key = identity.to_string();
        let tx = self.conn.transaction()?;

        let started: Option<i64> = tx
            .query_row(
                "SELECT active_session_started_at FROM players WHERE identity = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        let Some(started) = started else {
            return Ok(0);
        };

        // A clock that stepped backwards yields a 0ms session, not a
        // negative credit.
        let duration = now_ms.saturating_sub(started).max(0) as u64;
        tx.execute(
            "UPDATE players SET
                 cumulative_online_ms = cumulative_online_ms + ?2,
                 active_session_started_at = NULL,
                 last_seen_at = ?3
             WHERE identity = ?1 AND active_session_started_at IS NOT NULL",
            params![key, duration, now_ms],
        )?;
        tx.commit()?;
        Ok(duration)
    }

    /// Advances `last_seen_at` for one identity.
    pub fn touch_last_seen(&mut self, identity: PlayerId, now_ms: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE players SET last_seen_at = ?2 WHERE identity = ?1",
            params![identity.to_string(), now_ms],
        )?;
        Ok(())
    }

    /// Advances `last_seen_at` for every listed identity that has an
    /// open session. Returns how many rows were touched.
    ///
    /// Rows not listed are left to age — that is the reconcile
    /// contract, eviction is the watchdog's decision.
    pub fn touch_online(&mut self, identities: &[PlayerId], now_ms: i64) -> Result<usize, StoreError> {
        if identities.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; identities.len()].join(", ");
        let sql = format!(
            "UPDATE players SET last_seen_at = ?
             WHERE active_session_started_at IS NOT NULL AND identity IN ({placeholders})"
        );
        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(identities.len() + 1);
        values.push(rusqlite::types::Value::Integer(now_ms));
        values.extend(
            identities
                .iter()
                .map(|id| rusqlite::types::Value::Text(id.to_string())),
        );

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed)
    }

    // -- Queries -----------------------------------------------------------

    /// Point lookup by identity.
    pub fn get(&self, identity: PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM players WHERE identity = ?1");
        let row = self
            .conn
            .query_row(&sql, params![identity.to_string()], map_raw)
            .optional()?;
        row.map(parse_record).transpose()
    }

    /// Every record, ordered by cumulative playtime descending.
    pub fn all_by_playtime(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM players ORDER BY cumulative_online_ms DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_raw)?;
        rows.map(|raw| parse_record(raw?)).collect()
    }

    /// The set of identities with an open session.
    pub fn online_identities(&self) -> Result<HashSet<PlayerId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT identity FROM players WHERE active_session_started_at IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.map(|key| parse_identity(&key?)).collect()
    }

    /// Identities whose session is open but whose `last_seen_at` is
    /// strictly older than `timeout_ms`. Strict inequality: a record
    /// touched exactly `timeout_ms` ago is not yet stale.
    pub fn stale_online(&self, timeout_ms: u64, now_ms: i64) -> Result<Vec<PlayerId>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT identity FROM players
             WHERE active_session_started_at IS NOT NULL AND (?1 - last_seen_at) > ?2",
        )?;
        let rows = stmt.query_map(params![now_ms, timeout_ms as i64], |row| {
            row.get::<_, String>(0)
        })?;
        rows.map(|key| parse_identity(&key?)).collect()
    }

    /// Fast online check for one identity.
    pub fn is_online(&self, identity: PlayerId) -> Result<bool, StoreError> {
        let online: Option<bool> = self
            .conn
            .query_row(
                "SELECT active_session_started_at IS NOT NULL FROM players WHERE identity = ?1",
                params![identity.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(online.unwrap_or(false))
    }

    /// Number of identities currently online.
    pub fn online_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM players WHERE active_session_started_at IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

/// Raw row shape straight out of SQLite, before identity parsing.
type RawRecord = (String, String, i64, i64, i64, i64, Option<i64>);

fn map_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn parse_record(raw: RawRecord) -> Result<PlayerRecord, StoreError> {
    let (key, display_name, first_seen, last_seen, cumulative, sessions, active) = raw;
    Ok(PlayerRecord {
        identity: parse_identity(&key)?,
        display_name,
        first_seen_at: first_seen,
        last_seen_at: last_seen,
        cumulative_online_ms: cumulative.max(0) as u64,
        session_count: sessions.max(0) as u64,
        active_session_started_at: active,
    })
}

fn parse_identity(key: &str) -> Result<PlayerId, StoreError> {
    key.parse()
        .map_err(|_| StoreError::Corrupt(format!("identity {key:?} is not a UUID")))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PlayerStore {
        PlayerStore::in_memory().expect("in-memory store")
    }

    fn alice() -> PlayerId {
        PlayerId::offline("Alice")
    }

    fn bob() -> PlayerId {
        PlayerId::offline("Bob")
    }

    // -- upsert ------------------------------------------------------------

    #[test]
    fn test_upsert_creates_record_with_first_seen() {
        let mut s = store();
        s.upsert(alice(), "Alice", 1_000).unwrap();

        let rec = s.get(alice()).unwrap().expect("record exists");
        assert_eq!(rec.display_name, "Alice");
        assert_eq!(rec.first_seen_at, 1_000);
        assert_eq!(rec.last_seen_at, 1_000);
        assert_eq!(rec.cumulative_online_ms, 0);
        assert_eq!(rec.session_count, 0);
        assert!(!rec.is_online());
    }

    #[test]
    fn test_upsert_refreshes_name_but_not_first_seen() {
        let mut s = store();
        s.upsert(alice(), "Alice", 1_000).unwrap();
        s.upsert(alice(), "Alyce", 5_000).unwrap();

        let rec = s.get(alice()).unwrap().unwrap();
        assert_eq!(rec.display_name, "Alyce");
        assert_eq!(rec.first_seen_at, 1_000, "first_seen_at is immutable");
        assert_eq!(rec.last_seen_at, 5_000);
    }

    // -- start_session / end_session ---------------------------------------

    #[test]
    fn test_start_session_marks_online_and_counts() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();

        assert!(s.start_session(alice(), 10).unwrap());

        let rec = s.get(alice()).unwrap().unwrap();
        assert!(rec.is_online());
        assert_eq!(rec.active_session_started_at, Some(10));
        assert_eq!(rec.session_count, 1);
    }

    #[test]
    fn test_start_session_twice_second_is_rejected() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();

        assert!(s.start_session(alice(), 10).unwrap());
        assert!(!s.start_session(alice(), 20).unwrap());

        let rec = s.get(alice()).unwrap().unwrap();
        assert_eq!(rec.active_session_started_at, Some(10), "first start wins");
        assert_eq!(rec.session_count, 1);
    }

    #[test]
    fn test_end_session_credits_duration() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        s.start_session(alice(), 1_000).unwrap();

        let dur = s.end_session(alice(), 61_000).unwrap();

        assert_eq!(dur, 60_000);
        let rec = s.get(alice()).unwrap().unwrap();
        assert!(!rec.is_online());
        assert_eq!(rec.cumulative_online_ms, 60_000);
        assert_eq!(rec.last_seen_at, 61_000);
    }

    #[test]
    fn test_end_session_idempotent_second_end_is_zero() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        s.start_session(alice(), 0).unwrap();

        assert_eq!(s.end_session(alice(), 30_000).unwrap(), 30_000);
        assert_eq!(s.end_session(alice(), 99_000).unwrap(), 0);

        let rec = s.get(alice()).unwrap().unwrap();
        assert_eq!(
            rec.cumulative_online_ms, 30_000,
            "second end must not corrupt playtime"
        );
    }

    #[test]
    fn test_end_session_unknown_identity_is_zero() {
        let mut s = store();
        assert_eq!(s.end_session(alice(), 1_000).unwrap(), 0);
    }

    #[test]
    fn test_end_session_clock_step_back_credits_zero() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        s.start_session(alice(), 10_000).unwrap();

        assert_eq!(s.end_session(alice(), 5_000).unwrap(), 0);
    }

    #[test]
    fn test_sessions_accumulate_across_restarts() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();

        s.start_session(alice(), 0).unwrap();
        s.end_session(alice(), 10_000).unwrap();
        s.start_session(alice(), 20_000).unwrap();
        s.end_session(alice(), 25_000).unwrap();

        let rec = s.get(alice()).unwrap().unwrap();
        assert_eq!(rec.cumulative_online_ms, 15_000);
        assert_eq!(rec.session_count, 2);
    }

    // -- touch -------------------------------------------------------------

    #[test]
    fn test_touch_online_only_touches_listed_open_sessions() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        s.upsert(bob(), "Bob", 0).unwrap();
        let carol = PlayerId::offline("Carol");
        s.upsert(carol, "Carol", 0).unwrap();

        s.start_session(alice(), 0).unwrap();
        s.start_session(carol, 0).unwrap();
        // Bob stays offline.

        // Touch Alice and Bob; Carol is online but not listed.
        let touched = s.touch_online(&[alice(), bob()], 60_000).unwrap();

        assert_eq!(touched, 1, "only Alice is both listed and online");
        assert_eq!(s.get(alice()).unwrap().unwrap().last_seen_at, 60_000);
        assert_eq!(s.get(bob()).unwrap().unwrap().last_seen_at, 0);
        assert_eq!(
            s.get(carol).unwrap().unwrap().last_seen_at,
            0,
            "absent from the set means left to age"
        );
    }

    #[test]
    fn test_touch_online_empty_set_is_noop() {
        let mut s = store();
        assert_eq!(s.touch_online(&[], 1_000).unwrap(), 0);
    }

    // -- queries -----------------------------------------------------------

    #[test]
    fn test_stale_online_strict_boundary() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        s.upsert(bob(), "Bob", 0).unwrap();
        s.start_session(alice(), 0).unwrap();
        s.start_session(bob(), 0).unwrap();
        s.touch_last_seen(alice(), 1_000).unwrap();
        s.touch_last_seen(bob(), 2_000).unwrap();

        // now=181_000, timeout=180_000: Alice aged 180_000 exactly (not
        // stale), Bob aged 179_000.
        let stale = s.stale_online(180_000, 181_000).unwrap();
        assert!(stale.is_empty());

        // One ms later Alice crosses the line.
        let stale = s.stale_online(180_000, 181_001).unwrap();
        assert_eq!(stale, vec![alice()]);
    }

    #[test]
    fn test_stale_online_ignores_offline_records() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        // Never started a session; ancient last_seen but offline.
        let stale = s.stale_online(1_000, 1_000_000).unwrap();
        assert!(stale.is_empty());
    }

    #[test]
    fn test_all_by_playtime_orders_descending() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        s.upsert(bob(), "Bob", 0).unwrap();

        s.start_session(alice(), 0).unwrap();
        s.end_session(alice(), 5_000).unwrap();
        s.start_session(bob(), 0).unwrap();
        s.end_session(bob(), 60_000).unwrap();

        let all = s.all_by_playtime().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].identity, bob());
        assert_eq!(all[1].identity, alice());
    }

    #[test]
    fn test_online_identities_and_counts() {
        let mut s = store();
        s.upsert(alice(), "Alice", 0).unwrap();
        s.upsert(bob(), "Bob", 0).unwrap();
        s.start_session(alice(), 0).unwrap();

        assert_eq!(s.online_count().unwrap(), 1);
        assert!(s.is_online(alice()).unwrap());
        assert!(!s.is_online(bob()).unwrap());
        assert!(!s.is_online(PlayerId::offline("Nobody")).unwrap());

        let online = s.online_identities().unwrap();
        assert_eq!(online, HashSet::from([alice()]));
    }
}
