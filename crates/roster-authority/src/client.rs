//! The authority client: one authenticated TCP connection plus `poll`.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::packet::MAX_FRAME_LEN;
use crate::{AuthorityError, Packet, PacketKind, parse_online_list};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the authority connection.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Address of the admin-protocol endpoint, e.g. `"127.0.0.1:25575"`.
    pub addr: String,
    /// Password sent in the auth handshake.
    pub password: String,
    /// The command whose response lists online players.
    pub list_command: String,
    /// Bound on the TCP connect. The auth exchange that follows is
    /// bounded by `io_timeout` per request.
    pub connect_timeout: Duration,
    /// Bound on any single request/response exchange. Exceeding it is a
    /// poll failure for governor purposes, never a retry-forever loop.
    pub io_timeout: Duration,
    /// Upper bound on the random delay before a reconnect attempt, so a
    /// fleet of trackers does not stampede a recovering server.
    pub reconnect_jitter_ms: u64,
}

impl AuthorityConfig {
    /// Creates a config with default timeouts and the standard `list`
    /// command.
    pub fn new(addr: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            password: password.into(),
            list_command: "list".to_owned(),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(5),
            reconnect_jitter_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Observability-only view of the connection.
///
/// Exposed for logging and metrics. Application logic must not branch
/// on this: whether poll evidence is trusted is the governor's call,
/// made from poll *results*, not from connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No usable connection.
    Disconnected,
    /// Authenticated and ready to poll.
    Connected,
    /// A poll failed; the client is attempting its one reconnect.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Owns the single connection to the remote authority.
///
/// Not `Clone` and takes `&mut self` for every exchange: the protocol is
/// strictly request/response on one socket, so polls are serial.
pub struct AuthorityClient {
    config: AuthorityConfig,
    stream: Option<TcpStream>,
    state: ConnectionState,
    next_id: i32,
}

// Manual impl: the config holds the password, keep it out of debug dumps.
impl fmt::Debug for AuthorityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityClient")
            .field("addr", &self.config.addr)
            .field("state", &self.state)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl AuthorityClient {
    /// Connects and authenticates.
    ///
    /// # Errors
    /// [`AuthorityError::Unreachable`] if the connect fails or times
    /// out, [`AuthorityError::AuthFailed`] if the password is rejected.
    pub async fn connect(config: AuthorityConfig) -> Result<Self, AuthorityError> {
        let mut client = Self {
            config,
            stream: None,
            state: ConnectionState::Disconnected,
            next_id: 1,
        };
        client.establish().await?;
        Ok(client)
    }

    /// Current connection state, for logging only.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Asks the authority who is online.
    ///
    /// On failure the client tears the connection down and transparently
    /// attempts exactly one reconnect before surfacing an error; repeated
    /// failures are the governor's problem, not this client's.
    pub async fn poll(&mut self) -> Result<HashSet<String>, AuthorityError> {
        let first_err = match self.poll_once().await {
            Ok(names) => return Ok(names),
            Err(err) => err,
        };

        tracing::warn!(error = %first_err, "poll failed, attempting reconnect");
        self.state = ConnectionState::Reconnecting;
        self.stream = None;

        let jitter = rand::rng().random_range(0..=self.config.reconnect_jitter_ms);
        time::sleep(Duration::from_millis(jitter)).await;

        if let Err(reconnect_err) = self.establish().await {
            tracing::warn!(error = %reconnect_err, "reconnect failed");
            return Err(first_err);
        }
        self.poll_once().await
    }

    async fn establish(&mut self) -> Result<(), AuthorityError> {
        let connect = TcpStream::connect(&self.config.addr);
        let stream = match time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                self.state = ConnectionState::Disconnected;
                return Err(AuthorityError::Unreachable(err));
            }
            Err(_) => {
                self.state = ConnectionState::Disconnected;
                return Err(AuthorityError::Unreachable(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timed out",
                )));
            }
        };
        // Polls are tiny request/response exchanges.
        stream.set_nodelay(true).ok();
        self.stream = Some(stream);

        if let Err(err) = self.authenticate().await {
            self.stream = None;
            self.state = ConnectionState::Disconnected;
            return Err(err);
        }

        self.state = ConnectionState::Connected;
        tracing::info!(addr = %self.config.addr, "authority connected");
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<(), AuthorityError> {
        let id = self.next_request_id();
        let auth = Packet::auth(id, &self.config.password);
        self.send(&auth).await?;

        loop {
            let reply = self.recv().await?;
            if reply.id == -1 {
                return Err(AuthorityError::AuthFailed);
            }
            match reply.kind {
                // Some servers preface the auth response with an empty
                // Response packet; skip those.
                PacketKind::Response => continue,
                PacketKind::Command if reply.id == id => return Ok(()),
                _ => {
                    return Err(AuthorityError::Protocol(format!(
                        "unexpected packet during auth: id={} kind={:?}",
                        reply.id, reply.kind
                    )));
                }
            }
        }
    }

    async fn poll_once(&mut self) -> Result<HashSet<String>, AuthorityError> {
        let id = self.next_request_id();
        let cmd = Packet::command(id, &self.config.list_command);
        self.send(&cmd).await?;

        let reply = self.recv().await?;
        if reply.id != id {
            return Err(AuthorityError::Protocol(format!(
                "response id {} does not match request id {id}",
                reply.id
            )));
        }
        let names = parse_online_list(&reply.body)?;
        tracing::debug!(online = names.len(), "poll completed");
        Ok(names)
    }

    /// Monotonic per-connection request id. Skips 0 and never reaches
    /// the −1 sentinel.
    fn next_request_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if self.next_id == i32::MAX { 1 } else { self.next_id + 1 };
        id
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), AuthorityError> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let frame = packet.encode();
        match time::timeout(self.config.io_timeout, stream.write_all(&frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(AuthorityError::io(err)),
            Err(_) => Err(AuthorityError::Timeout),
        }
    }

    async fn recv(&mut self) -> Result<Packet, AuthorityError> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let read = async {
            let mut len_buf = [0u8; 4];
            stream
                .read_exact(&mut len_buf)
                .await
                .map_err(AuthorityError::io)?;
            let len = i32::from_le_bytes(len_buf);
            if !(10..=MAX_FRAME_LEN as i32).contains(&len) {
                return Err(AuthorityError::Protocol(format!(
                    "invalid frame length {len}"
                )));
            }
            let mut frame = vec![0u8; len as usize];
            stream
                .read_exact(&mut frame)
                .await
                .map_err(AuthorityError::io)?;
            Ok(frame)
        };
        let frame = match time::timeout(self.config.io_timeout, read).await {
            Ok(result) => result?,
            Err(_) => return Err(AuthorityError::Timeout),
        };
        Packet::decode(&frame)
    }
}

fn not_connected() -> AuthorityError {
    AuthorityError::Unreachable(io::Error::new(
        io::ErrorKind::NotConnected,
        "no connection to authority",
    ))
}
