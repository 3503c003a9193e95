//! Integration tests for `AuthorityClient` against a scripted in-process
//! TCP server speaking the same framing.

use std::time::Duration;

use roster_authority::{
    AuthorityClient, AuthorityConfig, AuthorityError, ConnectionState, Packet, PacketKind,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// =========================================================================
// Scripted server helpers
// =========================================================================

async fn read_packet(socket: &mut TcpStream) -> Packet {
    let mut len_buf = [0u8; 4];
    socket.read_exact(&mut len_buf).await.expect("frame length");
    let len = i32::from_le_bytes(len_buf) as usize;
    let mut frame = vec![0u8; len];
    socket.read_exact(&mut frame).await.expect("frame body");
    Packet::decode(&frame).expect("valid frame")
}

async fn write_packet(socket: &mut TcpStream, packet: Packet) {
    socket.write_all(&packet.encode()).await.expect("write frame");
}

/// Accepts one connection and performs the server side of the auth
/// handshake. Returns the socket with auth completed.
async fn accept_and_auth(listener: &TcpListener, password: &str) -> TcpStream {
    let (mut socket, _) = listener.accept().await.expect("accept");
    let auth = read_packet(&mut socket).await;
    assert_eq!(auth.kind, PacketKind::Auth);
    let id = if auth.body == password { auth.id } else { -1 };
    write_packet(
        &mut socket,
        Packet {
            id,
            kind: PacketKind::Command,
            body: String::new(),
        },
    )
    .await;
    socket
}

/// Answers one `list` command with the given response body.
async fn serve_list(socket: &mut TcpStream, body: &str) {
    let cmd = read_packet(socket).await;
    assert_eq!(cmd.kind, PacketKind::Command);
    assert_eq!(cmd.body, "list");
    write_packet(
        socket,
        Packet {
            id: cmd.id,
            kind: PacketKind::Response,
            body: body.to_owned(),
        },
    )
    .await;
}

fn config_for(addr: std::net::SocketAddr) -> AuthorityConfig {
    AuthorityConfig {
        connect_timeout: Duration::from_secs(1),
        io_timeout: Duration::from_secs(1),
        reconnect_jitter_ms: 0,
        ..AuthorityConfig::new(addr.to_string(), "hunter2")
    }
}

// =========================================================================
// Connect
// =========================================================================

#[tokio::test]
async fn test_connect_valid_password_succeeds() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let _socket = accept_and_auth(&listener, "hunter2").await;
    });

    let client = AuthorityClient::connect(config_for(addr)).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);
    server.await.unwrap();
}

#[tokio::test]
async fn test_connect_wrong_password_returns_auth_failed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let _socket = accept_and_auth(&listener, "different-password").await;
    });

    let err = AuthorityClient::connect(config_for(addr)).await.unwrap_err();
    assert!(matches!(err, AuthorityError::AuthFailed));
    server.await.unwrap();
}

#[tokio::test]
async fn test_connect_no_listener_returns_unreachable() {
    // Bind then drop to get an address nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = AuthorityClient::connect(config_for(addr)).await.unwrap_err();
    assert!(matches!(err, AuthorityError::Unreachable(_)));
}

// =========================================================================
// Poll
// =========================================================================

#[tokio::test]
async fn test_poll_returns_online_names() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut socket = accept_and_auth(&listener, "hunter2").await;
        serve_list(
            &mut socket,
            "There are 2 of a max of 20 players online: Alice, Bob",
        )
        .await;
    });

    let mut client = AuthorityClient::connect(config_for(addr)).await.unwrap();
    let online = client.poll().await.unwrap();

    assert_eq!(online.len(), 2);
    assert!(online.contains("Alice"));
    assert!(online.contains("Bob"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_poll_empty_server_returns_empty_set() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut socket = accept_and_auth(&listener, "hunter2").await;
        serve_list(&mut socket, "There are 0 of a max of 20 players online:").await;
    });

    let mut client = AuthorityClient::connect(config_for(addr)).await.unwrap();
    let online = client.poll().await.unwrap();
    assert!(online.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn test_poll_reconnects_once_after_dropped_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        // First connection: authenticate, then drop it.
        let socket = accept_and_auth(&listener, "hunter2").await;
        drop(socket);
        // Second connection: the client's transparent reconnect.
        let mut socket = accept_and_auth(&listener, "hunter2").await;
        serve_list(
            &mut socket,
            "There are 1 of a max of 20 players online: Alice",
        )
        .await;
    });

    let mut client = AuthorityClient::connect(config_for(addr)).await.unwrap();
    let online = client.poll().await.unwrap();

    assert!(online.contains("Alice"));
    assert_eq!(client.state(), ConnectionState::Connected);
    server.await.unwrap();
}

#[tokio::test]
async fn test_poll_surfaces_error_when_reconnect_also_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let socket = accept_and_auth(&listener, "hunter2").await;
        drop(socket);
        // Stop listening — the reconnect attempt gets refused.
    });

    let mut client = AuthorityClient::connect(config_for(addr)).await.unwrap();
    server.await.unwrap();

    let err = client.poll().await.unwrap_err();
    assert!(matches!(err, AuthorityError::Unreachable(_)));
}

#[tokio::test]
async fn test_poll_garbled_response_is_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut socket = accept_and_auth(&listener, "hunter2").await;
        // Two polls, both answered with garbage (the second serves the
        // client's transparent reconnect attempt).
        let cmd = read_packet(&mut socket).await;
        write_packet(
            &mut socket,
            Packet {
                id: cmd.id,
                kind: PacketKind::Response,
                body: "???".to_owned(),
            },
        )
        .await;
        let mut socket = accept_and_auth(&listener, "hunter2").await;
        let cmd = read_packet(&mut socket).await;
        write_packet(
            &mut socket,
            Packet {
                id: cmd.id,
                kind: PacketKind::Response,
                body: "???".to_owned(),
            },
        )
        .await;
    });

    let mut client = AuthorityClient::connect(config_for(addr)).await.unwrap();
    let err = client.poll().await.unwrap_err();
    assert!(matches!(err, AuthorityError::Protocol(_)));
    server.await.unwrap();
}
