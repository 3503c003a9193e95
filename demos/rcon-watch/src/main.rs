//! Minimal roster deployment: poll a running game server over RCON and
//! keep a playtime leaderboard in a local SQLite file.
//!
//! ```text
//! RCON_ADDR=127.0.0.1:25575 RCON_PASSWORD=hunter2 cargo run -p rcon-watch
//! ```
//!
//! Ctrl-C shuts down gracefully (open sessions are credited) and prints
//! the leaderboard.

use std::time::Duration;

use roster::{GovernorConfig, Roster};
use tracing_subscriber::EnvFilter;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let addr = env_or("RCON_ADDR", "127.0.0.1:25575");
    let password = std::env::var("RCON_PASSWORD")
        .map_err(|_| "RCON_PASSWORD must be set")?;
    let db_path = env_or("ROSTER_DB", "players.db");

    let mut roster = Roster::builder()
        .authority(&addr, password)
        .store_path(&db_path)
        .governor(GovernorConfig::default())
        .build()?;

    tracing::info!(addr, db_path, "connecting");
    roster.start().await?;

    // Print a status line every report interval until Ctrl-C.
    let mut report = tokio::time::interval(Duration::from_secs(60));
    report.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            _ = report.tick() => {
                let online = roster.online_count().await?;
                tracing::info!(online, "status");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("shutting down");
    roster.shutdown().await;

    println!("\n== playtime leaderboard ==");
    for (rank, player) in roster.players().await?.iter().enumerate().take(10) {
        let minutes = player.cumulative_online_ms / 60_000;
        println!(
            "{:>2}. {:<20} {:>6} min over {} sessions",
            rank + 1,
            player.display_name,
            minutes,
            player.session_count,
        );
    }

    Ok(())
}
