//! Line-oriented game client.
//!
//! Connects to `GRIDPLAY_URL` (default `ws://127.0.0.1:4000/ws`), prints
//! every match state change, and reads commands from stdin:
//!
//! ```text
//! {"from":"e2","to":"e4"}   propose an action (any JSON value)
//! reset                     wait for the next match after a game ends
//! quit                      close the connection and exit
//! ```

use std::time::Duration;

use gridplay::prelude::*;
use gridplay::session::DEFAULT_ENDPOINT;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Propose(Value),
    Reset,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    match line.trim() {
        "" => Ok(None),
        "reset" => Ok(Some(Command::Reset)),
        "quit" | "exit" => Ok(Some(Command::Quit)),
        other => serde_json::from_str(other)
            .map(|payload| Some(Command::Propose(payload)))
            .map_err(|e| format!("not a command or JSON value: {e}")),
    }
}

fn render(snap: &Snapshot) -> String {
    let mut line = format!("[{}] {}", snap.phase, snap.last_status);
    if let Some(orientation) = &snap.orientation {
        line.push_str(&format!(" | playing {orientation}"));
    }
    if let Some(opponent) = &snap.opponent {
        line.push_str(&format!(" vs {opponent}"));
    }
    if let Some(position) = &snap.position {
        line.push_str(&format!(" | {position}"));
    }
    if let Some(pending) = &snap.pending {
        line.push_str(&format!(" | awaiting verdict on {}", pending.id));
    }
    line
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let url = std::env::var("GRIDPLAY_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
    eprintln!("connecting to {url}");

    let client = GridPlayClient::builder()
        .endpoint(url)
        .proposal_timeout(Duration::from_secs(10))
        .connect()
        .await?;

    let mut snapshots = client.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", render(&snapshots.borrow_and_update()));

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                println!("{}", render(&snap));
                if snap.connection.is_terminal() {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    client.close().await;
                    break;
                };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Propose(payload))) => {
                        match client.propose_action(payload).await {
                            Ok(id) => println!("sent {id}"),
                            Err(e) => println!("not sent: {e}"),
                        }
                    }
                    Ok(Some(Command::Reset)) => {
                        if let Err(e) = client.reset().await {
                            println!("{e}");
                        }
                    }
                    Ok(Some(Command::Quit)) => {
                        client.close().await;
                        break;
                    }
                    Err(e) => println!("{e}"),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_command_json_is_proposal() {
        assert_eq!(
            parse_command(r#" {"cell": 4} "#),
            Ok(Some(Command::Propose(json!({ "cell": 4 }))))
        );
    }

    #[test]
    fn test_parse_command_keywords() {
        assert_eq!(parse_command("reset"), Ok(Some(Command::Reset)));
        assert_eq!(parse_command("quit"), Ok(Some(Command::Quit)));
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_parse_command_garbage_is_error() {
        assert!(parse_command("e2e4").is_err());
    }

    #[test]
    fn test_render_waiting() {
        let snap = gridplay::game::MatchState::new("start").snapshot();
        assert_eq!(render(&snap), "[AwaitingMatch] Waiting for match...");
    }
}
