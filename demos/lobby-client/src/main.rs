//! Joins a match server from the terminal and prints what happens.
//!
//! Type commands on stdin:
//!
//! ```text
//! score 40000      report a new absolute score
//! status dead      change our status (lobby, playing, dead)
//! start            ask the server to start a match
//! players          print the roster with scores
//! quit             disconnect and exit
//! ```

use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use retrowars_net::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Match server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Match server port (443 connects over wss)
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Client version sent when registering
    #[arg(long, default_value_t = retrowars_net::protocol::PROTOCOL_VERSION)]
    client_version: u32,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log: String,
}

/// Prints every event and wakes `main` when the connection is gone.
struct Printer {
    closed: Arc<Notify>,
}

impl SessionListener for Printer {
    fn on_roster_changed(&self, players: &[Player]) {
        let names: Vec<String> = players
            .iter()
            .map(|p| format!("{} ({}, {})", p.id, p.game, p.status))
            .collect();
        println!("roster: {}", names.join(", "));
    }

    fn on_game_started(&self) {
        println!("game started");
    }

    fn on_score_changed(&self, player: &Player, score: i64) {
        println!("{} scored {score}", player.id);
    }

    fn on_breakpoint_crossed(&self, player: &Player, strength: u32) {
        println!("{} crossed a breakpoint, attack strength {strength}", player.id);
    }

    fn on_status_changed(&self, player: &Player, status: PlayerStatus) {
        println!("{} is now {status}", player.id);
    }

    fn on_connection_closed(&self, graceful: bool) {
        if graceful {
            println!("server shut down");
        } else {
            println!("connection lost");
        }
        self.closed.notify_one();
    }
}

/// One line typed by the user.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Score(i64),
    Status(PlayerStatus),
    Start,
    Players,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("score"), Some(n)) => n
                .parse()
                .map(Command::Score)
                .map_err(|_| format!("not a score: {n}"))?,
            (Some("status"), Some(s)) => s
                .parse()
                .map(Command::Status)
                .map_err(|e: retrowars_net::protocol::ProtocolError| e.to_string())?,
            (Some("start"), None) => Command::Start,
            (Some("players"), None) => Command::Players,
            (Some("quit"), None) => Command::Quit,
            _ => return Err(format!("unknown command: {line}")),
        };
        match words.next() {
            None => Ok(command),
            Some(extra) => Err(format!("unexpected argument: {extra}")),
        }
    }
}

fn run_command(session: &ClientSession, command: Command) -> Result<(), RetrowarsError> {
    match command {
        Command::Score(score) => session.update_score(score)?,
        Command::Status(status) => session.change_status(status)?,
        Command::Start => session.start_game()?,
        Command::Players => {
            for player in session.players() {
                println!(
                    "{} {} {} score {}",
                    player.id,
                    player.game,
                    player.status,
                    session.score_for(player.id)
                );
            }
        }
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args.log);

    let config =
        ClientConfig::new(args.host.clone(), args.port).with_client_version(args.client_version);
    tracing::info!(endpoint = %config.endpoint(), "joining match server");

    let closed = Arc::new(Notify::new());
    let printer = Arc::new(Printer {
        closed: Arc::clone(&closed),
    });
    let slot = SessionSlot::global();
    let session = slot
        .connect(config, printer)
        .await
        .map_err(RetrowarsError::from)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = run_command(&session, command) {
                            eprintln!("{e}");
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            _ = closed.notified() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    slot.disconnect().await;
    Ok(())
}
