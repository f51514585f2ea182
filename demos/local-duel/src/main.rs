use std::net::SocketAddr;

use pokelink::prelude::*;

// ---------------------------------------------------------------------------
// Fighters
// ---------------------------------------------------------------------------

/// One side of the duel: attacks whenever the turn comes round, cycling
/// through `moves`, until the battle ends.
async fn fight(mut peer: Peer, moves: &'static [&'static str]) -> Result<(), PokelinkError> {
    let mut next_move = moves.iter().cycle();
    let role = peer.handle().role();

    while let Some(event) = peer.next_event().await {
        match event {
            PeerEvent::BattleReady { .. } | PeerEvent::TurnResolved { .. } => {
                if !peer.handle().status().await?.my_turn {
                    continue;
                }
                if let Some(move_name) = next_move.next() {
                    tracing::info!(%role, %move_name, "attacking");
                    peer.handle().attack(*move_name).await?;
                }
            }
            PeerEvent::GameOver { winner, .. } => {
                tracing::info!(%role, %winner, "battle over");
                break;
            }
            PeerEvent::SessionAbandoned { reason, .. } => {
                tracing::warn!(%role, %reason, "battle abandoned");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Prints everything the spectator sees. Returns the winner's name.
async fn watch(mut peer: Peer) -> Option<String> {
    while let Some(event) = peer.next_event().await {
        match event {
            PeerEvent::AttackAnnounced { move_name, .. } => println!("> {move_name}!"),
            PeerEvent::TurnResolved {
                attacker,
                damage,
                defender_hp,
                message,
                ..
            } => {
                let message = message.unwrap_or_else(|| format!("{attacker} dealt {damage}"));
                println!("  {message} ({defender_hp} HP left)");
            }
            PeerEvent::Chat(chat) => {
                if let ChatContent::Text(text) = chat.content {
                    println!("  [{}] {text}", chat.sender_name);
                }
            }
            PeerEvent::GameOver { winner, loser } => {
                println!("{loser} fainted. {winner} wins!");
                return Some(winner);
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Runs a full Host vs Joiner battle with a spectator, all on loopback.
async fn run_duel(host_pick: &str, joiner_pick: &str) -> Result<Option<String>, PokelinkError> {
    let loopback: SocketAddr = ([127, 0, 0, 1], 0).into();
    let host = PeerBuilder::new(Role::Host).bind(loopback).build().await?;
    let joiner = PeerBuilder::new(Role::Joiner)
        .bind(loopback)
        .sender_name("Ash")
        .build()
        .await?;
    let spectator = PeerBuilder::new(Role::Spectator)
        .bind(loopback)
        .build()
        .await?;
    let host_addr = host.local_addr();

    spectator.handle().spectate(host_addr).await?;
    let seed = joiner.handle().connect(host_addr).await?;
    tracing::info!(seed, "handshake complete");

    // Broadcast, so the Host relays the battle to the spectator.
    host.handle()
        .setup(host_pick, StatBoosts::default(), CommunicationMode::Broadcast)
        .await?;
    joiner
        .handle()
        .setup(joiner_pick, StatBoosts::default(), CommunicationMode::P2P)
        .await?;
    joiner.handle().chat("Good luck!").await?;

    let watcher = tokio::spawn(watch(spectator));
    let host_side = tokio::spawn(fight(host, &["Thunderbolt", "Quick Attack"]));
    let joiner_side = tokio::spawn(fight(joiner, &["Water Gun", "Tackle"]));

    for side in [host_side, joiner_side] {
        match side.await {
            Ok(result) => result?,
            Err(e) => tracing::error!(error = %e, "fighter task failed"),
        }
    }
    Ok(watcher.await.ok().flatten())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pokelink::init_tracing();
    eprintln!("starting a local duel: Pikachu vs Squirtle");

    match run_duel("Pikachu", "Squirtle").await? {
        Some(winner) => eprintln!("winner: {winner}"),
        None => eprintln!("the battle ended without a winner"),
    }
    Ok(())
}
