//! Three peers play a scripted game of Chain Reaction over the in-process
//! network, then print the board as every peer sees it.

use std::time::Duration;

use fission::prelude::*;

type DemoResult<T> = Result<T, Box<dyn std::error::Error>>;

const ROOM: &str = "chain-reaction-demo";
const MAX_MOVES: usize = 200;

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Picks the playable cell closest to exploding. Ties go to the first cell
/// in reading order, so a replay makes the same choices.
fn choose_cell(snapshot: &RoomSnapshot) -> Option<(usize, usize)> {
    let game = &snapshot.game;
    let mut best: Option<((usize, usize), u32)> = None;
    for (r, row) in game.board.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let mine = cell.owner.as_ref().is_none_or(|owner| owner == &snapshot.local_id);
            if !mine {
                continue;
            }
            let capacity = game.cell_kind(r, c).capacity();
            let slack = capacity + 1 - cell.dots.min(capacity + 1);
            if best.is_none_or(|(_, s)| slack < s) {
                best = Some(((r, c), slack));
            }
        }
    }
    best.map(|(cell, _)| cell)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(snapshot: &RoomSnapshot) -> String {
    let initial = |id: &PeerId| {
        snapshot
            .participant(id)
            .and_then(|p| p.display_name.chars().next())
            .unwrap_or('?')
    };
    let mut out = String::new();
    for row in &snapshot.game.board {
        for cell in row {
            match &cell.owner {
                Some(owner) => out.push_str(&format!(" {}{}", cell.dots, initial(owner))),
                None => out.push_str("  ."),
            }
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Driving the game
// ---------------------------------------------------------------------------

/// Polls until every peer has applied `moves` moves.
async fn wait_for_moves(peers: &[RoomHandle], moves: usize) -> DemoResult<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    for peer in peers {
        while peer.snapshot().await?.game.move_history.len() < moves {
            if tokio::time::Instant::now() > deadline {
                return Err(format!("{} never saw move {moves}", peer.local_id()).into());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    Ok(())
}

/// The peer whose turn it is, once everyone agrees on it.
async fn current_mover(peers: &[RoomHandle]) -> DemoResult<Option<&RoomHandle>> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let host = peers[0].snapshot().await?;
        if host.game.status != GameStatus::Playing {
            return Ok(None);
        }
        if let Some(turn) = &host.game.current_turn {
            if let Some(peer) = peers.iter().find(|p| p.local_id() == turn) {
                if peer.snapshot().await?.is_my_turn() {
                    return Ok(Some(peer));
                }
            }
        }
        if tokio::time::Instant::now() > deadline {
            return Err("peers never agreed on the turn".into());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Plays until someone wins or `MAX_MOVES` is reached. Returns the number
/// of moves played.
async fn play(peers: &[RoomHandle]) -> DemoResult<usize> {
    let mut played = 0;
    while played < MAX_MOVES {
        let Some(mover) = current_mover(peers).await? else {
            break;
        };
        let view = mover.snapshot().await?;
        let Some((row, col)) = choose_cell(&view) else {
            println!("{} has nowhere to play, stopping", mover.local_id());
            break;
        };
        let outcome = mover.submit_move(row, col).await?;
        played += 1;
        tracing::info!(
            player = %mover.local_id(),
            row,
            col,
            explosions = outcome.explosions.len(),
            "move played"
        );
        wait_for_moves(peers, played).await?;
        if outcome.winner.is_some() {
            break;
        }
    }
    Ok(played)
}

async fn run() -> DemoResult<()> {
    let net = MemoryNetwork::new();
    let config = RoomConfig {
        board_rows: 5,
        board_cols: 4,
        ..RoomConfig::default()
    };

    let (host, _) = PeerBuilder::new(net.clone())
        .config(config.clone())
        .display_name("Hana")
        .host(RoomId::new(ROOM))
        .await?;
    let mut peers = vec![host];
    for name in ["Ada", "Bo"] {
        let (peer, _) = PeerBuilder::new(net.clone())
            .config(config.clone())
            .display_name(name)
            .join(RoomId::new(ROOM))
            .await?;
        peers.push(peer);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    for peer in &peers {
        while peer.snapshot().await?.participants.len() < peers.len() {
            if tokio::time::Instant::now() > deadline {
                return Err("mesh did not form".into());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    let first = peers[0].start_game(None).await?;
    println!("game started, {first} moves first");
    let played = play(&peers).await?;

    for peer in &peers {
        let snapshot = peer.snapshot().await?;
        let name = snapshot.local_profile().map_or("?", |p| p.display_name.as_str());
        println!("\n{name}'s board after {played} moves:");
        print!("{}", render(&snapshot));
    }

    let outcome = peers[0].snapshot().await?;
    match &outcome.game.winner {
        Some(winner) => {
            let name = outcome.participant(winner).map_or("?", |p| p.display_name.as_str());
            println!("\nwinner: {name}");
        }
        None => println!("\nno winner after {played} moves"),
    }

    for peer in peers.iter().rev() {
        peer.leave().await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> DemoResult<()> {
    fission::init_tracing();
    run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_cell_prefers_cell_closest_to_exploding() {
        let me = PeerId::new("me");
        let mut game = GameState::new(3, 3);
        game.board[1][1].dots = 3;
        game.board[1][1].owner = Some(me.clone());
        game.board[0][0].dots = 1;
        game.board[0][0].owner = Some(PeerId::new("other"));
        let snapshot = RoomSnapshot {
            room_id: RoomId::new("r"),
            local_id: me,
            is_host: false,
            participants: Vec::new(),
            connected: Vec::new(),
            game,
            available_colors: Vec::new(),
            chat: Vec::new(),
            typing: Vec::new(),
        };
        assert_eq!(choose_cell(&snapshot), Some((1, 1)));
    }

    #[tokio::test]
    async fn test_run_plays_to_completion() {
        run().await.unwrap();
    }
}
