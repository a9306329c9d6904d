#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use tidehold_game::constants::{MAX_ISLANDS_PER_EPOCH, N_EPOCHS};
use tidehold_game::{Difficulty, Game, GameType, Map, MapCatalog, MapColour, NullSim, PhaseId, StartupConfig};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Fresh scratch directory for save files, unique per test invocation.
pub fn temp_save_dir(tag: &str) -> PathBuf {
    let counter = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "tidehold-{tag}-{}-{counter}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("scratch dir is creatable");
    dir
}

/// A full campaign catalog: every epoch holds three six-cell islands in a
/// row at y = 3.
pub fn full_catalog() -> MapCatalog {
    let mut maps = Vec::new();
    for epoch in 0..N_EPOCHS {
        for i in 0..MAX_ISLANDS_PER_EPOCH {
            let mut map = Map::new(MapColour::Green, 2, &format!("isle{epoch}{i}"));
            for x in 0..6 {
                map.new_square_at(x, 3);
            }
            maps.push((epoch, map));
        }
    }
    MapCatalog::from_maps(maps).expect("catalog fits")
}

/// Run enough clamped update frames to consume any pending fade.
pub fn settle(game: &mut Game) {
    for _ in 0..8 {
        game.update(200, &mut NullSim);
    }
}

/// A campaign game parked on the place-men screen.
pub fn campaign_at_place_men(tag: &str) -> Game {
    let mut game = Game::new(
        StartupConfig::default(),
        full_catalog(),
        0xC0FFEE,
        &temp_save_dir(tag),
    );
    game.choose_game_type(GameType::AllIslands);
    game.choose_difficulty(Difficulty::Easy);
    game.choose_player(Some(0));
    assert_eq!(game.phase_id(), PhaseId::PlaceMen);
    game
}
