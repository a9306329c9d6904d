mod common;

use common::{campaign_at_place_men, full_catalog, settle, temp_save_dir};
use tidehold_game::constants::MAX_ISLANDS_PER_EPOCH;
use tidehold_game::{
    Difficulty, Game, GameResult, GameType, IslandSim, Map, Phase, PhaseId, PlayerId,
    StartupConfig,
};

/// Drive one island from placement to the given verdict.
fn play_island(game: &mut Game, result: GameResult) {
    assert_eq!(game.phase_id(), PhaseId::PlaceMen);
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(game);
    assert_eq!(game.phase_id(), PhaseId::Playing);
    game.declare_result(result);
    settle(game);
    assert_eq!(game.phase_id(), PhaseId::EndIsland);
}

#[test]
fn winning_every_island_advances_the_epoch_and_tops_up_the_reserve() {
    let mut game = campaign_at_place_men("progress");
    assert_eq!(game.men_store(), 150);

    for wins in 0..MAX_ISLANDS_PER_EPOCH {
        play_island(&mut game, GameResult::Won);
        if wins < MAX_ISLANDS_PER_EPOCH - 1 {
            assert!(game.island_completed(wins));
            assert_eq!(game.start_epoch(), 0);
        }
        game.return_to_choose_island();
        assert_eq!(game.phase_id(), PhaseId::PlaceMen);
    }

    // Three wins at 10 men each, then the fresh epoch's allotment.
    assert_eq!(game.men_store(), 150 - 30 + 150);
    assert_eq!(game.start_epoch(), 1);
    assert_eq!(game.selected_island(), 0);
    for island in 0..MAX_ISLANDS_PER_EPOCH {
        assert!(!game.island_completed(island));
    }
}

#[test]
fn completion_flags_are_monotonic_within_an_epoch() {
    let mut game = campaign_at_place_men("monotonic");
    play_island(&mut game, GameResult::Won);
    game.return_to_choose_island();
    assert!(game.island_completed(0));

    play_island(&mut game, GameResult::Won);
    game.return_to_choose_island();
    assert!(game.island_completed(0));
    assert!(game.island_completed(1));
}

#[test]
fn losing_keeps_the_island_uncompleted() {
    let mut game = campaign_at_place_men("loss");
    play_island(&mut game, GameResult::Lost);
    game.return_to_choose_island();
    assert!(!game.island_completed(0));
    assert_eq!(game.selected_island(), 0);
    assert_eq!(game.men_store(), 150);
}

#[test]
fn quitting_credits_a_surviving_ai() {
    let mut game = campaign_at_place_men("quit");
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(&mut game);

    game.request_quit(false);
    game.request_confirm();
    settle(&mut game);

    let Phase::EndIsland(outcome) = game.phase() else {
        panic!("expected the end-island screen");
    };
    assert_eq!(outcome.result, GameResult::Quit);
    let credited = outcome.credited_ai.expect("an AI survived the quit");
    assert_ne!(Some(credited), game.human_player());
    assert!(outcome.island_completed.is_none());
}

#[test]
fn stats_report_no_phantom_deaths_on_a_clean_win() {
    let mut game = campaign_at_place_men("stats");
    play_island(&mut game, GameResult::Won);
    for player in game.roster().iter() {
        assert!(player.n_deaths() >= 0);
        assert_eq!(player.n_deaths(), 0);
    }
}

#[test]
fn shutdown_sectors_feed_the_suspended_pool_on_a_win() {
    let mut game = campaign_at_place_men("suspend");
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(&mut game);

    let human = game.human_player().unwrap();
    {
        let map = game.map_mut().unwrap();
        let tower = map.sector_mut(0, 3).unwrap();
        assert_eq!(tower.owner(), Some(human));
        tower.set_shutdown(true);
    }
    game.declare_result(GameResult::Won);
    settle(&mut game);

    assert_eq!(game.n_suspended(), 10);
}

#[test]
fn demo_campaign_plays_without_a_human() {
    let mut game = Game::new(
        StartupConfig::default(),
        full_catalog(),
        0xD3310,
        &temp_save_dir("demo"),
    );
    game.choose_game_type(GameType::SingleIsland);
    game.choose_difficulty(Difficulty::Easy);
    game.choose_player(None);
    assert!(game.is_demo());

    game.place_tower();
    settle(&mut game);
    assert_eq!(game.phase_id(), PhaseId::Playing);

    let owned = game
        .map()
        .unwrap()
        .sectors()
        .filter(|s| s.owner().is_some())
        .count();
    assert_eq!(owned, 2, "one tower per AI opponent");
}

#[derive(Default)]
struct TurnRecorder {
    turns: Vec<PlayerId>,
}

impl IslandSim for TurnRecorder {
    fn player_turn(&mut self, player: PlayerId, _map: &mut Map, _sim_delta_ms: i32) {
        self.turns.push(player);
    }
}

#[test]
fn ai_turns_run_sequentially_in_roster_order() {
    let mut game = campaign_at_place_men("turns");
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(&mut game);

    let mut recorder = TurnRecorder::default();
    game.update(100, &mut recorder);
    // Human in slot 0, opponents in slots 1 and 2.
    assert_eq!(recorder.turns, vec![1, 2]);

    game.toggle_pause();
    let before = recorder.turns.len();
    game.update(100, &mut recorder);
    assert_eq!(recorder.turns.len(), before, "paused updates run no turns");
}

#[test]
fn winning_the_final_epoch_completes_the_campaign() {
    let mut game = campaign_at_place_men("complete");

    // March through the nine progression epochs.
    for epoch in 0..9 {
        assert_eq!(game.start_epoch(), epoch);
        for _ in 0..MAX_ISLANDS_PER_EPOCH {
            play_island(&mut game, GameResult::Won);
            game.return_to_choose_island();
        }
    }
    assert_eq!(game.start_epoch(), 9);

    // The final epoch draws on the suspended pool, which is empty here.
    assert_eq!(game.men_available(), game.n_suspended());
    assert!(game.choose_start(0, 3, 0));
    game.place_tower();
    settle(&mut game);
    game.declare_result(GameResult::Won);
    settle(&mut game);
    game.return_to_choose_island();
    assert_eq!(game.phase_id(), PhaseId::GameComplete);

    game.start_new_game();
    assert_eq!(game.phase_id(), PhaseId::PlaceMen);
    assert_eq!(game.start_epoch(), 0);
    assert_eq!(game.men_store(), 150);
}

#[test]
fn single_island_mode_wraps_epochs() {
    let mut game = Game::new(
        StartupConfig::default(),
        full_catalog(),
        1,
        &temp_save_dir("wrap"),
    );
    game.choose_game_type(GameType::SingleIsland);
    game.choose_difficulty(Difficulty::Easy);
    game.choose_player(Some(0));
    for _ in 0..10 {
        game.next_epoch();
    }
    assert_eq!(game.start_epoch(), 0);
}
