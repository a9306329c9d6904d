mod common;

use std::fs;
use std::hash::Hasher;
use std::path::Path;

use common::{campaign_at_place_men, full_catalog, settle};
use serde_json::Value;
use tidehold_game::{
    Difficulty, Game, GameResult, GameType, LoadStateError, LoadStateOutcome, Phase, PhaseId,
    SaveError, StartupConfig,
};
use twox_hash::XxHash64;

const N_PAYLOAD_FIELDS: usize = 10;

fn win_one_island(game: &mut Game, suspend: bool) {
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(game);
    if suspend {
        let human = game.human_player().unwrap();
        let tower = game.map_mut().unwrap().sector_mut(0, 3).unwrap();
        assert_eq!(tower.owner(), Some(human));
        tower.set_shutdown(true);
    }
    game.declare_result(GameResult::Won);
    settle(game);
    game.return_to_choose_island();
    assert_eq!(game.phase_id(), PhaseId::PlaceMen);
}

fn campaign_partner(original: &Game) -> Game {
    let mut partner = Game::new(
        StartupConfig::default(),
        full_catalog(),
        0xFACADE,
        original.save_dir(),
    );
    partner.choose_game_type(GameType::AllIslands);
    partner.choose_difficulty(Difficulty::Ultra);
    partner.choose_player(Some(3));
    partner
}

fn digest_sectors(game: &Game) -> u64 {
    let sectors: Vec<_> = game.map().unwrap().sectors().cloned().collect();
    let json = serde_json::to_string(&sectors).expect("sectors serialize");
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(json.as_bytes());
    hasher.finish()
}

// ---- binary quick-saves --------------------------------------------------

#[test]
fn binary_round_trip_reproduces_the_campaign_position() {
    let mut game = campaign_at_place_men("bin-roundtrip");
    win_one_island(&mut game, true);
    assert!(game.island_completed(0));
    assert_eq!(game.n_suspended(), 10);

    game.save_game(3).unwrap();

    let mut restored = campaign_partner(&game);
    restored.load_game(3).unwrap();

    assert_eq!(restored.difficulty(), game.difficulty());
    assert_eq!(restored.human_player(), game.human_player());
    assert_eq!(restored.men_store(), game.men_store());
    assert_eq!(restored.n_suspended(), game.n_suspended());
    assert_eq!(restored.start_epoch(), game.start_epoch());
    for island in 0..3 {
        assert_eq!(restored.island_completed(island), game.island_completed(island));
    }
    // The loaded campaign skips the completed island.
    assert_eq!(restored.selected_island(), 1);
}

#[test]
fn empty_slot_reads_as_missing() {
    let game = campaign_at_place_men("bin-missing");
    assert!(matches!(game.load_game_info(7), Err(SaveError::Missing)));
}

#[test]
fn corrupted_payload_fails_the_checksum() {
    let mut game = campaign_at_place_men("bin-checksum");
    win_one_island(&mut game, false);
    game.save_game(0).unwrap();

    let path = game.save_dir().join("game_0.SAV");
    let mut bytes = fs::read(&path).unwrap();
    let payload_start = bytes.iter().position(|b| *b == b'\n').unwrap() + 1;
    // Flip the men-store field without touching the stored checksum.
    let men_offset = payload_start + 2 * 4;
    bytes[men_offset..men_offset + 4].copy_from_slice(&9999i32.to_ne_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        game.load_game_info(0),
        Err(SaveError::ChecksumMismatch { .. })
    ));
}

#[test]
fn out_of_domain_fields_are_rejected_even_with_a_valid_checksum() {
    let mut game = campaign_at_place_men("bin-domain");
    win_one_island(&mut game, false);
    game.save_game(0).unwrap();

    let path = game.save_dir().join("game_0.SAV");
    let mut bytes = fs::read(&path).unwrap();
    let payload_start = bytes.iter().position(|b| *b == b'\n').unwrap() + 1;
    bytes[payload_start..payload_start + 4].copy_from_slice(&9i32.to_ne_bytes());
    let sum = bytes[payload_start..payload_start + N_PAYLOAD_FIELDS * 4]
        .iter()
        .fold(0i32, |acc, byte| acc.wrapping_add(i32::from(*byte)));
    let checksum_offset = payload_start + N_PAYLOAD_FIELDS * 4;
    bytes[checksum_offset..checksum_offset + 4].copy_from_slice(&sum.to_ne_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        game.load_game_info(0),
        Err(SaveError::InvalidDifficulty(9))
    ));
}

#[test]
fn truncated_save_is_rejected() {
    let mut game = campaign_at_place_men("bin-truncated");
    win_one_island(&mut game, false);
    game.save_game(0).unwrap();

    let path = game.save_dir().join("game_0.SAV");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(
        game.load_game_info(0),
        Err(SaveError::Truncated)
    ));
}

// ---- structured autosave -------------------------------------------------

fn autosave_path(game: &Game) -> std::path::PathBuf {
    game.save_dir().join("autosave.sav")
}

#[test]
fn mid_island_autosave_resumes_sectors_time_and_pause() {
    let mut game = campaign_at_place_men("auto-resume");
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(&mut game);
    assert_eq!(game.phase_id(), PhaseId::Playing);

    game.map_mut().unwrap().sector_mut(4, 3).unwrap().set_army(1, 7);
    game.map_mut().unwrap().sector_mut(5, 3).unwrap().set_nuked();

    let saved_digest = digest_sectors(&game);
    game.deactivate();
    let real_time = game.clock().real_time();
    let game_time = game.clock().game_time();
    assert!(autosave_path(&game).exists());

    let mut resumed = Game::new(
        StartupConfig::default(),
        full_catalog(),
        0x0DD,
        game.save_dir(),
    );
    assert!(resumed.load_state().resumed());
    assert_eq!(resumed.phase_id(), PhaseId::Playing);
    assert!(resumed.is_paused());
    assert_eq!(resumed.clock().real_time(), real_time);
    assert_eq!(resumed.clock().game_time(), game_time);
    assert_eq!(digest_sectors(&resumed), saved_digest);
    let Phase::Playing(state) = resumed.phase() else {
        panic!("expected the playing screen");
    };
    assert_eq!(state.start, (0, 3));

    // The autosave was consumed; nothing is left to load.
    assert!(!autosave_path(&resumed).exists());
    assert!(matches!(resumed.load_state(), LoadStateOutcome::NoSave));
}

#[test]
fn between_island_autosave_resumes_to_place_men() {
    let mut game = campaign_at_place_men("auto-placemen");
    win_one_island(&mut game, false);
    game.deactivate();

    let mut resumed = Game::new(
        StartupConfig::default(),
        full_catalog(),
        2,
        game.save_dir(),
    );
    assert!(resumed.load_state().resumed());
    assert_eq!(resumed.phase_id(), PhaseId::PlaceMen);
    assert!(resumed.island_completed(0));
    assert_eq!(resumed.game_type(), GameType::AllIslands);
}

#[test]
fn menu_phases_write_no_autosave() {
    let mut game = Game::new(
        StartupConfig::default(),
        full_catalog(),
        3,
        &common::temp_save_dir("auto-menu"),
    );
    game.deactivate();
    assert!(!autosave_path(&game).exists());
}

#[test]
fn crash_between_rename_and_parse_is_forward_only() {
    let mut game = campaign_at_place_men("auto-crash");
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(&mut game);
    game.deactivate();

    // The loader renames the primary file away before parsing; a crash at
    // that point leaves only the old path behind.
    let dir = game.save_dir().to_path_buf();
    fs::rename(dir.join("autosave.sav"), dir.join("autosave_old.sav")).unwrap();

    let mut next_launch = Game::new(StartupConfig::default(), full_catalog(), 4, &dir);
    assert!(matches!(next_launch.load_state(), LoadStateOutcome::NoSave));
    assert!(!dir.join("autosave.sav").exists());
    assert!(dir.join("autosave_old.sav").exists());
}

#[test]
fn unparseable_autosave_is_preserved_under_the_bad_path() {
    let game = campaign_at_place_men("auto-bad");
    fs::write(autosave_path(&game), "not a document {{").unwrap();

    let mut loader = Game::new(
        StartupConfig::default(),
        full_catalog(),
        5,
        game.save_dir(),
    );
    let outcome = loader.load_state();
    assert!(matches!(
        outcome,
        LoadStateOutcome::Bad(LoadStateError::MalformedDocument(_))
    ));
    assert!(!autosave_path(&game).exists());
    let bad = game.save_dir().join("autosave_bad.sav");
    assert_eq!(fs::read_to_string(bad).unwrap(), "not a document {{");

    // No repeat-crash loop: the next attempt finds nothing.
    assert!(matches!(loader.load_state(), LoadStateOutcome::NoSave));
}

fn edit_autosave(dir: &Path, edit: impl FnOnce(&mut Value)) {
    let path = dir.join("autosave.sav");
    let mut document: Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    edit(&mut document);
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
}

#[test]
fn unknown_elements_are_a_hard_error() {
    let mut game = campaign_at_place_men("auto-element");
    win_one_island(&mut game, false);
    game.deactivate();
    edit_autosave(game.save_dir(), |document| {
        document["savegame"]["weather"] = serde_json::json!({ "storms": 3 });
    });

    let mut loader = Game::new(
        StartupConfig::default(),
        full_catalog(),
        6,
        game.save_dir(),
    );
    assert!(matches!(
        loader.load_state(),
        LoadStateOutcome::Bad(LoadStateError::StructuralViolation(_))
    ));
    assert!(game.save_dir().join("autosave_bad.sav").exists());
}

#[test]
fn unknown_attributes_are_tolerated() {
    let mut game = campaign_at_place_men("auto-attr");
    win_one_island(&mut game, false);
    game.deactivate();
    edit_autosave(game.save_dir(), |document| {
        document["savegame"]["flavour"] = Value::String("brine".to_string());
        document["savegame"]["global"]["legacy_field"] = Value::from(12);
    });

    let mut loader = Game::new(
        StartupConfig::default(),
        full_catalog(),
        7,
        game.save_dir(),
    );
    assert!(loader.load_state().resumed());
    assert!(loader.island_completed(0));
}

#[test]
fn out_of_domain_autosave_fields_are_semantic_errors() {
    let mut game = campaign_at_place_men("auto-domain");
    win_one_island(&mut game, false);
    game.deactivate();
    edit_autosave(game.save_dir(), |document| {
        document["savegame"]["global"]["start_epoch"] = Value::from(99);
    });

    let mut loader = Game::new(
        StartupConfig::default(),
        full_catalog(),
        8,
        game.save_dir(),
    );
    assert!(matches!(
        loader.load_state(),
        LoadStateOutcome::Bad(LoadStateError::InvalidField { field: "start_epoch", .. })
    ));
}

#[test]
fn missing_global_block_is_reported() {
    let mut game = campaign_at_place_men("auto-missing");
    win_one_island(&mut game, false);
    game.deactivate();
    edit_autosave(game.save_dir(), |document| {
        document["savegame"]
            .as_object_mut()
            .unwrap()
            .remove("global");
    });

    let mut loader = Game::new(
        StartupConfig::default(),
        full_catalog(),
        9,
        game.save_dir(),
    );
    assert!(matches!(
        loader.load_state(),
        LoadStateOutcome::Bad(LoadStateError::MissingRequiredField("global"))
    ));
}

#[test]
fn duplicated_playing_block_is_a_structural_violation() {
    let mut game = campaign_at_place_men("auto-duplicate");
    assert!(game.choose_start(0, 3, 10));
    game.place_tower();
    settle(&mut game);
    game.deactivate();
    edit_autosave(game.save_dir(), |document| {
        let playing = document["savegame"]["playing_gamestate"].clone();
        document["savegame"]["playing_gamestate"] =
            Value::Array(vec![playing.clone(), playing]);
    });

    let mut loader = Game::new(
        StartupConfig::default(),
        full_catalog(),
        10,
        game.save_dir(),
    );
    assert!(matches!(
        loader.load_state(),
        LoadStateOutcome::Bad(LoadStateError::StructuralViolation(_))
    ));
}
