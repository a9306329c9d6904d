//! Structured autosave: a resumable mid-island snapshot with crash safety.
//!
//! The document is JSON with a fixed shape: a `savegame` root carrying
//! version attributes, a `global` block, a `time` block, one
//! `completed_island` entry per island slot, and an optional
//! `playing_gamestate` block reconstructing the live island. Keys holding
//! nested structure are "elements" and scalar keys are "attributes":
//! unknown attributes on known elements are logged and tolerated for
//! compatibility, unknown elements are a hard error.
//!
//! Loading renames the primary file away *before* parsing, so a crash while
//! parsing cannot reproduce on the next launch; a failed load preserves the
//! document under a "bad" name for postmortem instead of deleting it.

use std::fs;
use std::io::ErrorKind;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::campaign::{Difficulty, Game, GameResult, GameType};
use crate::constants::{
    MAJOR_VERSION, MAX_ISLANDS_PER_EPOCH, MINOR_VERSION, N_EPOCHS, N_PLAYERS,
};
use crate::phase::{Phase, PhaseId, PlaceMenState, PlayingState};
use crate::player::{Player, PlayerId, valid_player};
use crate::sector::Sector;

const AUTOSAVE_FILENAME: &str = "autosave.sav";
const AUTOSAVE_OLD_FILENAME: &str = "autosave_old.sav";
const AUTOSAVE_BAD_FILENAME: &str = "autosave_bad.sav";
const AUTOSAVE_TMP_FILENAME: &str = "autosave.sav.tmp";
const SAVEGAME_VERSION: u32 = 1;

/// Why an autosave document was rejected. Every variant is recoverable at
/// the load call site; the process falls back to a fresh campaign.
#[derive(Debug, Error)]
pub enum LoadStateError {
    /// The document is not parseable at all.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// A field is present but outside its domain.
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
    /// A required field is absent.
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
    /// The document shape itself is wrong (unknown or duplicated elements).
    #[error("structural violation: {0}")]
    StructuralViolation(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of an autosave load attempt.
#[derive(Debug)]
pub enum LoadStateOutcome {
    /// No autosave existed; nothing changed.
    NoSave,
    /// The controller adopted the saved campaign.
    Resumed,
    /// The document was rejected; it is preserved under the bad path.
    Bad(LoadStateError),
}

impl LoadStateOutcome {
    #[must_use]
    pub const fn resumed(&self) -> bool {
        matches!(self, Self::Resumed)
    }
}

/// The delegated mid-island subtree: sector snapshots plus per-player
/// island state. Opaque to the campaign machinery above it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlayingDoc {
    start_x: usize,
    start_y: usize,
    sectors: Vec<Sector>,
    players: Vec<Option<Player>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tutorial: Option<String>,
}

/// Fully validated document contents, ready to apply in dependency order.
struct ParsedSave {
    game_type: GameType,
    difficulty: Difficulty,
    human_player: Option<PlayerId>,
    n_men_store: i32,
    n_player_suspended: i32,
    start_epoch: usize,
    selected_island: usize,
    real_time: Option<i32>,
    game_time: Option<i32>,
    completed: [bool; MAX_ISLANDS_PER_EPOCH],
    playing: Option<PlayingDoc>,
}

fn as_object<'v>(
    value: &'v Value,
    element: &'static str,
) -> Result<&'v serde_json::Map<String, Value>, LoadStateError> {
    value.as_object().ok_or_else(|| {
        LoadStateError::StructuralViolation(format!("element `{element}` is not a block"))
    })
}

fn int_attr(
    block: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<i64>, LoadStateError> {
    match block.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| LoadStateError::InvalidField {
                field,
                value: value.to_string(),
            }),
    }
}

fn require_int(
    block: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<i64, LoadStateError> {
    int_attr(block, field)?.ok_or(LoadStateError::MissingRequiredField(field))
}

fn str_attr<'v>(
    block: &'v serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'v str>, LoadStateError> {
    match block.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| LoadStateError::InvalidField {
                field,
                value: value.to_string(),
            }),
    }
}

fn warn_unknown_attrs(block: &serde_json::Map<String, Value>, element: &str, known: &[&str]) {
    for key in block.keys() {
        if !known.contains(&key.as_str()) {
            warn!("unknown {element} attribute: {key}");
        }
    }
}

impl Game {
    fn autosave_path(&self, name: &str) -> std::path::PathBuf {
        self.save_path(name)
    }

    /// Whether the current phase carries state worth resuming.
    fn should_save_state(&self) -> bool {
        match self.phase_id() {
            PhaseId::ChooseGameType
            | PhaseId::ChooseDifficulty
            | PhaseId::ChoosePlayer
            | PhaseId::ChooseTutorial
            | PhaseId::GameComplete => false,
            // A tutorial resumed onto the islands screen would escape the
            // script; let it restart from the menu instead.
            PhaseId::EndIsland => self.game_type != GameType::Tutorial,
            PhaseId::PlaceMen | PhaseId::Playing => true,
        }
    }

    fn build_save_document(&self) -> Value {
        let completed: Vec<Value> = (0..MAX_ISLANDS_PER_EPOCH)
            .map(|island| {
                json!({
                    "island_id": island,
                    "complete": i32::from(self.completed_island[island]),
                })
            })
            .collect();

        let mut savegame = json!({
            "major": MAJOR_VERSION,
            "minor": MINOR_VERSION,
            "savegame_version": SAVEGAME_VERSION,
            "global": {
                "game_type": self.game_type.as_str(),
                "difficulty": self.difficulty.as_str(),
                "human_player": self.human_player.map(|p| p as i64),
                "n_men_store": self.n_men_store,
                "n_player_suspended": self.n_player_suspended,
                "start_epoch": self.start_epoch,
                "selected_island": self.selected_island,
            },
            "time": {
                "real_time": self.clock.real_time(),
                "game_time": self.clock.game_time(),
            },
            "completed_island": completed,
        });

        if let Phase::Playing(state) = &self.phase {
            let map = self.map().expect("playing phase requires a bound map");
            let playing = PlayingDoc {
                start_x: state.start.0,
                start_y: state.start.1,
                sectors: map.sectors().cloned().collect(),
                players: self.roster.slot_states().into_iter().collect(),
                tutorial: self.tutorial.clone(),
            };
            savegame["playing_gamestate"] =
                serde_json::to_value(playing).expect("playing state serializes");
        }

        json!({ "savegame": savegame })
    }

    /// Write the resumable snapshot. Best-effort: failures are logged, never
    /// raised, since the autosave runs on every backgrounding event.
    pub fn save_state(&self) {
        if self.loading {
            warn!("refusing to save state while a load is in progress");
            return;
        }
        if !self.should_save_state() {
            return;
        }
        let document = self.build_save_document();
        let tmp = self.autosave_path(AUTOSAVE_TMP_FILENAME);
        let primary = self.autosave_path(AUTOSAVE_FILENAME);
        let result = serde_json::to_string_pretty(&document)
            .map_err(std::io::Error::other)
            .and_then(|text| fs::write(&tmp, text))
            .and_then(|()| fs::rename(&tmp, &primary));
        match result {
            Ok(()) => info!("saved state to {}", primary.display()),
            Err(err) => error!("failed to save state: {err}"),
        }
    }

    /// Remove the autosave, once consumed or invalidated.
    pub fn delete_state(&self) {
        let _ = fs::remove_file(self.autosave_path(AUTOSAVE_FILENAME));
    }

    /// The application came back to the foreground: a resumed session must
    /// not leave a stale autosave behind.
    pub fn activate(&mut self) {
        self.delete_state();
    }

    /// The application is being backgrounded: pause play and snapshot.
    pub fn deactivate(&mut self) {
        if self.phase_id() == PhaseId::Playing && !self.is_paused() {
            self.toggle_pause();
        }
        self.save_state();
    }

    /// Attempt to resume from the autosave.
    ///
    /// The primary file is renamed to the old path before parsing begins, so
    /// a crash mid-load is forward-only: the next launch finds no primary
    /// autosave and starts fresh.
    pub fn load_state(&mut self) -> LoadStateOutcome {
        let primary = self.autosave_path(AUTOSAVE_FILENAME);
        let contents = match fs::read_to_string(&primary) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no saved state at {}", primary.display());
                return LoadStateOutcome::NoSave;
            }
            Err(err) => {
                warn!("could not read saved state: {err}");
                return LoadStateOutcome::NoSave;
            }
        };

        let old = self.autosave_path(AUTOSAVE_OLD_FILENAME);
        let _ = fs::remove_file(&old);
        if let Err(err) = fs::rename(&primary, &old) {
            warn!("could not set aside saved state: {err}");
        }

        self.loading = true;
        let result = self.parse_and_apply(&contents);
        self.loading = false;

        match result {
            Ok(()) => {
                let _ = fs::remove_file(&old);
                info!("resumed saved state");
                LoadStateOutcome::Resumed
            }
            Err(err) => {
                error!("rejecting saved state: {err}");
                let bad = self.autosave_path(AUTOSAVE_BAD_FILENAME);
                let _ = fs::remove_file(&bad);
                let _ = fs::rename(&old, &bad);
                LoadStateOutcome::Bad(err)
            }
        }
    }

    fn parse_and_apply(&mut self, contents: &str) -> Result<(), LoadStateError> {
        let document: Value = serde_json::from_str(contents)
            .map_err(|err| LoadStateError::MalformedDocument(err.to_string()))?;
        let parsed = self.validate_document(&document)?;
        self.apply_document(parsed);
        Ok(())
    }

    /// Validate the whole document without mutating any campaign state, so
    /// a rejected save leaves the controller untouched.
    fn validate_document(&self, document: &Value) -> Result<ParsedSave, LoadStateError> {
        let root = as_object(document, "document")?;
        for key in root.keys() {
            if key != "savegame" {
                return Err(LoadStateError::StructuralViolation(format!(
                    "unknown element `{key}`"
                )));
            }
        }
        let savegame = root
            .get("savegame")
            .ok_or(LoadStateError::MissingRequiredField("savegame"))?;
        let savegame = as_object(savegame, "savegame")?;

        for (key, value) in savegame {
            match key.as_str() {
                "global" | "time" | "completed_island" | "playing_gamestate" => {}
                "major" | "minor" | "savegame_version" => {}
                other => {
                    if value.is_object() || value.is_array() {
                        return Err(LoadStateError::StructuralViolation(format!(
                            "unknown element `{other}`"
                        )));
                    }
                    warn!("unknown savegame attribute: {other}");
                }
            }
        }
        if let Some(version) = int_attr(savegame, "savegame_version")? {
            info!("savegame version {version}");
        }

        let global = savegame
            .get("global")
            .ok_or(LoadStateError::MissingRequiredField("global"))?;
        let global = as_object(global, "global")?;
        warn_unknown_attrs(
            global,
            "global",
            &[
                "game_type",
                "difficulty",
                "human_player",
                "n_men_store",
                "n_player_suspended",
                "start_epoch",
                "selected_island",
            ],
        );

        let game_type = match str_attr(global, "game_type")? {
            Some(text) => text.parse().map_err(|()| LoadStateError::InvalidField {
                field: "game_type",
                value: text.to_string(),
            })?,
            None => GameType::default(),
        };
        let difficulty = match str_attr(global, "difficulty")? {
            Some(text) => text.parse().map_err(|()| LoadStateError::InvalidField {
                field: "difficulty",
                value: text.to_string(),
            })?,
            None => Difficulty::default(),
        };
        let human_player = match int_attr(global, "human_player")? {
            None => None,
            Some(raw) => {
                let player = usize::try_from(raw).ok().filter(|p| valid_player(*p)).ok_or(
                    LoadStateError::InvalidField {
                        field: "human_player",
                        value: raw.to_string(),
                    },
                )?;
                Some(player)
            }
        };
        let n_men_store = validate_count(global, "n_men_store")?;
        let n_player_suspended = validate_count(global, "n_player_suspended")?;

        let start_epoch = require_int(global, "start_epoch")?;
        let start_epoch = usize::try_from(start_epoch)
            .ok()
            .filter(|e| *e < N_EPOCHS)
            .ok_or(LoadStateError::InvalidField {
                field: "start_epoch",
                value: start_epoch.to_string(),
            })?;
        let selected_island = require_int(global, "selected_island")?;
        let selected_island = usize::try_from(selected_island)
            .ok()
            .filter(|i| *i < MAX_ISLANDS_PER_EPOCH)
            .ok_or(LoadStateError::InvalidField {
                field: "selected_island",
                value: selected_island.to_string(),
            })?;
        let map = self
            .catalog()
            .map(start_epoch, selected_island)
            .ok_or(LoadStateError::InvalidField {
                field: "selected_island",
                value: format!("no island at epoch {start_epoch} slot {selected_island}"),
            })?;

        let (real_time, game_time) = match savegame.get("time") {
            None => (None, None),
            Some(time) => {
                let time = as_object(time, "time")?;
                warn_unknown_attrs(time, "time", &["real_time", "game_time"]);
                (
                    validate_time(time, "real_time")?,
                    validate_time(time, "game_time")?,
                )
            }
        };

        let mut completed = [false; MAX_ISLANDS_PER_EPOCH];
        if let Some(entries) = savegame.get("completed_island") {
            let entries = entries.as_array().ok_or_else(|| {
                LoadStateError::StructuralViolation(
                    "completed_island is not an entry list".to_string(),
                )
            })?;
            for entry in entries {
                let entry = as_object(entry, "completed_island")?;
                warn_unknown_attrs(entry, "completed_island", &["island_id", "complete"]);
                let island_id = require_int(entry, "island_id")?;
                let island_id = usize::try_from(island_id)
                    .ok()
                    .filter(|i| *i < MAX_ISLANDS_PER_EPOCH)
                    .ok_or(LoadStateError::InvalidField {
                        field: "island_id",
                        value: island_id.to_string(),
                    })?;
                let complete = match entry.get("complete") {
                    None => false,
                    Some(Value::Bool(flag)) => *flag,
                    Some(value) => match value.as_i64() {
                        Some(0) => false,
                        Some(1) => true,
                        _ => {
                            return Err(LoadStateError::InvalidField {
                                field: "complete",
                                value: value.to_string(),
                            });
                        }
                    },
                };
                completed[island_id] = complete;
            }
        }

        let playing = match savegame.get("playing_gamestate") {
            None => None,
            Some(value) if value.is_array() => {
                return Err(LoadStateError::StructuralViolation(
                    "more than one playing_gamestate".to_string(),
                ));
            }
            Some(value) => {
                let doc: PlayingDoc = serde_json::from_value(value.clone()).map_err(|err| {
                    LoadStateError::InvalidField {
                        field: "playing_gamestate",
                        value: err.to_string(),
                    }
                })?;
                if !map.is_sector_at(doc.start_x, doc.start_y) {
                    return Err(LoadStateError::InvalidField {
                        field: "playing_gamestate",
                        value: format!("start cell ({}, {}) is off-island", doc.start_x, doc.start_y),
                    });
                }
                for sector in &doc.sectors {
                    let (x, y) = sector.position();
                    if !map.is_sector_at(x, y) {
                        return Err(LoadStateError::InvalidField {
                            field: "playing_gamestate",
                            value: format!("sector ({x}, {y}) is off-island"),
                        });
                    }
                }
                if doc.players.len() != N_PLAYERS {
                    return Err(LoadStateError::InvalidField {
                        field: "playing_gamestate",
                        value: format!("expected {N_PLAYERS} player slots"),
                    });
                }
                if game_type == GameType::Tutorial && doc.tutorial.is_none() {
                    return Err(LoadStateError::MissingRequiredField("tutorial"));
                }
                Some(doc)
            }
        };

        Ok(ParsedSave {
            game_type,
            difficulty,
            human_player,
            n_men_store,
            n_player_suspended,
            start_epoch,
            selected_island,
            real_time,
            game_time,
            completed,
            playing,
        })
    }

    /// Adopt a validated document. Application order is fixed by data
    /// dependencies, not by the order fields appeared in the document: the
    /// map binding comes from the global block, and the time fields are in
    /// place before any sector is reconstructed so time-derived state stays
    /// deterministic.
    fn apply_document(&mut self, parsed: ParsedSave) {
        self.game_type = parsed.game_type;
        self.difficulty = parsed.difficulty;
        self.human_player = parsed.human_player;
        self.n_men_store = parsed.n_men_store;
        self.n_player_suspended = parsed.n_player_suspended;
        self.set_current_island(parsed.start_epoch, parsed.selected_island);

        if let Some(real_time) = parsed.real_time {
            self.clock.set_real_time(real_time);
        }
        if let Some(game_time) = parsed.game_time {
            self.clock.set_game_time(game_time);
        }

        self.completed_island = parsed.completed;
        self.game_result = GameResult::Undefined;
        self.pending = None;

        if let Some(doc) = parsed.playing {
            let epoch = self.start_epoch;
            let map = self
                .map_mut()
                .expect("validated island position is bound");
            map.free_sectors();
            map.create_sectors(epoch);
            for sector in doc.sectors {
                map.restore_sector(sector);
            }
            let mut slots: [Option<Player>; N_PLAYERS] = Default::default();
            for (slot, player) in doc.players.into_iter().enumerate() {
                slots[slot] = player;
            }
            self.roster.restore(slots);
            self.tutorial = doc.tutorial;
            self.phase = Phase::Playing(PlayingState {
                start: (doc.start_x, doc.start_y),
                quit_requested: false,
            });
            // Resume paused so the player re-enters on their own terms.
            self.paused = true;
        } else {
            self.phase = Phase::PlaceMen(PlaceMenState::default());
            self.paused = false;
        }
    }
}

fn validate_count(
    block: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<i32, LoadStateError> {
    match int_attr(block, field)? {
        None => Ok(0),
        Some(raw) => i32::try_from(raw)
            .ok()
            .filter(|v| *v >= 0)
            .ok_or(LoadStateError::InvalidField {
                field,
                value: raw.to_string(),
            }),
    }
}

fn validate_time(
    block: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<i32>, LoadStateError> {
    match int_attr(block, field)? {
        None => Ok(None),
        Some(raw) => i32::try_from(raw)
            .ok()
            .filter(|v| *v >= 0)
            .map(Some)
            .ok_or(LoadStateError::InvalidField {
                field,
                value: raw.to_string(),
            }),
    }
}
