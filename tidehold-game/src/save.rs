//! Slot-addressed binary quick-saves, usable only between islands.
//!
//! Layout after the ASCII header line: fixed-order native-endian `i32`
//! fields — difficulty, human player, men store, per-player suspended
//! counts, start epoch, one 0/1 flag per island slot — followed by the
//! additive byte checksum of everything before it. Files are written once
//! and never mutated; an interrupted write reads back as corrupt.

use std::fs;
use std::io::ErrorKind;

use log::info;
use thiserror::Error;

use crate::campaign::{Difficulty, Game, GameType};
use crate::constants::{
    MAJOR_VERSION, MAX_ISLANDS_PER_EPOCH, MINOR_VERSION, N_EPOCHS, N_PLAYERS, N_SAVE_SLOTS,
};
use crate::phase::PhaseId;
use crate::player::{PlayerId, valid_player};

const SAVE_MAGIC: &str = "THDSAV";
const SAVE_FORMAT_VERSION: u32 = 1;
const FIELD_BYTES: usize = 4;

/// Why a quick-save slot could not be read or written.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The slot has no save file; callers treat this as "no data".
    #[error("slot is empty")]
    Missing,
    #[error("save header is malformed")]
    BadHeader,
    #[error("save file is truncated")]
    Truncated,
    #[error("difficulty out of range: {0}")]
    InvalidDifficulty(i32),
    #[error("player out of range: {0}")]
    InvalidPlayer(i32),
    #[error("negative {field} count: {value}")]
    NegativeCount { field: &'static str, value: i32 },
    #[error("epoch out of range: {0}")]
    InvalidEpoch(i32),
    #[error("completion flag is not boolean: {0}")]
    InvalidCompletionFlag(i32),
    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: i32, computed: i32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything a quick-save records, validated and ready to apply or to show
/// on a load-game menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub difficulty: Difficulty,
    pub human_player: PlayerId,
    pub n_men_store: i32,
    pub suspended: [i32; N_PLAYERS],
    pub start_epoch: usize,
    pub completed: [bool; MAX_ISLANDS_PER_EPOCH],
}

fn slot_filename(slot: usize) -> String {
    assert!(slot < N_SAVE_SLOTS);
    format!("game_{slot}.SAV")
}

fn push_field(buffer: &mut Vec<u8>, value: i32) {
    buffer.extend_from_slice(&value.to_ne_bytes());
}

fn read_field(payload: &[u8], index: usize) -> Result<i32, SaveError> {
    let offset = index * FIELD_BYTES;
    let bytes = payload
        .get(offset..offset + FIELD_BYTES)
        .ok_or(SaveError::Truncated)?;
    Ok(i32::from_ne_bytes(bytes.try_into().expect("4-byte slice")))
}

/// Additive checksum: the wrapping sum of every payload byte.
fn checksum(payload: &[u8]) -> i32 {
    payload
        .iter()
        .fold(0i32, |sum, byte| sum.wrapping_add(i32::from(*byte)))
}

impl Game {
    /// Write the campaign position into a quick-save slot.
    ///
    /// Only legal in campaign mode on the choose-next-island screen; both
    /// are caller invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`SaveError`] when the file cannot be written.
    pub fn save_game(&self, slot: usize) -> Result<(), SaveError> {
        info!("save game, slot {slot}");
        assert!(self.game_type == GameType::AllIslands);
        assert!(self.phase_id() == PhaseId::PlaceMen);
        assert!(slot < N_SAVE_SLOTS);
        let human = self
            .human_player
            .expect("campaign mode requires a human player");

        let mut payload = Vec::with_capacity((7 + MAX_ISLANDS_PER_EPOCH) * FIELD_BYTES);
        push_field(&mut payload, self.difficulty.as_index());
        push_field(&mut payload, human as i32);
        push_field(&mut payload, self.n_men_store);
        // One suspended slot per player for layout stability, though only
        // the human player's value carries meaning.
        for player in 0..N_PLAYERS {
            let suspended = if player == human {
                self.n_player_suspended
            } else {
                0
            };
            push_field(&mut payload, suspended);
        }
        push_field(&mut payload, self.start_epoch as i32);
        for island in 0..MAX_ISLANDS_PER_EPOCH {
            push_field(&mut payload, i32::from(self.completed_island[island]));
        }
        let sum = checksum(&payload);
        push_field(&mut payload, sum);

        let mut contents = format!(
            "{SAVE_MAGIC}{MAJOR_VERSION}.{MINOR_VERSION}.{SAVE_FORMAT_VERSION}\n"
        )
        .into_bytes();
        contents.extend_from_slice(&payload);

        fs::write(self.save_path(&slot_filename(slot)), contents)?;
        Ok(())
    }

    /// Read back and validate a quick-save slot without applying it.
    ///
    /// # Errors
    ///
    /// [`SaveError::Missing`] when the slot is empty; any other variant
    /// means the file exists but is corrupt or out of domain.
    pub fn load_game_info(&self, slot: usize) -> Result<SaveSummary, SaveError> {
        assert!(slot < N_SAVE_SLOTS);
        let bytes = match fs::read(self.save_path(&slot_filename(slot))) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(SaveError::Missing),
            Err(err) => return Err(err.into()),
        };

        let newline = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or(SaveError::BadHeader)?;
        if !bytes.starts_with(SAVE_MAGIC.as_bytes()) {
            return Err(SaveError::BadHeader);
        }
        let payload = &bytes[newline + 1..];
        let n_fields = 7 + MAX_ISLANDS_PER_EPOCH;
        if payload.len() < (n_fields + 1) * FIELD_BYTES {
            return Err(SaveError::Truncated);
        }

        let mut index = 0;
        let mut next = || -> Result<i32, SaveError> {
            let value = read_field(payload, index);
            index += 1;
            value
        };

        let difficulty_raw = next()?;
        let difficulty = Difficulty::from_index(difficulty_raw)
            .ok_or(SaveError::InvalidDifficulty(difficulty_raw))?;

        let player_raw = next()?;
        if player_raw < 0 || !valid_player(player_raw as usize) {
            return Err(SaveError::InvalidPlayer(player_raw));
        }
        let human_player = player_raw as usize;

        let n_men_store = next()?;
        if n_men_store < 0 {
            return Err(SaveError::NegativeCount {
                field: "men store",
                value: n_men_store,
            });
        }

        let mut suspended = [0i32; N_PLAYERS];
        for slot_value in &mut suspended {
            let value = next()?;
            if value < 0 {
                return Err(SaveError::NegativeCount {
                    field: "suspended",
                    value,
                });
            }
            *slot_value = value;
        }

        let epoch_raw = next()?;
        if epoch_raw < 0 || epoch_raw as usize >= N_EPOCHS {
            return Err(SaveError::InvalidEpoch(epoch_raw));
        }
        let start_epoch = epoch_raw as usize;

        let mut completed = [false; MAX_ISLANDS_PER_EPOCH];
        for flag in &mut completed {
            let value = next()?;
            match value {
                0 => *flag = false,
                1 => *flag = true,
                other => return Err(SaveError::InvalidCompletionFlag(other)),
            }
        }

        let stored = next()?;
        let computed = checksum(&payload[..n_fields * FIELD_BYTES]);
        if stored != computed {
            return Err(SaveError::ChecksumMismatch { stored, computed });
        }

        Ok(SaveSummary {
            difficulty,
            human_player,
            n_men_store,
            suspended,
            start_epoch,
            completed,
        })
    }

    /// Load a quick-save slot into the controller.
    ///
    /// # Errors
    ///
    /// Propagates [`load_game_info`] failures without mutating any state.
    ///
    /// [`load_game_info`]: Game::load_game_info
    pub fn load_game(&mut self, slot: usize) -> Result<(), SaveError> {
        info!("load game, slot {slot}");
        assert!(self.game_type == GameType::AllIslands);
        assert!(self.phase_id() == PhaseId::PlaceMen);

        let summary = self.load_game_info(slot)?;
        self.difficulty = summary.difficulty;
        self.human_player = Some(summary.human_player);
        self.n_men_store = summary.n_men_store;
        self.n_player_suspended = summary.suspended[summary.human_player];
        self.completed_island = summary.completed;
        self.set_epoch(summary.start_epoch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_wraps_instead_of_overflowing() {
        let payload = vec![0xFFu8; 8];
        assert_eq!(checksum(&payload), 8 * 255);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn read_field_rejects_short_payloads() {
        let mut payload = Vec::new();
        push_field(&mut payload, 42);
        assert_eq!(read_field(&payload, 0).unwrap(), 42);
        assert!(matches!(read_field(&payload, 1), Err(SaveError::Truncated)));
    }
}
