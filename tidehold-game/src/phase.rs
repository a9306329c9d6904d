//! The closed set of top-level screens and the one-shot continuations the
//! update step consumes after a fade completes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::campaign::GameResult;
use crate::player::PlayerId;

/// Screen tags driving the controller's dispatch. Which concrete screen is
/// active is a tag, not a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    ChooseGameType,
    ChooseDifficulty,
    ChoosePlayer,
    ChooseTutorial,
    PlaceMen,
    Playing,
    EndIsland,
    GameComplete,
}

impl PhaseId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChooseGameType => "choose_game_type",
            Self::ChooseDifficulty => "choose_difficulty",
            Self::ChoosePlayer => "choose_player",
            Self::ChooseTutorial => "choose_tutorial",
            Self::PlaceMen => "place_men",
            Self::Playing => "playing",
            Self::EndIsland => "end_island",
            Self::GameComplete => "game_complete",
        }
    }

    /// Phases during which the current map must be bound.
    #[must_use]
    pub const fn requires_map(self) -> bool {
        matches!(self, Self::PlaceMen | Self::Playing | Self::EndIsland)
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient choices made on the place-men screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceMenState {
    /// Chosen tower cell, once the player has picked one.
    pub start: Option<(usize, usize)>,
    /// Population committed to the island.
    pub n_men: i32,
}

/// Live-play bookkeeping owned by the playing screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayingState {
    pub start: (usize, usize),
    /// Set after a non-forced quit request; the next confirm abandons the
    /// island.
    pub quit_requested: bool,
}

/// What happened when an island's play session ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndIslandOutcome {
    pub result: GameResult,
    /// On a quit, the surviving AI faction credited with the win.
    pub credited_ai: Option<PlayerId>,
    /// Island slot marked completed, when the win counted toward the
    /// campaign.
    pub island_completed: Option<usize>,
    /// True when completing the island finished the epoch and the campaign
    /// advanced.
    pub epoch_advanced: bool,
}

/// The active screen plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    ChooseGameType,
    ChooseDifficulty,
    ChoosePlayer,
    ChooseTutorial,
    PlaceMen(PlaceMenState),
    Playing(PlayingState),
    EndIsland(EndIslandOutcome),
    GameComplete,
}

impl Phase {
    #[must_use]
    pub const fn id(&self) -> PhaseId {
        match self {
            Self::ChooseGameType => PhaseId::ChooseGameType,
            Self::ChooseDifficulty => PhaseId::ChooseDifficulty,
            Self::ChoosePlayer => PhaseId::ChoosePlayer,
            Self::ChooseTutorial => PhaseId::ChooseTutorial,
            Self::PlaceMen(_) => PhaseId::PlaceMen,
            Self::Playing(_) => PhaseId::Playing,
            Self::EndIsland(_) => PhaseId::EndIsland,
            Self::GameComplete => PhaseId::GameComplete,
        }
    }

    /// Drop transient per-screen choices, e.g. when the bound island
    /// changes underneath the screen.
    pub fn reset(&mut self) {
        match self {
            Self::PlaceMen(state) => *state = PlaceMenState::default(),
            Self::Playing(state) => state.quit_requested = false,
            _ => {}
        }
    }
}

/// Deferred transition scheduled behind a screen fade. Replaces raw
/// callbacks: the update step consumes the value once its due time passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    StartIsland,
    EndIsland,
    ReturnToChooseIsland,
    StartNewGame,
}

/// A pending action and the real-time instant it becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledAction {
    pub at_real_time: i32,
    pub action: PendingAction,
}
