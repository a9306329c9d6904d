//! Tidehold Campaign Engine
//!
//! Platform-agnostic core for the Tidehold island-conquest strategy game:
//! the campaign state machine, island grid and reachability model, the
//! deterministic simulated clock, and the persistence layer (slot-based
//! binary quick-saves plus the crash-safe structured autosave). Rendering,
//! audio and input backends live elsewhere and talk to this crate through
//! the controller's capability surface.

pub mod autosave;
pub mod campaign;
pub mod clock;
pub mod constants;
pub mod map;
pub mod mapfile;
pub mod numbers;
pub mod phase;
pub mod player;
pub mod save;
pub mod sector;

// Re-export commonly used types
pub use autosave::{LoadStateError, LoadStateOutcome};
pub use campaign::{
    DEMO_AI_MEN, Difficulty, FADE_DURATION_MS, Game, GameMode, GameResult, GameType, IslandSim,
    NullSim, StartupConfig, bootstrap, island_seed,
};
pub use clock::GameClock;
pub use map::{CellGrid, Map, MapColour};
pub use mapfile::{MapCatalog, MapFileError, parse_map_source};
pub use phase::{
    EndIslandOutcome, PendingAction, Phase, PhaseId, PlaceMenState, PlayingState, ScheduledAction,
};
pub use player::{Player, PlayerId, PlayerRoster, valid_player};
pub use save::{SaveError, SaveSummary};
pub use sector::Sector;
