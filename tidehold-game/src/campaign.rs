//! The campaign controller: epoch/island progression, the screen state
//! machine, the simulated clock, and the seams to the sector economy.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use hmac::{Hmac, Mac};
use log::info;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use smallvec::SmallVec;

use crate::clock::GameClock;
use crate::constants::{
    END_EPOCH, EPOCH_DATES, MAP_HEIGHT, MAP_WIDTH, MAX_ISLANDS_PER_EPOCH, N_EPOCHS, N_PLAYERS,
    SINGLE_ISLAND_MEN,
};
use crate::map::Map;
use crate::mapfile::MapCatalog;
use crate::phase::{
    EndIslandOutcome, PendingAction, Phase, PhaseId, PlaceMenState, PlayingState, ScheduledAction,
};
use crate::player::{Player, PlayerId, PlayerRoster, valid_player};

/// Milliseconds a non-instant screen fade takes before its continuation
/// becomes due.
pub const FADE_DURATION_MS: i32 = 600;

/// Population committed per AI faction when no human commitment exists to
/// mirror (demo campaigns).
pub const DEMO_AI_MEN: i32 = 100;

/// Campaign difficulty. Governs the per-epoch reserve allotment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
    Ultra,
}

impl Difficulty {
    /// Reserve men granted at the start of each campaign epoch.
    #[must_use]
    pub const fn men_per_epoch(self) -> i32 {
        match self {
            Self::Easy => 150,
            Self::Medium => 120,
            Self::Hard => 100,
            Self::Ultra => 75,
        }
    }

    #[must_use]
    pub const fn as_index(self) -> i32 {
        match self {
            Self::Easy => 0,
            Self::Medium => 1,
            Self::Hard => 2,
            Self::Ultra => 3,
        }
    }

    #[must_use]
    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Easy),
            1 => Some(Self::Medium),
            2 => Some(Self::Hard),
            3 => Some(Self::Ultra),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Ultra => "ultra",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            "ultra" => Ok(Self::Ultra),
            _ => Err(()),
        }
    }
}

/// How the campaign traverses its islands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Any single island, replayable in any order.
    #[default]
    SingleIsland,
    /// Campaign mode: every island in an epoch must be completed before the
    /// next epoch unlocks.
    AllIslands,
    /// Scripted tutorial island.
    Tutorial,
}

impl GameType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleIsland => "single_island",
            Self::AllIslands => "all_islands",
            Self::Tutorial => "tutorial",
        }
    }
}

impl FromStr for GameType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_island" => Ok(Self::SingleIsland),
            "all_islands" => Ok(Self::AllIslands),
            "tutorial" => Ok(Self::Tutorial),
            _ => Err(()),
        }
    }
}

/// Process role for networked sessions. Stored once at startup; the
/// networking layer itself lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    SinglePlayer,
    NetworkHost,
    NetworkClient,
}

/// Verdict of one island's play session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    #[default]
    Undefined,
    Won,
    Lost,
    /// The human player disconnected or abandoned the island.
    Quit,
}

/// Flags read once at process start and stored on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartupConfig {
    pub fullscreen: bool,
    /// UI usable with a single mouse button.
    pub one_mouse_button: bool,
    /// No mouse pointer; touch-style interface.
    pub mobile_ui: bool,
    pub mode: GameMode,
}

/// Narrow seam to the sector economy and combat rules, which live outside
/// this crate. The controller invokes one turn per AI faction per update,
/// sequentially in roster order; each turn completes before the next begins.
pub trait IslandSim {
    fn player_turn(&mut self, player: PlayerId, map: &mut Map, sim_delta_ms: i32);
}

/// Sim that does nothing; useful for menu phases and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSim;

impl IslandSim for NullSim {
    fn player_turn(&mut self, _player: PlayerId, _map: &mut Map, _sim_delta_ms: i32) {}
}

/// Derive the deterministic RNG seed for one island from the campaign seed,
/// domain-separated per (epoch, island).
#[must_use]
pub fn island_seed(campaign_seed: u64, epoch: usize, island: usize) -> u64 {
    let mut mac = Hmac::<Sha256>::new_from_slice(&campaign_seed.to_le_bytes())
        .expect("64-bit seed is valid key");
    mac.update(b"tidehold.island");
    mac.update(&(epoch as u32).to_le_bytes());
    mac.update(&(island as u32).to_le_bytes());
    let digest = mac.finalize().into_bytes();
    u64::from_le_bytes(digest[..8].try_into().expect("digest longer than 8 bytes"))
}

/// Construct a controller with the island catalog loaded from a directory.
///
/// # Errors
///
/// Returns an error when the maps directory is unreadable or yields no
/// islands at all.
pub fn bootstrap(
    config: StartupConfig,
    maps_dir: &Path,
    save_dir: &Path,
    seed: u64,
) -> anyhow::Result<Game> {
    let catalog = MapCatalog::load_dir(maps_dir)
        .with_context(|| format!("loading islands from {}", maps_dir.display()))?;
    anyhow::ensure!(
        catalog.n_islands_total() > 0,
        "no islands found in {}",
        maps_dir.display()
    );
    Ok(Game::new(config, catalog, seed, save_dir))
}

/// The campaign controller. Owns every map, the roster, the clock, and the
/// active screen; there is exactly one per process, threaded explicitly
/// through the code that needs it.
pub struct Game {
    pub(crate) config: StartupConfig,
    pub(crate) catalog: MapCatalog,
    pub(crate) roster: PlayerRoster,
    pub(crate) clock: GameClock,
    pub(crate) phase: Phase,
    pub(crate) pending: Option<ScheduledAction>,
    pub(crate) paused: bool,
    pub(crate) game_type: GameType,
    pub(crate) difficulty: Difficulty,
    /// `None` plays an AI-only demo campaign.
    pub(crate) human_player: Option<PlayerId>,
    pub(crate) start_epoch: usize,
    pub(crate) selected_island: usize,
    /// Epochs whose technology is reachable from the current one.
    pub(crate) n_sub_epochs: usize,
    pub(crate) completed_island: [bool; MAX_ISLANDS_PER_EPOCH],
    /// Reserve pool carried between islands.
    pub(crate) n_men_store: i32,
    /// Population suspended by the human player across the campaign.
    pub(crate) n_player_suspended: i32,
    pub(crate) game_result: GameResult,
    pub(crate) seed: u64,
    pub(crate) island_rng: ChaCha20Rng,
    pub(crate) save_dir: PathBuf,
    /// Structural reentrancy guard: saving is refused while a load is in
    /// progress.
    pub(crate) loading: bool,
    pub(crate) tutorial: Option<String>,
}

impl Game {
    #[must_use]
    pub fn new(config: StartupConfig, catalog: MapCatalog, seed: u64, save_dir: &Path) -> Self {
        Self {
            config,
            catalog,
            roster: PlayerRoster::new(),
            clock: GameClock::new(),
            phase: Phase::ChooseGameType,
            pending: None,
            paused: false,
            game_type: GameType::default(),
            difficulty: Difficulty::default(),
            human_player: Some(0),
            start_epoch: 0,
            selected_island: 0,
            n_sub_epochs: 0,
            completed_island: [false; MAX_ISLANDS_PER_EPOCH],
            n_men_store: 0,
            n_player_suspended: 0,
            game_result: GameResult::default(),
            seed,
            island_rng: ChaCha20Rng::seed_from_u64(island_seed(seed, 0, 0)),
            save_dir: save_dir.to_path_buf(),
            loading: false,
            tutorial: None,
        }
    }

    // ---- accessors ------------------------------------------------------

    #[must_use]
    pub const fn config(&self) -> &StartupConfig {
        &self.config
    }

    #[must_use]
    pub const fn phase_id(&self) -> PhaseId {
        self.phase.id()
    }

    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub const fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub const fn clock_mut(&mut self) -> &mut GameClock {
        &mut self.clock
    }

    #[must_use]
    pub const fn roster(&self) -> &PlayerRoster {
        &self.roster
    }

    #[must_use]
    pub const fn game_type(&self) -> GameType {
        self.game_type
    }

    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub const fn human_player(&self) -> Option<PlayerId> {
        self.human_player
    }

    /// True when no human faction is present.
    #[must_use]
    pub const fn is_demo(&self) -> bool {
        self.human_player.is_none()
    }

    #[must_use]
    pub const fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    #[must_use]
    pub const fn selected_island(&self) -> usize {
        self.selected_island
    }

    #[must_use]
    pub const fn n_sub_epochs(&self) -> usize {
        self.n_sub_epochs
    }

    /// Display date of the current epoch (negative values are BCE).
    #[must_use]
    pub const fn epoch_date(&self) -> i32 {
        EPOCH_DATES[self.start_epoch]
    }

    #[must_use]
    pub fn island_completed(&self, island: usize) -> bool {
        assert!(island < MAX_ISLANDS_PER_EPOCH);
        self.completed_island[island]
    }

    #[must_use]
    pub const fn game_result(&self) -> GameResult {
        self.game_result
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub const fn men_store(&self) -> i32 {
        self.n_men_store
    }

    #[must_use]
    pub const fn n_suspended(&self) -> i32 {
        self.n_player_suspended
    }

    /// Reserve men available to commit to the next island. In the final
    /// epoch of a campaign only previously suspended men remain.
    #[must_use]
    pub const fn men_available(&self) -> i32 {
        if self.start_epoch == END_EPOCH && matches!(self.game_type, GameType::AllIslands) {
            self.n_player_suspended
        } else {
            self.n_men_store
        }
    }

    /// Per-epoch reserve allotment for the chosen difficulty. Only
    /// meaningful in campaign mode.
    #[must_use]
    pub fn men_per_epoch(&self) -> i32 {
        assert!(matches!(self.game_type, GameType::AllIslands));
        self.difficulty.men_per_epoch()
    }

    /// The island currently bound to the controller.
    #[must_use]
    pub fn map(&self) -> Option<&Map> {
        self.catalog.map(self.start_epoch, self.selected_island)
    }

    pub fn map_mut(&mut self) -> Option<&mut Map> {
        self.catalog.map_mut(self.start_epoch, self.selected_island)
    }

    fn current_map_mut(&mut self) -> &mut Map {
        self.catalog
            .map_mut(self.start_epoch, self.selected_island)
            .expect("play phase requires a bound map")
    }

    #[must_use]
    pub const fn catalog(&self) -> &MapCatalog {
        &self.catalog
    }

    // ---- menu flow ------------------------------------------------------

    /// Record the chosen game type and advance past the first menu screen.
    pub fn choose_game_type(&mut self, game_type: GameType) {
        assert!(self.phase_id() == PhaseId::ChooseGameType);
        self.game_type = game_type;
        self.phase = match game_type {
            GameType::Tutorial => Phase::ChooseTutorial,
            _ => Phase::ChooseDifficulty,
        };
    }

    pub fn choose_difficulty(&mut self, difficulty: Difficulty) {
        assert!(self.phase_id() == PhaseId::ChooseDifficulty);
        self.difficulty = difficulty;
        self.phase = Phase::ChoosePlayer;
    }

    /// Pick the human faction slot, or `None` for an AI-only demo, then
    /// start a fresh campaign on the place-men screen.
    pub fn choose_player(&mut self, player: Option<PlayerId>) {
        assert!(self.phase_id() == PhaseId::ChoosePlayer);
        if let Some(player) = player {
            assert!(valid_player(player));
        }
        self.human_player = player;
        self.phase = Phase::PlaceMen(PlaceMenState::default());
        self.new_game();
    }

    /// Pick a tutorial script and start it.
    pub fn choose_tutorial(&mut self, id: &str) {
        assert!(self.phase_id() == PhaseId::ChooseTutorial);
        assert!(self.tutorial.is_none());
        self.tutorial = Some(id.to_string());
        self.phase = Phase::PlaceMen(PlaceMenState::default());
        self.new_game();
    }

    // ---- epoch and island progression -----------------------------------

    fn updated_epoch(&mut self) {
        assert!(self.start_epoch < N_EPOCHS);
        self.n_sub_epochs = if self.start_epoch == END_EPOCH {
            0
        } else {
            4.min(N_EPOCHS - self.start_epoch)
        };
    }

    fn reseed_island_rng(&mut self) {
        self.island_rng = ChaCha20Rng::seed_from_u64(island_seed(
            self.seed,
            self.start_epoch,
            self.selected_island,
        ));
    }

    /// Bind an explicit (epoch, island) position, e.g. when restoring an
    /// autosave.
    pub(crate) fn set_current_island(&mut self, epoch: usize, island: usize) {
        assert!(epoch < N_EPOCHS && island < MAX_ISLANDS_PER_EPOCH);
        self.start_epoch = epoch;
        self.selected_island = island;
        self.updated_epoch();
        self.reseed_island_rng();
        assert!(self.map().is_some(), "no island allocated at position");
    }

    /// Enter an epoch: select its first playable island (skipping completed
    /// ones in campaign mode) and reset the active screen.
    ///
    /// # Panics
    ///
    /// In campaign mode, panics if every island of the epoch is already
    /// completed; callers must advance the epoch instead.
    pub fn set_epoch(&mut self, epoch: usize) {
        info!("set epoch {epoch}");
        assert!(epoch < N_EPOCHS);
        self.start_epoch = epoch;
        self.updated_epoch();
        self.selected_island = 0;

        if self.game_type == GameType::AllIslands {
            while self.completed_island[self.selected_island] {
                self.selected_island += 1;
                let exhausted = self.selected_island == MAX_ISLANDS_PER_EPOCH
                    || self
                        .catalog
                        .map(self.start_epoch, self.selected_island)
                        .is_none();
                assert!(
                    !exhausted,
                    "epoch {epoch} has no uncompleted island to select"
                );
            }
        }

        assert!(self.map().is_some(), "epoch {epoch} has no islands");
        self.reseed_island_rng();
        self.phase.reset();
    }

    /// Advance the island selection, wrapping at the epoch's island count.
    /// Campaign mode skips islands already completed.
    pub fn next_island(&mut self) {
        let advance = |game: &mut Self| {
            game.selected_island += 1;
            if game.selected_island == MAX_ISLANDS_PER_EPOCH
                || game
                    .catalog
                    .map(game.start_epoch, game.selected_island)
                    .is_none()
            {
                game.selected_island = 0;
            }
        };
        match self.game_type {
            GameType::AllIslands => {
                loop {
                    advance(self);
                    if !self.completed_island[self.selected_island] {
                        break;
                    }
                }
            }
            _ => advance(self),
        }
        info!("next island: {}", self.selected_island);
        assert!(self.map().is_some());
        self.reseed_island_rng();
        self.phase.reset();
    }

    /// Advance to the next epoch, clearing its completion flags. Wrapping
    /// past the final epoch is only legal outside campaign mode.
    pub fn next_epoch(&mut self) {
        info!("next epoch");
        self.start_epoch += 1;
        if self.start_epoch == N_EPOCHS {
            assert!(self.game_type == GameType::SingleIsland);
            self.start_epoch = 0;
        }
        self.completed_island = [false; MAX_ISLANDS_PER_EPOCH];
        self.set_epoch(self.start_epoch);
    }

    /// Begin a fresh campaign from the place-men screen: reset the reserve
    /// pool, completion flags and suspension count, and enter epoch 0.
    pub fn new_game(&mut self) {
        info!("new game");
        assert!(self.phase_id() == PhaseId::PlaceMen);
        self.n_men_store = if self.game_type == GameType::AllIslands {
            self.men_per_epoch()
        } else {
            SINGLE_ISLAND_MEN
        };
        self.completed_island = [false; MAX_ISLANDS_PER_EPOCH];
        self.n_player_suspended = 0;
        self.roster.clear();
        self.set_epoch(0);
    }

    // ---- island lifecycle -----------------------------------------------

    /// Record the human player's tower cell and committed men. Returns false
    /// (a gameplay outcome, not a fault) when the cell is off-island or the
    /// commitment exceeds the available reserve.
    pub fn choose_start(&mut self, x: usize, y: usize, n_men: i32) -> bool {
        assert!(self.phase_id() == PhaseId::PlaceMen);
        if n_men < 0 || n_men > self.men_available() {
            return false;
        }
        let Some(map) = self.map() else {
            return false;
        };
        if !map.is_sector_at(x, y) {
            return false;
        }
        if let Phase::PlaceMen(state) = &mut self.phase {
            state.start = Some((x, y));
            state.n_men = n_men;
        }
        true
    }

    /// Confirm the placement: fades out, then starts the island. Demo
    /// campaigns have no tower to place and may start directly.
    pub fn place_tower(&mut self) {
        assert!(self.phase_id() == PhaseId::PlaceMen);
        let placed = matches!(&self.phase, Phase::PlaceMen(state) if state.start.is_some());
        if (placed || self.is_demo()) && self.pending.is_none() {
            self.fade_screen(false, 0, Some(PendingAction::StartIsland));
        }
    }

    /// Schedule `action` to run once the fade completes. An instant fade
    /// makes the action due immediately.
    pub fn fade_screen(&mut self, instant: bool, delay_ms: i32, action: Option<PendingAction>) {
        let Some(action) = action else { return };
        assert!(self.pending.is_none(), "transition already pending");
        let fade = if instant { 0 } else { FADE_DURATION_MS };
        self.pending = Some(ScheduledAction {
            at_real_time: self.clock.real_time() + delay_ms + fade,
            action,
        });
    }

    fn start_island(&mut self) {
        assert!(self.phase_id() == PhaseId::PlaceMen);
        let Phase::PlaceMen(state) = &self.phase else {
            unreachable!()
        };
        let (start, human_men) = (state.start, state.n_men);
        let map_squares = self.map().map_or(0, Map::n_squares);
        let n_opponents = self.map().map_or(0, Map::n_opponents);
        assert!(
            map_squares > n_opponents + usize::from(self.human_player.is_some()),
            "opponent count does not fit the island"
        );

        self.roster.setup(self.human_player, n_opponents);
        for player in self.roster.iter_mut() {
            player.reset_island_counters();
        }

        let epoch = self.start_epoch;
        self.current_map_mut().create_sectors(epoch);

        if let Some(human) = self.human_player {
            let (x, y) = start.expect("placement confirmed without a start cell");
            let map = self.current_map_mut();
            let sector = map.sector_mut(x, y).expect("start cell has no sector");
            sector.set_owner(Some(human));
            sector.set_population(human_men);
            self.roster
                .get_mut(human)
                .expect("human faction missing from roster")
                .set_n_men_for_this_island(human_men);
            self.phase = Phase::Playing(PlayingState {
                start: (x, y),
                quit_requested: false,
            });
        } else {
            self.phase = Phase::Playing(PlayingState::default());
        }

        // AI towers mirror the human commitment so the island stays balanced.
        let ai_men = if self.human_player.is_some() && human_men > 0 {
            human_men
        } else {
            DEMO_AI_MEN
        };
        let ai_ids: SmallVec<[PlayerId; N_PLAYERS]> = self
            .roster
            .iter()
            .map(Player::id)
            .filter(|id| Some(*id) != self.human_player)
            .collect();
        for id in ai_ids {
            loop {
                let (x, y) = {
                    let map = self
                        .catalog
                        .map(self.start_epoch, self.selected_island)
                        .expect("play phase requires a bound map");
                    map.find_random_sector(&mut self.island_rng)
                };
                let map = self.current_map_mut();
                let sector = map.sector_mut(x, y).expect("occupiable cell has a sector");
                if sector.owner().is_none() {
                    sector.set_owner(Some(id));
                    sector.set_population(ai_men);
                    break;
                }
            }
            self.roster
                .get_mut(id)
                .expect("AI faction missing from roster")
                .set_n_men_for_this_island(ai_men);
        }

        self.game_result = GameResult::Undefined;
        info!(
            "island started: epoch {} island {}",
            self.start_epoch, self.selected_island
        );
    }

    /// Declare the island's verdict. The end-of-island transition follows
    /// behind a fade.
    pub fn declare_result(&mut self, result: GameResult) {
        assert!(self.phase_id() == PhaseId::Playing);
        assert!(result != GameResult::Undefined);
        self.game_result = result;
        if self.pending.is_none() {
            self.fade_screen(false, 0, Some(PendingAction::EndIsland));
        }
    }

    fn end_island(&mut self) {
        assert!(self.phase_id() == PhaseId::Playing);
        assert!(self.game_result != GameResult::Undefined);
        let result = self.game_result;

        let mut roster = std::mem::take(&mut self.roster);
        {
            // Stats must run before the sectors are destroyed; the bound map
            // may switch islands before the end screen is dismissed.
            let map = self.current_map_mut();
            map.calculate_stats(&mut roster, result);
            map.free_sectors();
        }
        self.roster = roster;

        if let Some(human) = self.human_player
            && let Some(player) = self.roster.get(human)
        {
            self.n_player_suspended += player.n_suspended();
        }

        let mut outcome = EndIslandOutcome {
            result,
            ..EndIslandOutcome::default()
        };
        self.phase = Phase::EndIsland(EndIslandOutcome::default());

        if result == GameResult::Quit {
            outcome.credited_ai = self.pick_surviving_ai();
        }

        if result == GameResult::Won && self.game_type == GameType::AllIslands {
            let human = self.human_player.expect("campaign mode requires a human");
            let committed = self
                .roster
                .get(human)
                .map_or(0, Player::n_men_for_this_island);
            self.n_men_store -= committed;

            if self.start_epoch != END_EPOCH {
                assert!(
                    !self.completed_island[self.selected_island],
                    "island completed twice"
                );
                self.completed_island[self.selected_island] = true;
                outcome.island_completed = Some(self.selected_island);

                let epoch_done = (0..self.catalog.n_islands(self.start_epoch))
                    .all(|i| self.completed_island[i]);
                info!("completed epoch? {epoch_done}");
                if epoch_done {
                    self.n_men_store += self.men_per_epoch();
                    self.next_epoch();
                    outcome.epoch_advanced = true;
                } else {
                    self.next_island();
                }
            }
        }

        self.phase = Phase::EndIsland(outcome);
    }

    /// Random surviving non-human faction, credited with the win after a
    /// quit.
    fn pick_surviving_ai(&mut self) -> Option<PlayerId> {
        let candidates: SmallVec<[PlayerId; N_PLAYERS]> = self
            .roster
            .iter()
            .filter(|p| !p.is_dead() && Some(p.id()) != self.human_player)
            .map(Player::id)
            .collect();
        if candidates.is_empty() {
            None
        } else {
            let index = self.island_rng.gen_range(0..candidates.len());
            Some(candidates[index])
        }
    }

    /// Dismiss the end-of-island screen.
    pub fn return_to_choose_island(&mut self) {
        assert!(self.phase_id() == PhaseId::EndIsland);
        if self.game_type == GameType::Tutorial {
            self.tutorial = None;
            self.phase = Phase::ChooseGameType;
        } else if self.game_result == GameResult::Won
            && self.game_type == GameType::AllIslands
            && self.start_epoch == END_EPOCH
        {
            self.phase = Phase::GameComplete;
        } else {
            self.phase = Phase::PlaceMen(PlaceMenState::default());
        }

        if let Some(human) = self.human_player
            && let Some(player) = self.roster.get_mut(human)
        {
            player.set_n_men_for_this_island(0);
        }
    }

    /// Begin a fresh campaign from the game-complete screen.
    pub fn start_new_game(&mut self) {
        assert!(self.phase_id() == PhaseId::GameComplete);
        self.phase = Phase::PlaceMen(PlaceMenState::default());
        self.new_game();
    }

    // ---- input and update -----------------------------------------------

    /// Ask to abandon the current screen. A forced quit during play ends the
    /// island immediately; otherwise the screen arms a confirmation.
    pub fn request_quit(&mut self, force: bool) {
        if self.pending.is_some() || self.phase_id() != PhaseId::Playing {
            return;
        }
        if force {
            self.declare_result(GameResult::Quit);
        } else if let Phase::Playing(state) = &mut self.phase {
            state.quit_requested = true;
        }
    }

    /// Confirm a pending request (return key).
    pub fn request_confirm(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let armed = matches!(&self.phase, Phase::Playing(state) if state.quit_requested);
        if armed {
            self.declare_result(GameResult::Quit);
        }
    }

    /// Forward a pointer click to the active screen. Coordinates are grid
    /// cells; pixel-to-cell mapping belongs to the frontend.
    pub fn mouse_click(&mut self, x: usize, y: usize, left: bool, _right: bool, is_click: bool) {
        if !is_click || !left || self.pending.is_some() {
            return;
        }
        match self.phase_id() {
            PhaseId::PlaceMen => {
                if x < MAP_WIDTH && y < MAP_HEIGHT {
                    let men = self.men_available();
                    if self.choose_start(x, y, men) {
                        self.place_tower();
                    }
                }
            }
            PhaseId::EndIsland => {
                self.fade_screen(false, 0, Some(PendingAction::ReturnToChooseIsland));
            }
            PhaseId::GameComplete => {
                self.fade_screen(false, 0, Some(PendingAction::StartNewGame));
            }
            _ => {}
        }
    }

    /// Toggle the pause state; only meaningful during play.
    pub fn toggle_pause(&mut self) {
        if self.phase_id() == PhaseId::Playing {
            self.paused = !self.paused;
        }
    }

    /// One cooperative update step, driven by the platform main loop.
    ///
    /// Advances the clock (unless paused), consumes a due pending
    /// transition, and runs each AI faction's turn sequentially in roster
    /// order through the [`IslandSim`] seam.
    pub fn update(&mut self, delta_ms: i32, sim: &mut dyn IslandSim) {
        if !self.paused {
            self.clock.update_time(delta_ms);
        }

        if let Some(scheduled) = self.pending
            && scheduled.at_real_time <= self.clock.real_time()
        {
            self.pending = None;
            match scheduled.action {
                PendingAction::StartIsland => self.start_island(),
                PendingAction::EndIsland => self.end_island(),
                PendingAction::ReturnToChooseIsland => self.return_to_choose_island(),
                PendingAction::StartNewGame => self.start_new_game(),
            }
        }

        if self.phase_id() == PhaseId::Playing && !self.paused {
            let sim_delta = self.clock.loop_time();
            if sim_delta > 0 {
                let ids: SmallVec<[PlayerId; N_PLAYERS]> = self
                    .roster
                    .iter()
                    .filter(|p| !p.is_dead() && Some(p.id()) != self.human_player)
                    .map(Player::id)
                    .collect();
                for id in ids {
                    let map = self
                        .catalog
                        .map_mut(self.start_epoch, self.selected_island)
                        .expect("play phase requires a bound map");
                    sim.player_turn(id, map, sim_delta);
                }
            }
        }
    }

    /// Directory holding quick-saves and the autosave rotation.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Path helper for the persistence layer.
    #[must_use]
    pub(crate) fn save_path(&self, name: &str) -> PathBuf {
        self.save_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapColour;

    fn three_island_catalog() -> MapCatalog {
        let mut maps = Vec::new();
        for epoch in 0..N_EPOCHS {
            for i in 0..MAX_ISLANDS_PER_EPOCH {
                let mut map = Map::new(MapColour::Green, 1, &format!("isle{epoch}{i}"));
                for x in 0..6 {
                    map.new_square_at(x, 3);
                }
                maps.push((epoch, map));
            }
        }
        MapCatalog::from_maps(maps).unwrap()
    }

    fn fresh_game() -> Game {
        Game::new(
            StartupConfig::default(),
            three_island_catalog(),
            0x7457,
            Path::new("/tmp/tidehold-tests"),
        )
    }

    #[test]
    fn menu_flow_reaches_place_men() {
        let mut game = fresh_game();
        game.choose_game_type(GameType::AllIslands);
        game.choose_difficulty(Difficulty::Medium);
        game.choose_player(Some(1));
        assert_eq!(game.phase_id(), PhaseId::PlaceMen);
        assert_eq!(game.men_store(), 120);
        assert_eq!(game.start_epoch(), 0);
    }

    #[test]
    fn set_epoch_skips_completed_islands() {
        let mut game = fresh_game();
        game.choose_game_type(GameType::AllIslands);
        game.choose_difficulty(Difficulty::Easy);
        game.choose_player(Some(0));
        game.completed_island[0] = true;
        game.set_epoch(0);
        assert_eq!(game.selected_island(), 1);
    }

    #[test]
    #[should_panic(expected = "no uncompleted island")]
    fn set_epoch_with_everything_completed_asserts() {
        let mut game = fresh_game();
        game.choose_game_type(GameType::AllIslands);
        game.choose_difficulty(Difficulty::Easy);
        game.choose_player(Some(0));
        game.completed_island = [true; MAX_ISLANDS_PER_EPOCH];
        game.set_epoch(0);
    }

    #[test]
    fn next_island_wraps_in_single_island_mode() {
        let mut game = fresh_game();
        game.choose_game_type(GameType::SingleIsland);
        game.choose_difficulty(Difficulty::Easy);
        game.choose_player(Some(0));
        for _ in 0..MAX_ISLANDS_PER_EPOCH {
            game.next_island();
        }
        assert_eq!(game.selected_island(), 0);
    }

    #[test]
    fn island_seed_is_domain_separated() {
        let a = island_seed(42, 0, 0);
        let b = island_seed(42, 0, 1);
        let c = island_seed(42, 1, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, island_seed(42, 0, 0));
    }

    #[test]
    fn fade_defers_the_island_start() {
        let mut game = fresh_game();
        game.choose_game_type(GameType::AllIslands);
        game.choose_difficulty(Difficulty::Easy);
        game.choose_player(Some(0));
        assert!(game.choose_start(2, 3, 50));
        game.place_tower();
        assert_eq!(game.phase_id(), PhaseId::PlaceMen);
        // Deltas clamp at 200 ms per update; a fade takes several frames.
        for _ in 0..4 {
            game.update(200, &mut NullSim);
        }
        assert_eq!(game.phase_id(), PhaseId::Playing);
        let map = game.map().unwrap();
        assert!(map.sectors_created());
        assert_eq!(map.sector(2, 3).unwrap().owner(), Some(0));
    }
}
