//! Player aggregates and the fixed-capacity faction roster.

use serde::{Deserialize, Serialize};

use crate::constants::N_PLAYERS;

/// Index into the faction roster.
pub type PlayerId = usize;

/// Returns true for indices that fit the roster.
#[must_use]
pub const fn valid_player(player: PlayerId) -> bool {
    player < N_PLAYERS
}

/// Per-faction bookkeeping carried across one island's play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    id: PlayerId,
    alive: bool,
    /// Population committed to the current island at place-men time.
    n_men_for_this_island: i32,
    n_births: i32,
    n_deaths: i32,
    n_suspended: i32,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId) -> Self {
        assert!(valid_player(id));
        Self {
            id,
            alive: true,
            n_men_for_this_island: 0,
            n_births: 0,
            n_deaths: 0,
            n_suspended: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    #[must_use]
    pub const fn is_dead(&self) -> bool {
        !self.alive
    }

    pub fn set_dead(&mut self) {
        self.alive = false;
    }

    #[must_use]
    pub const fn n_men_for_this_island(&self) -> i32 {
        self.n_men_for_this_island
    }

    pub fn set_n_men_for_this_island(&mut self, n_men: i32) {
        assert!(n_men >= 0);
        self.n_men_for_this_island = n_men;
    }

    #[must_use]
    pub const fn n_births(&self) -> i32 {
        self.n_births
    }

    pub fn add_birth(&mut self) {
        self.n_births += 1;
    }

    #[must_use]
    pub const fn n_deaths(&self) -> i32 {
        self.n_deaths
    }

    pub fn set_n_deaths(&mut self, n_deaths: i32) {
        self.n_deaths = n_deaths;
    }

    pub fn add_n_deaths(&mut self, delta: i32) {
        self.n_deaths += delta;
    }

    #[must_use]
    pub const fn n_suspended(&self) -> i32 {
        self.n_suspended
    }

    pub fn set_n_suspended(&mut self, n_suspended: i32) {
        assert!(n_suspended >= 0);
        self.n_suspended = n_suspended;
    }

    pub fn add_n_suspended(&mut self, delta: i32) {
        self.n_suspended += delta;
        assert!(self.n_suspended >= 0);
    }

    /// Reset the per-island counters when a fresh island begins.
    pub fn reset_island_counters(&mut self) {
        self.alive = true;
        self.n_births = 0;
        self.n_deaths = 0;
        self.n_suspended = 0;
    }
}

/// Fixed roster of faction slots; unoccupied slots hold `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRoster {
    slots: [Option<Player>; N_PLAYERS],
}

impl PlayerRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the roster for an island: the human slot (when not running a
    /// demo) plus `n_opponents` AI factions in the remaining slots.
    pub fn setup(&mut self, human: Option<PlayerId>, n_opponents: usize) {
        let n_factions = n_opponents + usize::from(human.is_some());
        assert!(n_factions <= N_PLAYERS);
        self.slots = Default::default();
        if let Some(human) = human {
            assert!(valid_player(human));
            self.slots[human] = Some(Player::new(human));
        }
        let mut remaining = n_opponents;
        for slot in 0..N_PLAYERS {
            if remaining == 0 {
                break;
            }
            if Some(slot) != human && self.slots[slot].is_none() {
                self.slots[slot] = Some(Player::new(slot));
                remaining -= 1;
            }
        }
        assert!(remaining == 0, "opponent count exceeds roster capacity");
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    #[must_use]
    pub fn get(&self, player: PlayerId) -> Option<&Player> {
        assert!(valid_player(player));
        self.slots[player].as_ref()
    }

    #[must_use]
    pub fn get_mut(&mut self, player: PlayerId) -> Option<&mut Player> {
        assert!(valid_player(player));
        self.slots[player].as_mut()
    }

    pub fn put(&mut self, player: Player) {
        let id = player.id();
        self.slots[id] = Some(player);
    }

    /// Occupied slots in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    #[must_use]
    pub fn slot_states(&self) -> [Option<Player>; N_PLAYERS] {
        self.slots.clone()
    }

    pub fn restore(&mut self, slots: [Option<Player>; N_PLAYERS]) {
        self.slots = slots;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_places_human_and_opponents() {
        let mut roster = PlayerRoster::new();
        roster.setup(Some(2), 2);
        assert!(roster.get(2).is_some());
        assert_eq!(roster.iter().count(), 3);
        assert!(roster.iter().all(|p| !p.is_dead()));
    }

    #[test]
    fn demo_roster_is_all_ai() {
        let mut roster = PlayerRoster::new();
        roster.setup(None, 4);
        assert_eq!(roster.iter().count(), 4);
    }
}
