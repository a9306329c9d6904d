//! A single grid cell: the unit of ownership, population and garrisoned men.
//!
//! The detailed economy inside a sector (mining, invention trees, building
//! construction) lives behind the [`crate::campaign::IslandSim`] seam; this
//! type carries only the state the campaign core queries and mutates.

use serde::{Deserialize, Serialize};

use crate::constants::{MAP_HEIGHT, MAP_WIDTH, N_EPOCHS, N_PLAYERS};
use crate::player::PlayerId;

/// One occupiable cell of an island grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    x: u8,
    y: u8,
    epoch: usize,
    owner: Option<PlayerId>,
    population: i32,
    /// Men garrisoned here per roster slot; any slot other than the owner
    /// being non-zero means an invading army is present.
    armies: [i32; N_PLAYERS],
    nuked: bool,
    /// Set when the owner withdrew the population into the tower at
    /// end-of-island; suspended men rejoin the reserve pool on a win.
    shutdown: bool,
}

impl Sector {
    #[must_use]
    pub fn new(epoch: usize, x: usize, y: usize) -> Self {
        assert!(epoch < N_EPOCHS);
        assert!(x < MAP_WIDTH && y < MAP_HEIGHT);
        Self {
            x: x as u8,
            y: y as u8,
            epoch,
            owner: None,
            population: 0,
            armies: [0; N_PLAYERS],
            nuked: false,
            shutdown: false,
        }
    }

    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (usize::from(self.x), usize::from(self.y))
    }

    #[must_use]
    pub const fn epoch(&self) -> usize {
        self.epoch
    }

    #[must_use]
    pub const fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<PlayerId>) {
        if let Some(player) = owner {
            assert!(player < N_PLAYERS);
        }
        self.owner = owner;
    }

    #[must_use]
    pub const fn population(&self) -> i32 {
        self.population
    }

    pub fn set_population(&mut self, population: i32) {
        assert!(population >= 0);
        self.population = population;
    }

    pub fn add_population(&mut self, delta: i32) {
        self.population = (self.population + delta).max(0);
    }

    /// Men garrisoned here for the given roster slot.
    #[must_use]
    pub fn army(&self, player: PlayerId) -> i32 {
        assert!(player < N_PLAYERS);
        self.armies[player]
    }

    pub fn set_army(&mut self, player: PlayerId, men: i32) {
        assert!(player < N_PLAYERS);
        assert!(men >= 0);
        self.armies[player] = men;
    }

    pub fn add_army(&mut self, player: PlayerId, delta: i32) {
        assert!(player < N_PLAYERS);
        self.armies[player] = (self.armies[player] + delta).max(0);
    }

    /// True when any other faction has men garrisoned here.
    #[must_use]
    pub fn enemies_present(&self, player: PlayerId) -> bool {
        assert!(player < N_PLAYERS);
        self.armies
            .iter()
            .enumerate()
            .any(|(slot, men)| slot != player && *men > 0)
    }

    #[must_use]
    pub const fn is_nuked(&self) -> bool {
        self.nuked
    }

    pub fn set_nuked(&mut self) {
        self.nuked = true;
    }

    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn set_shutdown(&mut self, shutdown: bool) {
        self.shutdown = shutdown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enemies_present_ignores_own_army() {
        let mut sector = Sector::new(0, 3, 4);
        sector.set_owner(Some(1));
        sector.set_army(1, 40);
        assert!(!sector.enemies_present(1));
        sector.set_army(2, 1);
        assert!(sector.enemies_present(1));
        assert!(sector.enemies_present(0));
    }

    #[test]
    fn population_never_goes_negative() {
        let mut sector = Sector::new(2, 0, 0);
        sector.set_population(5);
        sector.add_population(-9);
        assert_eq!(sector.population(), 0);
    }
}
