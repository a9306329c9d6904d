//! Island grid model: occupiable cells, sector lifecycle, reachability and
//! end-of-island statistics.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::campaign::GameResult;
use crate::constants::{MAP_HEIGHT, MAP_WIDTH, N_EPOCHS, N_PLAYERS};
use crate::player::{PlayerId, PlayerRoster};
use crate::sector::Sector;

/// Boolean grid matching the island dimensions, indexed `[y][x]`.
pub type CellGrid = [[bool; MAP_WIDTH]; MAP_HEIGHT];

/// Terrain classification of an island; affects rendering remap only, never
/// simulation logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapColour {
    Orange,
    Green,
    Brown,
    White,
    DBrown,
    DGreen,
    Grey,
}

impl MapColour {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orange => "ORANGE",
            Self::Green => "GREEN",
            Self::Brown => "BROWN",
            Self::White => "WHITE",
            Self::DBrown => "DBROWN",
            Self::DGreen => "DGREEN",
            Self::Grey => "GREY",
        }
    }
}

impl fmt::Display for MapColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapColour {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORANGE" => Ok(Self::Orange),
            "GREEN" => Ok(Self::Green),
            "BROWN" => Ok(Self::Brown),
            "WHITE" => Ok(Self::White),
            "DBROWN" => Ok(Self::DBrown),
            "DGREEN" => Ok(Self::DGreen),
            "GREY" => Ok(Self::Grey),
            _ => Err(()),
        }
    }
}

/// One island: a fixed grid where each cell is absent, present, or backed by
/// a live [`Sector`] while the island is being played.
#[derive(Debug, Clone)]
pub struct Map {
    colour: MapColour,
    n_opponents: usize,
    name: String,
    occupiable: CellGrid,
    sectors: [[Option<Sector>; MAP_WIDTH]; MAP_HEIGHT],
}

impl Map {
    #[must_use]
    pub fn new(colour: MapColour, n_opponents: usize, name: &str) -> Self {
        assert!(n_opponents < N_PLAYERS);
        Self {
            colour,
            n_opponents,
            name: name.to_string(),
            occupiable: [[false; MAP_WIDTH]; MAP_HEIGHT],
            sectors: std::array::from_fn(|_| std::array::from_fn(|_| None)),
        }
    }

    #[must_use]
    pub const fn colour(&self) -> MapColour {
        self.colour
    }

    #[must_use]
    pub const fn n_opponents(&self) -> usize {
        self.n_opponents
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the cell is part of the island.
    #[must_use]
    pub fn is_sector_at(&self, x: usize, y: usize) -> bool {
        assert!(x < MAP_WIDTH && y < MAP_HEIGHT);
        self.occupiable[y][x]
    }

    /// Mark a cell occupiable. Idempotent.
    pub fn new_square_at(&mut self, x: usize, y: usize) {
        assert!(x < MAP_WIDTH && y < MAP_HEIGHT);
        self.occupiable[y][x] = true;
    }

    /// Instantiate a live sector for every occupiable cell. Must be called
    /// exactly once per island activation and paired with [`free_sectors`].
    ///
    /// [`free_sectors`]: Map::free_sectors
    pub fn create_sectors(&mut self, epoch: usize) {
        assert!(epoch < N_EPOCHS);
        for y in 0..MAP_HEIGHT {
            for x in 0..MAP_WIDTH {
                if self.occupiable[y][x] {
                    assert!(self.sectors[y][x].is_none(), "sectors already created");
                    self.sectors[y][x] = Some(Sector::new(epoch, x, y));
                }
            }
        }
    }

    /// Destroy the live sectors, leaving the grid shape intact for reuse.
    pub fn free_sectors(&mut self) {
        for row in &mut self.sectors {
            for cell in row {
                *cell = None;
            }
        }
    }

    /// True while the island has live sectors.
    #[must_use]
    pub fn sectors_created(&self) -> bool {
        self.sectors
            .iter()
            .any(|row| row.iter().any(Option::is_some))
    }

    #[must_use]
    pub fn sector(&self, x: usize, y: usize) -> Option<&Sector> {
        assert!(x < MAP_WIDTH && y < MAP_HEIGHT);
        self.sectors[y][x].as_ref()
    }

    #[must_use]
    pub fn sector_mut(&mut self, x: usize, y: usize) -> Option<&mut Sector> {
        assert!(x < MAP_WIDTH && y < MAP_HEIGHT);
        self.sectors[y][x].as_mut()
    }

    /// Place a restored sector snapshot onto its cell during autosave load.
    pub(crate) fn restore_sector(&mut self, sector: Sector) {
        let (x, y) = sector.position();
        assert!(self.occupiable[y][x]);
        self.sectors[y][x] = Some(sector);
    }

    /// All live sectors in row-major order.
    pub fn sectors(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.iter().flatten().filter_map(Option::as_ref)
    }

    pub fn sectors_mut(&mut self) -> impl Iterator<Item = &mut Sector> {
        self.sectors.iter_mut().flatten().filter_map(Option::as_mut)
    }

    /// Count of occupiable cells; used to validate that opponent counts fit
    /// the island.
    #[must_use]
    pub fn n_squares(&self) -> usize {
        self.occupiable.iter().flatten().filter(|c| **c).count()
    }

    /// Pick a uniformly random occupiable cell.
    #[must_use]
    pub fn find_random_sector<R: Rng>(&self, rng: &mut R) -> (usize, usize) {
        assert!(self.n_squares() > 0);
        loop {
            let x = rng.gen_range(0..MAP_WIDTH);
            let y = rng.gen_range(0..MAP_HEIGHT);
            if self.occupiable[y][x] {
                return (x, y);
            }
        }
    }

    /// Maximal set of cells reachable from `(sx, sy)` by 4-directional
    /// movement for `player`.
    ///
    /// A cell is a valid stepping stone when it is occupiable, not nuked, and
    /// either owned by `player` or unowned with no enemy armies present. The
    /// origin is always reachable regardless of ownership. Expansion is a
    /// fixed-point iteration over the whole grid rather than a queue-based
    /// search; the grid is small and fixed, so the quadratic worst case is
    /// acceptable and the scan order stays deterministic.
    #[must_use]
    pub fn can_move_to(&self, sx: usize, sy: usize, player: PlayerId) -> CellGrid {
        assert!(player < N_PLAYERS);
        assert!(self.is_sector_at(sx, sy));

        let stepping_stone = |x: usize, y: usize| -> bool {
            if !self.occupiable[y][x] {
                return false;
            }
            let sector = self.sectors[y][x]
                .as_ref()
                .expect("occupiable cell without live sector");
            if sector.is_nuked() {
                return false;
            }
            match sector.owner() {
                Some(owner) => owner == player,
                None => !sector.enemies_present(player),
            }
        };

        let mut reach: CellGrid = [[false; MAP_WIDTH]; MAP_HEIGHT];
        reach[sy][sx] = true;
        let origin_nuked = self.sectors[sy][sx]
            .as_ref()
            .is_some_and(Sector::is_nuked);

        let mut changed = true;
        while changed {
            changed = false;
            for y in 0..MAP_HEIGHT {
                for x in 0..MAP_WIDTH {
                    if !reach[y][x] {
                        continue;
                    }
                    // The origin bypasses the ownership test (an army can
                    // always move out of its own cell) but never the nuke
                    // test.
                    if x == sx && y == sy {
                        if origin_nuked {
                            continue;
                        }
                    } else if !stepping_stone(x, y) {
                        continue;
                    }
                    for (dx, dy) in [(0i32, -1i32), (1, 0), (0, 1), (-1, 0)] {
                        let cx = x as i32 + dx;
                        let cy = y as i32 + dy;
                        if cx < 0 || cy < 0 || cx >= MAP_WIDTH as i32 || cy >= MAP_HEIGHT as i32 {
                            continue;
                        }
                        let (cx, cy) = (cx as usize, cy as usize);
                        if !reach[cy][cx] && stepping_stone(cx, cy) {
                            reach[cy][cx] = true;
                            changed = true;
                        }
                    }
                }
            }
        }
        reach
    }

    /// Aggregate end-of-island statistics into the roster.
    ///
    /// Deaths are committed men plus births minus whatever population and
    /// armies remain on the island. On a win, population left in shutdown
    /// sectors is credited as suspended rather than lost.
    pub fn calculate_stats(&self, roster: &mut PlayerRoster, result: GameResult) {
        for player in roster.iter_mut() {
            player.set_n_deaths(player.n_men_for_this_island() + player.n_births());
            player.set_n_suspended(0);
        }
        for sector in self.sectors() {
            if let Some(owner) = sector.owner() {
                if let Some(player) = roster.get_mut(owner) {
                    player.add_n_deaths(-sector.population());
                    if sector.is_shutdown() && result == GameResult::Won {
                        player.add_n_suspended(sector.population());
                    }
                }
            }
            for slot in 0..N_PLAYERS {
                if let Some(player) = roster.get_mut(slot) {
                    player.add_n_deaths(-sector.army(slot));
                }
            }
        }
        for player in roster.iter() {
            debug_assert!(
                player.n_deaths() >= 0,
                "negative deaths for player {}",
                player.id()
            );
        }
    }

    /// Directional adjacency bitmask used to select the cell's terrain tile:
    /// bit 1 = north neighbour present, 2 = east, 4 = south, 8 = west.
    #[must_use]
    pub fn adjacency_mask(&self, x: usize, y: usize) -> u8 {
        assert!(self.is_sector_at(x, y));
        let mut icon = 0u8;
        if y > 0 && self.occupiable[y - 1][x] {
            icon += 1;
        }
        if x < MAP_WIDTH - 1 && self.occupiable[y][x + 1] {
            icon += 2;
        }
        if y < MAP_HEIGHT - 1 && self.occupiable[y + 1][x] {
            icon += 4;
        }
        if x > 0 && self.occupiable[y][x - 1] {
            icon += 8;
        }
        icon
    }

    /// Diagonal coastline bitmask: bit 1 = north-west corner, 2 = north-east,
    /// 4 = south-west, 8 = south-east. A corner is set when both orthogonal
    /// neighbours are present but the diagonal cell is missing.
    #[must_use]
    pub fn coast_corner_mask(&self, x: usize, y: usize) -> u8 {
        assert!(self.is_sector_at(x, y));
        let at = |x: i32, y: i32| -> bool {
            x >= 0
                && y >= 0
                && x < MAP_WIDTH as i32
                && y < MAP_HEIGHT as i32
                && self.occupiable[y as usize][x as usize]
        };
        let (x, y) = (x as i32, y as i32);
        let mut mask = 0u8;
        if at(x - 1, y) && at(x, y - 1) && !at(x - 1, y - 1) {
            mask |= 1;
        }
        if at(x + 1, y) && at(x, y - 1) && !at(x + 1, y - 1) {
            mask |= 2;
        }
        if at(x - 1, y) && at(x, y + 1) && !at(x - 1, y + 1) {
            mask |= 4;
        }
        if at(x + 1, y) && at(x, y + 1) && !at(x + 1, y + 1) {
            mask |= 8;
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn row_map() -> Map {
        let mut map = Map::new(MapColour::Green, 2, "testrow");
        for x in 2..=4 {
            map.new_square_at(x, 5);
        }
        map
    }

    #[test]
    fn new_square_at_is_idempotent() {
        let mut map = row_map();
        assert_eq!(map.n_squares(), 3);
        map.new_square_at(2, 5);
        assert_eq!(map.n_squares(), 3);
    }

    #[test]
    fn sector_lifecycle_pairs() {
        let mut map = row_map();
        assert!(!map.sectors_created());
        map.create_sectors(0);
        assert!(map.sectors_created());
        assert!(map.sector(2, 5).is_some());
        assert!(map.sector(0, 0).is_none());
        map.free_sectors();
        assert!(!map.sectors_created());
        assert!(map.is_sector_at(2, 5));
    }

    #[test]
    #[should_panic(expected = "sectors already created")]
    fn double_create_sectors_asserts() {
        let mut map = row_map();
        map.create_sectors(0);
        map.create_sectors(0);
    }

    #[test]
    fn adjacency_masks_match_row_shape() {
        let map = row_map();
        assert_eq!(map.adjacency_mask(2, 5), 2);
        assert_eq!(map.adjacency_mask(3, 5), 2 + 8);
        assert_eq!(map.adjacency_mask(4, 5), 8);
    }

    #[test]
    fn coast_corner_detects_missing_diagonal() {
        let mut map = Map::new(MapColour::Grey, 1, "ell");
        map.new_square_at(4, 4);
        map.new_square_at(5, 4);
        map.new_square_at(4, 5);
        // (4,4) has east and south neighbours but (5,5) is water
        assert_eq!(map.coast_corner_mask(4, 4) & 8, 8);
    }

    #[test]
    fn random_sector_lands_on_island() {
        let map = row_map();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..32 {
            let (x, y) = map.find_random_sector(&mut rng);
            assert!(map.is_sector_at(x, y));
        }
    }
}
