//! Island definition files and the campaign map catalog.
//!
//! An island file is line-oriented text: a header line
//! `# <name> <epoch> <n_opponents> <COLOUR>` followed by `SECTOR <x> <y>`
//! lines marking occupiable cells. `ELEMENT` lines are accepted and ignored
//! (their data belongs to the sector economy, outside this crate), and later
//! `#`-prefixed lines are comments.

use std::fs;
use std::path::Path;

use log::{info, warn};
use thiserror::Error;

use crate::constants::{MAP_HEIGHT, MAP_WIDTH, MAX_ISLANDS_PER_EPOCH, N_EPOCHS};
use crate::map::{Map, MapColour};

/// Recoverable island-file parse failures.
#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("expected '#' header line")]
    MissingHeader,
    #[error("header is missing the {0} field")]
    MissingField(&'static str),
    #[error("unknown map colour: {0}")]
    UnknownColour(String),
    #[error("invalid epoch: {0}")]
    InvalidEpoch(String),
    #[error("invalid opponent count: {0}")]
    InvalidOpponents(String),
    #[error("invalid sector coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("unknown directive: {0}")]
    UnknownDirective(String),
    #[error("too many islands for epoch {0}")]
    TooManyIslands(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parse one island definition, returning the epoch it belongs to and the
/// constructed map.
///
/// # Errors
///
/// Returns a [`MapFileError`] describing the first malformed line.
pub fn parse_map_source(source: &str) -> Result<(usize, Map), MapFileError> {
    let mut lines = source.lines();
    let header = lines.next().ok_or(MapFileError::MissingHeader)?;
    let header = header
        .strip_prefix('#')
        .ok_or(MapFileError::MissingHeader)?;

    let mut fields = header.split_whitespace();
    let name = fields.next().ok_or(MapFileError::MissingField("name"))?;
    let epoch_str = fields.next().ok_or(MapFileError::MissingField("epoch"))?;
    let opponents_str = fields
        .next()
        .ok_or(MapFileError::MissingField("n_opponents"))?;
    let colour_str = fields.next().ok_or(MapFileError::MissingField("colour"))?;

    let epoch: usize = epoch_str
        .parse()
        .ok()
        .filter(|e| *e < N_EPOCHS)
        .ok_or_else(|| MapFileError::InvalidEpoch(epoch_str.to_string()))?;
    let n_opponents: usize = opponents_str
        .parse()
        .map_err(|_| MapFileError::InvalidOpponents(opponents_str.to_string()))?;
    let colour: MapColour = colour_str
        .parse()
        .map_err(|()| MapFileError::UnknownColour(colour_str.to_string()))?;

    let mut map = Map::new(colour, n_opponents, name);

    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("SECTOR") => {
                let x = parse_coord(words.next(), MAP_WIDTH)?;
                let y = parse_coord(words.next(), MAP_HEIGHT)?;
                map.new_square_at(x, y);
            }
            Some("ELEMENT") => {}
            Some(word) => return Err(MapFileError::UnknownDirective(word.to_string())),
            None => {}
        }
    }
    Ok((epoch, map))
}

fn parse_coord(word: Option<&str>, limit: usize) -> Result<usize, MapFileError> {
    let word = word.ok_or(MapFileError::MissingField("sector coordinate"))?;
    word.parse()
        .ok()
        .filter(|v| *v < limit)
        .ok_or_else(|| MapFileError::InvalidCoordinate(word.to_string()))
}

/// Every campaign island, organized as an epoch × slot grid. The controller
/// owns one catalog for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MapCatalog {
    maps: [[Option<Map>; MAX_ISLANDS_PER_EPOCH]; N_EPOCHS],
}

impl MapCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every island file in a directory. Files that fail to parse are
    /// logged and skipped rather than failing the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns an error only when the directory itself cannot be read.
    pub fn load_dir(dir: &Path) -> Result<Self, MapFileError> {
        let mut catalog = Self::new();
        let mut entries: Vec<_> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();
        for path in entries {
            match fs::read_to_string(&path) {
                Ok(source) => match parse_map_source(&source) {
                    Ok((epoch, map)) => {
                        if let Err(err) = catalog.insert(epoch, map) {
                            warn!("skipping {}: {err}", path.display());
                        }
                    }
                    Err(err) => warn!("skipping {}: {err}", path.display()),
                },
                Err(err) => warn!("skipping {}: {err}", path.display()),
            }
        }
        catalog.sort_islands();
        info!("loaded {} islands", catalog.n_islands_total());
        Ok(catalog)
    }

    /// Build a catalog directly from parsed maps, preserving insertion order
    /// within each epoch until [`sort_islands`] runs.
    ///
    /// # Errors
    ///
    /// Returns [`MapFileError::TooManyIslands`] when an epoch overflows.
    ///
    /// [`sort_islands`]: MapCatalog::sort_islands
    pub fn from_maps(maps: Vec<(usize, Map)>) -> Result<Self, MapFileError> {
        let mut catalog = Self::new();
        for (epoch, map) in maps {
            catalog.insert(epoch, map)?;
        }
        catalog.sort_islands();
        Ok(catalog)
    }

    fn insert(&mut self, epoch: usize, map: Map) -> Result<(), MapFileError> {
        assert!(epoch < N_EPOCHS);
        let row = &mut self.maps[epoch];
        let slot = row
            .iter()
            .position(Option::is_none)
            .ok_or(MapFileError::TooManyIslands(epoch))?;
        row[slot] = Some(map);
        Ok(())
    }

    /// Order islands within each epoch by name, with the historical quirk
    /// that names beginning with `0` sort after everything else.
    pub fn sort_islands(&mut self) {
        for row in &mut self.maps {
            let mut present: Vec<Map> = row.iter_mut().filter_map(Option::take).collect();
            present.sort_by(|a, b| {
                let a_zero = a.name().starts_with('0');
                let b_zero = b.name().starts_with('0');
                a_zero.cmp(&b_zero).then_with(|| a.name().cmp(b.name()))
            });
            for (slot, map) in present.into_iter().enumerate() {
                row[slot] = Some(map);
            }
        }
    }

    #[must_use]
    pub fn map(&self, epoch: usize, island: usize) -> Option<&Map> {
        assert!(epoch < N_EPOCHS && island < MAX_ISLANDS_PER_EPOCH);
        self.maps[epoch][island].as_ref()
    }

    #[must_use]
    pub fn map_mut(&mut self, epoch: usize, island: usize) -> Option<&mut Map> {
        assert!(epoch < N_EPOCHS && island < MAX_ISLANDS_PER_EPOCH);
        self.maps[epoch][island].as_mut()
    }

    /// Number of islands allocated for an epoch.
    #[must_use]
    pub fn n_islands(&self, epoch: usize) -> usize {
        assert!(epoch < N_EPOCHS);
        self.maps[epoch].iter().filter(|m| m.is_some()).count()
    }

    #[must_use]
    pub fn n_islands_total(&self) -> usize {
        (0..N_EPOCHS).map(|e| self.n_islands(e)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISLAND_SRC: &str = "\
# coral 2 2 GREEN
SECTOR 3 4
SECTOR 4 4
ELEMENT moonlite 3 4 20
# a trailing comment
SECTOR 5 4
";

    #[test]
    fn parses_header_and_sectors() {
        let (epoch, map) = parse_map_source(ISLAND_SRC).unwrap();
        assert_eq!(epoch, 2);
        assert_eq!(map.name(), "coral");
        assert_eq!(map.colour(), MapColour::Green);
        assert_eq!(map.n_opponents(), 2);
        assert_eq!(map.n_squares(), 3);
        assert!(map.is_sector_at(5, 4));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            parse_map_source("no header"),
            Err(MapFileError::MissingHeader)
        ));
        assert!(matches!(
            parse_map_source("# isle 99 1 GREEN"),
            Err(MapFileError::InvalidEpoch(_))
        ));
        assert!(matches!(
            parse_map_source("# isle 1 1 PINK"),
            Err(MapFileError::UnknownColour(_))
        ));
        assert!(matches!(
            parse_map_source("# isle 1 1 GREEN\nSECTOR 99 0"),
            Err(MapFileError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            parse_map_source("# isle 1 1 GREEN\nTOWER 1 1"),
            Err(MapFileError::UnknownDirective(_))
        ));
    }

    #[test]
    fn zero_prefixed_names_sort_last() {
        let mk = |name: &str| {
            let mut map = Map::new(MapColour::Grey, 1, name);
            map.new_square_at(0, 0);
            map
        };
        let catalog =
            MapCatalog::from_maps(vec![(0, mk("0mega")), (0, mk("binary")), (0, mk("alpha"))])
                .unwrap();
        assert_eq!(catalog.map(0, 0).unwrap().name(), "alpha");
        assert_eq!(catalog.map(0, 1).unwrap().name(), "binary");
        assert_eq!(catalog.map(0, 2).unwrap().name(), "0mega");
    }

    #[test]
    fn epoch_overflow_is_reported() {
        let mk = |name: &str| Map::new(MapColour::Grey, 1, name);
        let maps = (0..=MAX_ISLANDS_PER_EPOCH)
            .map(|i| (1, mk(&format!("isle{i}"))))
            .collect();
        assert!(matches!(
            MapCatalog::from_maps(maps),
            Err(MapFileError::TooManyIslands(1))
        ));
    }
}
