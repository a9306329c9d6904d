//! Fixed campaign geometry and timing constants.

/// Width of every island grid, in sectors.
pub const MAP_WIDTH: usize = 14;
/// Height of every island grid, in sectors.
pub const MAP_HEIGHT: usize = 14;

/// Number of faction slots in the roster.
pub const N_PLAYERS: usize = 4;

/// Number of technology epochs in a campaign.
pub const N_EPOCHS: usize = 10;
/// The final epoch; it has no follow-on islands.
pub const END_EPOCH: usize = N_EPOCHS - 1;
/// Maximum islands playable within a single epoch.
pub const MAX_ISLANDS_PER_EPOCH: usize = 3;

/// Slot count for binary quick-saves.
pub const N_SAVE_SLOTS: usize = 10;

/// Per-update clamp on wall-clock deltas, protecting against stalls and
/// debugger pauses injecting huge catch-up jumps.
pub const MAX_FRAME_DELTA_MS: i32 = 200;
/// Fixed real-to-simulated time scaling factor.
pub const TIME_RATIO: f64 = 1.0;
/// Real-time milliseconds per animation frame at rate 1.
pub const TICKS_PER_FRAME_MS: i32 = 100;

/// Reserve pool granted when playing a single island outside campaign mode.
pub const SINGLE_ISLAND_MEN: i32 = 1000;

/// Display dates for each epoch, negative values being BCE.
pub const EPOCH_DATES: [i32; N_EPOCHS] = [
    -10000, -2000, 1, 900, 1400, 1850, 1914, 1950, 1980, 2100,
];

/// Version stamped into save headers.
pub const MAJOR_VERSION: u32 = 0;
pub const MINOR_VERSION: u32 = 1;
