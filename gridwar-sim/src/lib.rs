//! GRIDWAR Sim - Core game engine
//!
//! This crate provides the simulator the rest of the workspace plays on:
//! - Grid geometry (rectangular board, Manhattan distance)
//! - Unit kinds and their static stats table
//! - Game state, legal action enumeration, deterministic tick resolution
//! - Map loading (plain-text format) with a built-in default map
//!
//! The tick loop is strictly synchronous: both sides commit a `PlayerAction`,
//! then `advance` resolves exactly one tick. Lookahead always operates on
//! clones; the engine never mutates state behind the caller's back.

pub mod grid;
pub mod map;
pub mod state;
pub mod units;

// Re-exports for convenient access
pub use grid::{Dir, Pos, DIRS};
pub use map::{GameMap, MapError};
pub use state::{
    ActionKind, GameResult, GameState, PlayerAction, Side, Unit, UnitAction, UnitId,
};
pub use units::{stats, UnitKind, UnitStats};
