//! Map loading - plain-text map format
//!
//! One whitespace-separated token per cell:
//! `.` empty, `#` wall, `R` resource node, `b`/`B` base (side 0/1),
//! `w`/`W` worker (side 0/1).

use std::path::Path;

use thiserror::Error;

use crate::grid::Pos;
use crate::state::Side;
use crate::units::UnitKind;

/// Resources on a freshly placed node
pub const RESOURCE_NODE_AMOUNT: u32 = 20;

/// Stockpile each side starts with
pub const DEFAULT_STARTING_RESOURCES: u32 = 5;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),
    #[error("map is empty")]
    Empty,
    #[error("line {0} has a different width than line 1")]
    Ragged(usize),
    #[error("unknown map token '{token}' on line {line}")]
    UnknownToken { token: String, line: usize },
}

/// An initial unit placement
#[derive(Clone, Debug)]
pub struct Placement {
    pub kind: UnitKind,
    pub owner: Option<Side>,
    pub pos: Pos,
    pub amount: u32,
}

/// A parsed map: terrain plus initial placements
#[derive(Clone, Debug)]
pub struct GameMap {
    pub width: i32,
    pub height: i32,
    /// Row-major wall flags
    pub walls: Vec<bool>,
    pub units: Vec<Placement>,
    pub starting_resources: u32,
}

impl GameMap {
    /// Parse map text. `starting_resources` seeds both stockpiles.
    pub fn parse(text: &str, starting_resources: u32) -> Result<GameMap, MapError> {
        let rows: Vec<Vec<&str>> = text
            .lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>())
            .filter(|tokens| !tokens.is_empty())
            .collect();
        if rows.is_empty() {
            return Err(MapError::Empty);
        }

        let width = rows[0].len();
        let height = rows.len();
        let mut walls = vec![false; width * height];
        let mut units = Vec::new();

        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(MapError::Ragged(y + 1));
            }
            for (x, token) in row.iter().enumerate() {
                let pos = Pos::new(x as i32, y as i32);
                match *token {
                    "." => {}
                    "#" => walls[y * width + x] = true,
                    "R" => units.push(Placement {
                        kind: UnitKind::Resource,
                        owner: None,
                        pos,
                        amount: RESOURCE_NODE_AMOUNT,
                    }),
                    "b" | "B" => units.push(Placement {
                        kind: UnitKind::Base,
                        owner: Some(if *token == "b" { Side::P0 } else { Side::P1 }),
                        pos,
                        amount: 0,
                    }),
                    "w" | "W" => units.push(Placement {
                        kind: UnitKind::Worker,
                        owner: Some(if *token == "w" { Side::P0 } else { Side::P1 }),
                        pos,
                        amount: 0,
                    }),
                    other => {
                        return Err(MapError::UnknownToken {
                            token: other.to_string(),
                            line: y + 1,
                        })
                    }
                }
            }
        }

        Ok(GameMap {
            width: width as i32,
            height: height as i32,
            walls,
            units,
            starting_resources,
        })
    }

    /// Load a map from a file
    pub fn load(path: &Path) -> Result<GameMap, MapError> {
        let text = std::fs::read_to_string(path)?;
        GameMap::parse(&text, DEFAULT_STARTING_RESOURCES)
    }

    /// The classic symmetric 8x8 starter: one base and one worker per side,
    /// resource nodes in opposite corners.
    pub fn bases_workers_8x8() -> GameMap {
        GameMap::parse(
            "R . . . . . . .\n\
             R . . . . . . .\n\
             . . b w . . . .\n\
             . . . . . . . .\n\
             . . . . . . . .\n\
             . . . . W B . .\n\
             . . . . . . . R\n\
             . . . . . . . R",
            DEFAULT_STARTING_RESOURCES,
        )
        .expect("built-in map is well-formed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let map = GameMap::parse("R w .\n. # B", 5).unwrap();
        assert_eq!(map.width, 3);
        assert_eq!(map.height, 2);
        assert_eq!(map.units.len(), 3);
        assert!(map.walls[1 * 3 + 1]);
    }

    #[test]
    fn test_parse_ragged() {
        let err = GameMap::parse("R w .\n. B", 5).unwrap_err();
        assert!(matches!(err, MapError::Ragged(2)));
    }

    #[test]
    fn test_parse_unknown_token() {
        let err = GameMap::parse("R X", 5).unwrap_err();
        assert!(matches!(err, MapError::UnknownToken { line: 1, .. }));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(GameMap::parse("", 5), Err(MapError::Empty)));
        assert!(matches!(GameMap::parse("\n  \n", 5), Err(MapError::Empty)));
    }

    #[test]
    fn test_builtin_map_symmetric() {
        let map = GameMap::bases_workers_8x8();
        assert_eq!(map.width, 8);
        assert_eq!(map.height, 8);
        let p0: Vec<_> = map.units.iter().filter(|p| p.owner == Some(Side::P0)).collect();
        let p1: Vec<_> = map.units.iter().filter(|p| p.owner == Some(Side::P1)).collect();
        assert_eq!(p0.len(), p1.len());
        let resources = map.units.iter().filter(|p| p.owner.is_none()).count();
        assert_eq!(resources, 4);
    }
}
