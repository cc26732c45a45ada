//! Board geometry - rectangular grid with orthogonal movement

use serde::{Deserialize, Serialize};

/// A cell position on the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position
    pub fn manhattan(&self, other: Pos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Neighbouring cell in the given direction
    pub fn step(&self, dir: Dir) -> Pos {
        let (dx, dy) = dir.delta();
        Pos::new(self.x + dx, self.y + dy)
    }

    /// Direction that reduces Manhattan distance toward `target`, if any.
    ///
    /// Prefers the axis with the larger gap so units close diagonally-ish
    /// instead of hugging one axis.
    pub fn dir_toward(&self, target: Pos) -> Option<Dir> {
        if *self == target {
            return None;
        }
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        if dx.abs() >= dy.abs() && dx != 0 {
            Some(if dx > 0 { Dir::East } else { Dir::West })
        } else if dy != 0 {
            Some(if dy > 0 { Dir::South } else { Dir::North })
        } else {
            None
        }
    }
}

/// Movement direction (4-neighbourhood)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir {
    North,
    East,
    South,
    West,
}

/// All four directions in resolution order
pub const DIRS: [Dir; 4] = [Dir::North, Dir::East, Dir::South, Dir::West];

impl Dir {
    /// (dx, dy) offset; y grows southward
    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::North => (0, -1),
            Dir::East => (1, 0),
            Dir::South => (0, 1),
            Dir::West => (-1, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan() {
        assert_eq!(Pos::new(0, 0).manhattan(Pos::new(3, 4)), 7);
        assert_eq!(Pos::new(2, 2).manhattan(Pos::new(2, 2)), 0);
        assert_eq!(Pos::new(-1, 0).manhattan(Pos::new(1, 0)), 2);
    }

    #[test]
    fn test_step() {
        let p = Pos::new(4, 4);
        assert_eq!(p.step(Dir::North), Pos::new(4, 3));
        assert_eq!(p.step(Dir::East), Pos::new(5, 4));
        assert_eq!(p.step(Dir::South), Pos::new(4, 5));
        assert_eq!(p.step(Dir::West), Pos::new(3, 4));
    }

    #[test]
    fn test_dir_toward() {
        let p = Pos::new(0, 0);
        assert_eq!(p.dir_toward(Pos::new(5, 1)), Some(Dir::East));
        assert_eq!(p.dir_toward(Pos::new(1, 5)), Some(Dir::South));
        assert_eq!(p.dir_toward(Pos::new(-3, 0)), Some(Dir::West));
        assert_eq!(p.dir_toward(p), None);
    }
}
