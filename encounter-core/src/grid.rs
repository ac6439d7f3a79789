//! Battle grid.
//!
//! A fixed-size board where each cell holds at most one combatant.
//! Distances are Manhattan; there is no diagonal movement.

use crate::combat::CombatantId;
use crate::error::CombatError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A cell on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell.
    pub fn distance_to(&self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Manhattan distance between two cells.
pub fn distance(a: Position, b: Position) -> u32 {
    a.distance_to(b)
}

/// Occupancy board. Cells are stored row-major.
///
/// Deserializing checks that the cell vector matches the dimensions and
/// that no combatant stands on two cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridCells")]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Option<CombatantId>>,
}

/// Wire shape of [`Grid`] before its invariants are checked.
#[derive(Deserialize)]
struct GridCells {
    width: u32,
    height: u32,
    cells: Vec<Option<CombatantId>>,
}

impl TryFrom<GridCells> for Grid {
    type Error = String;

    fn try_from(raw: GridCells) -> Result<Self, Self::Error> {
        let expected = (raw.width as usize) * (raw.height as usize);
        if raw.cells.len() != expected {
            return Err(format!(
                "a {}x{} grid needs {} cells, found {}",
                raw.width,
                raw.height,
                expected,
                raw.cells.len()
            ));
        }

        let mut seen = HashSet::new();
        for id in raw.cells.iter().flatten() {
            if !seen.insert(*id) {
                return Err(format!("combatant {id} occupies more than one cell"));
            }
        }

        Ok(Self {
            width: raw.width,
            height: raw.height,
            cells: raw.cells,
        })
    }
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    fn position_at(&self, index: usize) -> Position {
        let width = self.width as usize;
        Position::new((index % width) as u32, (index / width) as u32)
    }

    fn check_bounds(&self, pos: Position) -> Result<(), CombatError> {
        if self.in_bounds(pos) {
            Ok(())
        } else {
            Err(CombatError::OutOfBounds {
                position: pos,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Who stands on a cell. Out-of-bounds cells are empty.
    pub fn occupant(&self, pos: Position) -> Option<CombatantId> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells[self.index(pos)]
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.occupant(pos).is_some()
    }

    /// Where a combatant currently stands.
    pub fn position_of(&self, id: CombatantId) -> Option<Position> {
        self.cells
            .iter()
            .position(|cell| *cell == Some(id))
            .map(|index| self.position_at(index))
    }

    /// Every occupied cell with its occupant, row by row.
    pub fn occupied(&self) -> impl Iterator<Item = (Position, CombatantId)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| cell.map(|id| (self.position_at(index), id)))
    }

    /// Put a combatant on a cell, vacating any cell it held before.
    ///
    /// Returns the previously occupied cell.
    pub fn place(
        &mut self,
        id: CombatantId,
        pos: Position,
    ) -> Result<Option<Position>, CombatError> {
        self.check_bounds(pos)?;

        match self.occupant(pos) {
            Some(occupant) if occupant == id => return Ok(Some(pos)),
            Some(occupant) => {
                return Err(CombatError::CellOccupied {
                    position: pos,
                    occupant,
                })
            }
            None => {}
        }

        let previous = self.remove(id);
        let index = self.index(pos);
        self.cells[index] = Some(id);
        Ok(previous)
    }

    /// Take a combatant off the board.
    pub fn remove(&mut self, id: CombatantId) -> Option<Position> {
        let previous = self.position_of(id)?;
        let index = self.index(previous);
        self.cells[index] = None;
        Some(previous)
    }

    /// All in-bounds, unoccupied cells within `range` orthogonal steps.
    ///
    /// The origin itself is never included. Results are ordered by row,
    /// then column.
    pub fn valid_moves_from(&self, from: Position, range: u32) -> Vec<Position> {
        if range == 0 || self.width == 0 || self.height == 0 {
            return Vec::new();
        }

        let min_x = from.x.saturating_sub(range);
        let min_y = from.y.saturating_sub(range);
        let max_x = from.x.saturating_add(range).min(self.width.saturating_sub(1));
        let max_y = from.y.saturating_add(range).min(self.height.saturating_sub(1));

        let mut moves = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let pos = Position::new(x, y);
                let dist = from.distance_to(pos);
                if dist == 0 || dist > range {
                    continue;
                }
                if !self.is_occupied(pos) {
                    moves.push(pos);
                }
            }
        }
        moves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_manhattan() {
        assert_eq!(distance(Position::new(0, 0), Position::new(3, 4)), 7);
        assert_eq!(distance(Position::new(5, 2), Position::new(2, 5)), 6);
        assert_eq!(distance(Position::new(1, 1), Position::new(1, 1)), 0);
    }

    #[test]
    fn test_place_and_move() {
        let mut grid = Grid::new(5, 5);
        let id = CombatantId::new();

        assert_eq!(grid.place(id, Position::new(1, 1)).unwrap(), None);
        assert_eq!(grid.occupant(Position::new(1, 1)), Some(id));

        let previous = grid.place(id, Position::new(2, 1)).unwrap();
        assert_eq!(previous, Some(Position::new(1, 1)));
        assert!(!grid.is_occupied(Position::new(1, 1)));
        assert_eq!(grid.position_of(id), Some(Position::new(2, 1)));
    }

    #[test]
    fn test_place_out_of_bounds() {
        let mut grid = Grid::new(4, 3);
        let id = CombatantId::new();
        let err = grid.place(id, Position::new(4, 0)).unwrap_err();
        assert!(matches!(err, CombatError::OutOfBounds { .. }));
        let err = grid.place(id, Position::new(0, 3)).unwrap_err();
        assert!(matches!(err, CombatError::OutOfBounds { .. }));
    }

    #[test]
    fn test_place_occupied() {
        let mut grid = Grid::new(4, 4);
        let a = CombatantId::new();
        let b = CombatantId::new();
        grid.place(a, Position::new(2, 2)).unwrap();

        let err = grid.place(b, Position::new(2, 2)).unwrap_err();
        assert_eq!(
            err,
            CombatError::CellOccupied {
                position: Position::new(2, 2),
                occupant: a
            }
        );
        // Re-placing onto your own cell is fine.
        assert!(grid.place(a, Position::new(2, 2)).is_ok());
    }

    #[test]
    fn test_valid_moves_range_one_is_orthogonal() {
        let grid = Grid::new(5, 5);
        let moves = grid.valid_moves_from(Position::new(2, 2), 1);
        assert_eq!(
            moves,
            vec![
                Position::new(2, 1),
                Position::new(1, 2),
                Position::new(3, 2),
                Position::new(2, 3),
            ]
        );
    }

    #[test]
    fn test_valid_moves_respects_bounds_and_occupancy() {
        let mut grid = Grid::new(3, 3);
        let blocker = CombatantId::new();
        grid.place(blocker, Position::new(1, 0)).unwrap();

        for range in 0..5 {
            let moves = grid.valid_moves_from(Position::new(0, 0), range);
            for pos in &moves {
                assert!(grid.in_bounds(*pos));
                assert!(!grid.is_occupied(*pos));
                assert!(pos.distance_to(Position::new(0, 0)) <= range);
            }
        }
        let moves = grid.valid_moves_from(Position::new(0, 0), 1);
        assert_eq!(moves, vec![Position::new(0, 1)]);
    }

    #[test]
    fn test_deserialize_checks_cell_count() {
        let err = serde_json::from_str::<Grid>(r#"{"width":5,"height":5,"cells":[]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("needs 25 cells"));

        let grid: Grid =
            serde_json::from_str(r#"{"width":2,"height":1,"cells":[null,null]}"#).unwrap();
        assert_eq!(grid, Grid::new(2, 1));
        assert_eq!(grid.valid_moves_from(Position::new(0, 0), 1), vec![Position::new(1, 0)]);
    }

    #[test]
    fn test_deserialize_rejects_combatant_on_two_cells() {
        let id = CombatantId::new();
        let json = format!(r#"{{"width":2,"height":1,"cells":["{id}","{id}"]}}"#);
        assert!(serde_json::from_str::<Grid>(&json).is_err());

        let mut grid = Grid::new(2, 1);
        grid.place(id, Position::new(1, 0)).unwrap();
        let back: Grid = serde_json::from_str(&serde_json::to_string(&grid).unwrap()).unwrap();
        assert_eq!(back.occupied().collect::<Vec<_>>(), vec![(Position::new(1, 0), id)]);
    }
}
