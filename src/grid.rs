use std::{fmt, ops::Range};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use self::direction::{Direction, ALL_DIRECTIONS};

/// Defines cardinal directions and grid deltas
pub mod direction;

/// Index of a cell in a [`GridDefinition`]
pub type CellIndex = usize;

/// A grid cell. Coordinates are signed so that out-of-grid neighbours can be expressed and rejected.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Cell {
    /// Position on the x axis (columns, growing east)
    pub x: i32,
    /// Position on the y axis (rows, growing south)
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the adjacent cell in `direction`
    pub fn step(&self, direction: Direction) -> Cell {
        let delta = direction.delta();
        Cell::new(self.x + delta.dx, self.y + delta.dy)
    }

    /// Returns the 4 orthogonal neighbours, in [`ALL_DIRECTIONS`] order
    pub fn neighbours(&self) -> [Cell; 4] {
        [
            self.step(ALL_DIRECTIONS[0]),
            self.step(ALL_DIRECTIONS[1]),
            self.step(ALL_DIRECTIONS[2]),
            self.step(ALL_DIRECTIONS[3]),
        ]
    }

    pub fn manhattan(&self, other: &Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn distance_squared(&self, other: &Cell) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle of cells. `x`/`y` is the top-left cell, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// First column after the rectangle
    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// First row after the rectangle
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    /// Center cell, rounded towards the top-left
    pub fn center(&self) -> Cell {
        Cell::new(
            self.x + (self.width as i32 - 1) / 2,
            self.y + (self.height as i32 - 1) / 2,
        )
    }

    /// Exact geometric centroid
    pub fn centroid(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.,
            f64::from(self.y) + f64::from(self.height) / 2.,
        )
    }

    /// Euclidean distance between the centroids of two rectangles
    pub fn centroid_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.centroid();
        let (bx, by) = other.centroid();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        cell.x >= self.x && cell.x < self.right() && cell.y >= self.y && cell.y < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Returns the cell of the rectangle closest to `cell`
    pub fn clamp(&self, cell: &Cell) -> Cell {
        Cell::new(
            cell.x.clamp(self.x, self.right() - 1),
            cell.y.clamp(self.y, self.bottom() - 1),
        )
    }

    /// Iterates over all the cells of the rectangle, row by row
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.y..self.bottom())
            .flat_map(move |y| (self.x..self.right()).map(move |x| Cell::new(x, y)))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {} {}x{}]",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Size of a 2d grid, and index computations on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDefinition {
    size_x: u32,
    size_y: u32,
}

impl fmt::Display for GridDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( size: {} {} )", self.size_x, self.size_y)
    }
}

impl GridDefinition {
    /// Creates a new [`GridDefinition`]
    pub fn new(size_x: u32, size_y: u32) -> Self {
        Self { size_x, size_y }
    }

    /// Returns the size of the grid in the X axis.
    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    /// Returns the size of the grid in the Y axis.
    pub fn size_y(&self) -> u32 {
        self.size_y
    }

    /// Returns the total size of the grid
    pub fn total_size(&self) -> usize {
        self.size_x as usize * self.size_y as usize
    }

    /// Returns a [`Range`] over all cell indexes in this grid
    pub fn indexes(&self) -> Range<CellIndex> {
        0..self.total_size()
    }

    /// Rectangle covering the whole grid
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.size_x, self.size_y)
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.size_x && (cell.y as u32) < self.size_y
    }

    /// Returns the index of a cell, or `None` if the cell is outside the grid.
    pub fn index_of(&self, cell: &Cell) -> Option<CellIndex> {
        match self.contains(cell) {
            true => Some(cell.x as usize + cell.y as usize * self.size_x as usize),
            false => None,
        }
    }

    /// Returns the [`Cell`] at `index`.
    ///
    /// NO CHECK is done to verify that the given index is a valid index for this grid.
    pub fn cell_at(&self, index: CellIndex) -> Cell {
        let size_x = self.size_x as usize;
        Cell::new((index % size_x) as i32, (index / size_x) as i32)
    }

    /// Returns the index of the neighbour of `index` in `direction`, or `None` when it falls outside of the grid.
    pub fn next_index(&self, index: CellIndex, direction: Direction) -> Option<CellIndex> {
        self.index_of(&self.cell_at(index).step(direction))
    }
}

/// Per-cell data stored for a whole [`GridDefinition`]
#[derive(Clone, Debug)]
pub struct GridData<D> {
    grid: GridDefinition,
    /// Indexed as `[(y, x)]`
    data: Array2<D>,
}

impl<D: Clone> GridData<D> {
    /// Creates a [`GridData`] filled with `value`
    pub fn new(grid: GridDefinition, value: D) -> Self {
        Self {
            data: Array2::from_elem((grid.size_y as usize, grid.size_x as usize), value),
            grid,
        }
    }

    /// Resets all the cells to `value`
    pub fn reset(&mut self, value: D) {
        self.data.fill(value);
    }
}

impl<D> GridData<D> {
    pub fn grid(&self) -> &GridDefinition {
        &self.grid
    }

    /// Returns the data of `cell`, `None` if the cell is outside of the grid
    pub fn get(&self, cell: &Cell) -> Option<&D> {
        match self.grid.contains(cell) {
            true => self.data.get((cell.y as usize, cell.x as usize)),
            false => None,
        }
    }

    /// Sets the data of `cell`. Does nothing if the cell is outside of the grid.
    pub fn set(&mut self, cell: &Cell, value: D) {
        if self.grid.contains(cell) {
            self.data[(cell.y as usize, cell.x as usize)] = value;
        }
    }

    /// Iterates over all cells with their data, row by row
    pub fn iter(&self) -> impl Iterator<Item = (Cell, &D)> {
        self.data
            .indexed_iter()
            .map(|((y, x), value)| (Cell::new(x as i32, y as i32), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_cell_roundtrip_on_rectangular_grid() {
        let grid = GridDefinition::new(7, 3);
        for index in grid.indexes() {
            let cell = grid.cell_at(index);
            assert_eq!(grid.index_of(&cell), Some(index));
        }
        assert_eq!(grid.index_of(&Cell::new(7, 0)), None);
        assert_eq!(grid.index_of(&Cell::new(-1, 0)), None);
    }

    #[test]
    fn next_index_stops_at_borders() {
        let grid = GridDefinition::new(3, 3);
        assert_eq!(grid.next_index(0, Direction::North), None);
        assert_eq!(grid.next_index(0, Direction::West), None);
        assert_eq!(grid.next_index(0, Direction::East), Some(1));
        assert_eq!(grid.next_index(0, Direction::South), Some(3));
    }

    #[test]
    fn rect_intersection_excludes_touching_edges() {
        let a = Rect::new(0, 0, 4, 4);
        assert!(a.intersects(&Rect::new(3, 3, 2, 2)));
        assert!(!a.intersects(&Rect::new(4, 0, 2, 2)));
        assert!(!a.intersects(&Rect::new(0, 4, 2, 2)));
    }

    #[test]
    fn rect_cells_and_clamp() {
        let rect = Rect::new(2, 1, 3, 2);
        assert_eq!(rect.cells().count(), 6);
        assert!(rect.cells().all(|cell| rect.contains(&cell)));
        assert_eq!(rect.clamp(&Cell::new(-4, 10)), Cell::new(2, 2));
        assert_eq!(rect.center(), Cell::new(3, 1));
    }

    #[test]
    fn grid_data_ignores_out_of_bounds_writes() {
        let mut data = GridData::new(GridDefinition::new(2, 2), 0u8);
        data.set(&Cell::new(1, 1), 5);
        data.set(&Cell::new(2, 1), 9);
        assert_eq!(data.get(&Cell::new(1, 1)), Some(&5));
        assert_eq!(data.get(&Cell::new(2, 1)), None);
        assert_eq!(data.iter().filter(|(_, v)| **v != 0).count(), 1);
    }
}
