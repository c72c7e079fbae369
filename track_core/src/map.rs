use std::{fmt, ops::Index};

use serde::{Deserialize, Serialize};

use crate::{Position, grid::GridEnvironment, grid::GridState};

/// Represents errors that can occur while loading a map.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map string is empty.")]
    Empty,
    #[error("Map has zero width.")]
    ZeroWidth,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map code '{code}' at position ({x}, {y}).")]
    UnknownCode { code: String, x: usize, y: usize },
    #[error("Multiple {0} positions found.")]
    Duplicate(&'static str),
    #[error("No {0} position found in map.")]
    Missing(&'static str),
}

/// What occupies a cell in a rendered snapshot of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Floor,
    Obstacle,
    Key,
    Goal,
    Agent,
}

impl Tile {
    pub fn symbol(self) -> char {
        match self {
            Tile::Floor => '.',
            Tile::Obstacle => '#',
            Tile::Key => 'k',
            Tile::Goal => 'g',
            Tile::Agent => '@',
        }
    }
}

/// A dense 2D grid stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![T::default(); size],
        }
    }

    /// Creates a new grid whose cells are produced by `f(position)`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(Position) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(Position::new(x as isize, y as isize)));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts a position to a flat index, or `None` when out of bounds.
    #[inline]
    fn index_of(&self, pos: Position) -> Option<usize> {
        let x = usize::try_from(pos.x).ok()?;
        let y = usize::try_from(pos.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    #[inline]
    pub fn is_valid(&self, pos: Position) -> bool {
        self.index_of(pos).is_some()
    }

    pub fn get(&self, pos: Position) -> Option<&T> {
        self.cells.get(self.index_of(pos)?)
    }

    /// Iterates over the rows from `y = 0` downwards.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // `max(1)` keeps `chunks` happy on zero-width grids, which have no cells anyway.
        self.cells.chunks(self.width.max(1))
    }

    /// Returns an iterator that yields `(position, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width.max(1);
        self.cells.iter().enumerate().map(move |(index, cell)| {
            let pos = Position::new((index % width) as isize, (index / width) as isize);
            (pos, cell)
        })
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.index_of(pos) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

impl GridState {
    /// Takes a tile snapshot of the state.
    ///
    /// Where several things share a cell the agent is drawn first, then the
    /// key, the goal, and finally an obstacle.
    pub fn tiles(&self) -> Grid<Tile> {
        Grid::from_generator(self.width, self.height, |pos| {
            if pos == self.agent_pos {
                Tile::Agent
            } else if self.key_pos == Some(pos) {
                Tile::Key
            } else if pos == self.goal_pos {
                Tile::Goal
            } else if self.obstacles.contains(&pos) {
                Tile::Obstacle
            } else {
                Tile::Floor
            }
        })
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tiles = self.tiles();
        for (y, row) in tiles.rows().enumerate() {
            if y > 0 {
                writeln!(f)?;
            }
            for tile in row {
                write!(f, "{}", tile.symbol())?;
            }
        }
        Ok(())
    }
}

/// Loads a grid environment from a string representation of a map.
///
/// Each row is a line of whitespace-separated codes:
/// `BL` floor, `WL` obstacle, `ST` agent start, `KY` key, `GL` goal and
/// `KG` key lying on the goal. Start, key and goal must appear exactly once.
pub fn load_environment_from_string(map_string: &str) -> Result<GridEnvironment, MapError> {
    let lines: Vec<&str> = map_string.trim().lines().collect();
    if lines.is_empty() {
        return Err(MapError::Empty);
    }

    let height = lines.len();
    let mut width = 0;
    let mut obstacles = Vec::new();
    let mut start = None;
    let mut key = None;
    let mut goal = None;

    fn place(slot: &mut Option<Position>, pos: Position, what: &'static str) -> Result<(), MapError> {
        if slot.replace(pos).is_some() {
            return Err(MapError::Duplicate(what));
        }
        Ok(())
    }

    for (y, line) in lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if y == 0 {
            width = tokens.len();
            if width == 0 {
                return Err(MapError::ZeroWidth);
            }
        } else if tokens.len() != width {
            return Err(MapError::InconsistentWidth {
                row: y,
                expected: width,
                found: tokens.len(),
            });
        }

        for (x, token) in tokens.iter().enumerate() {
            let pos = Position::new(x as isize, y as isize);
            match *token {
                "BL" => {}
                "WL" => obstacles.push(pos),
                "ST" => place(&mut start, pos, "start")?,
                "KY" => place(&mut key, pos, "key")?,
                "GL" => place(&mut goal, pos, "goal")?,
                "KG" => {
                    place(&mut key, pos, "key")?;
                    place(&mut goal, pos, "goal")?;
                }
                unknown => {
                    return Err(MapError::UnknownCode {
                        code: unknown.to_string(),
                        x,
                        y,
                    });
                }
            }
        }
    }

    let agent_start = start.ok_or(MapError::Missing("start"))?;
    let key_pos = key.ok_or(MapError::Missing("key"))?;
    let goal_pos = goal.ok_or(MapError::Missing("goal"))?;

    tracing::debug!(
        width,
        height,
        obstacles = obstacles.len(),
        "loaded map"
    );

    Ok(GridEnvironment::new(
        width,
        height,
        obstacles,
        key_pos,
        goal_pos,
        agent_start,
    ))
}
