use serde::{Deserialize, Serialize};

pub mod agent;
pub mod environment;
pub mod episode;
pub mod grid;
pub mod map;

pub use environment::{Action, Environment, Info, State};
pub use grid::{GridAction, GridEnvironment, GridState};

/// Represents a 2D coordinate.
///
/// `x` is the horizontal axis and `y` the vertical one. Coordinates are signed
/// so that offsets and out-of-bounds cells (e.g. inert obstacles) can be
/// expressed directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: isize,
    pub y: isize,
}

impl Position {
    pub const fn new(x: isize, y: isize) -> Self {
        Position { x, y }
    }

    /// Returns the position shifted by `(dx, dy)`, or `None` on integer overflow.
    #[inline]
    pub fn offset(self, dx: isize, dy: isize) -> Option<Position> {
        Some(Position {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }
}

impl From<(isize, isize)> for Position {
    fn from((x, y): (isize, isize)) -> Self {
        Position { x, y }
    }
}

#[cfg(test)]
mod tests {
    use serde_test::{Token, assert_tokens};

    use super::Position;

    #[test]
    fn offset_overflow_is_none() {
        assert_eq!(Position::new(isize::MAX, 0).offset(1, 0), None);
        assert_eq!(Position::new(2, 3).offset(-1, 1), Some(Position::new(1, 4)));
    }

    #[test]
    fn test_ser_de() {
        assert_tokens(
            &Position::new(1, -2),
            &[
                Token::Struct {
                    name: "Position",
                    len: 2,
                },
                Token::Str("x"),
                Token::I64(1),
                Token::Str("y"),
                Token::I64(-2),
                Token::StructEnd,
            ],
        );
    }
}
