use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};

use crate::{
    Position,
    environment::{Environment, Info},
};

/// Immutable grid world state.
///
/// `key_pos` is `None` once the agent has collected the key. The bounds and
/// the obstacle set are shared by every state derived from the same
/// environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridState {
    pub width: usize,
    pub height: usize,
    pub agent_pos: Position,
    pub key_pos: Option<Position>,
    pub goal_pos: Position,
    pub obstacles: Arc<BTreeSet<Position>>,
}

impl GridState {
    /// True once the key has been picked up.
    #[inline]
    pub fn has_key(&self) -> bool {
        self.key_pos.is_none()
    }

    /// Checks if the position lies within `[0, width) x [0, height)`.
    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        usize::try_from(pos.x).is_ok_and(|x| x < self.width)
            && usize::try_from(pos.y).is_ok_and(|y| y < self.height)
    }

    /// An obstacle only blocks while the key is still on the ground.
    #[inline]
    pub fn is_blocked(&self, pos: Position) -> bool {
        !self.has_key() && self.obstacles.contains(&pos)
    }

    /// Resolves the cell a move would land on, if the move is allowed.
    fn move_target(&self, dx: isize, dy: isize) -> Option<Position> {
        let target = self.agent_pos.offset(dx, dy)?;
        (self.in_bounds(target) && !self.is_blocked(target)).then_some(target)
    }
}

/// Actions available in the grid world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridAction {
    /// Single-step offset. Only the four orthogonal unit vectors are offered
    /// by `available_actions`, but any offset is accepted by `step` and
    /// applied literally before the bounds and obstacle checks.
    Move { dx: isize, dy: isize },
    /// Collect the key on the agent's current cell.
    PickupKey,
}

impl GridAction {
    /// The orthogonal moves in the order they are offered: left, right, up, down.
    pub const ORTHOGONAL: [GridAction; 4] = [
        GridAction::Move { dx: -1, dy: 0 },
        GridAction::Move { dx: 1, dy: 0 },
        GridAction::Move { dx: 0, dy: -1 },
        GridAction::Move { dx: 0, dy: 1 },
    ];

    pub const fn left() -> Self {
        GridAction::Move { dx: -1, dy: 0 }
    }

    pub const fn right() -> Self {
        GridAction::Move { dx: 1, dy: 0 }
    }

    pub const fn up() -> Self {
        GridAction::Move { dx: 0, dy: -1 }
    }

    pub const fn down() -> Self {
        GridAction::Move { dx: 0, dy: 1 }
    }
}

/// Configuration of a grid world scenario.
///
/// Holds no simulation state: it produces fresh `GridState` values and maps
/// states to successor states. Positions are not validated on construction;
/// an out-of-bounds start, key or goal is a caller error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridEnvironment {
    width: usize,
    height: usize,
    obstacles: Arc<BTreeSet<Position>>,
    key_pos: Position,
    goal_pos: Position,
    agent_start: Position,
}

impl GridEnvironment {
    /// Creates a new grid environment. All positions are `(x, y)`.
    pub fn new(
        width: usize,
        height: usize,
        obstacles: impl IntoIterator<Item = Position>,
        key_pos: Position,
        goal_pos: Position,
        agent_start: Position,
    ) -> Self {
        GridEnvironment {
            width,
            height,
            obstacles: Arc::new(obstacles.into_iter().collect()),
            key_pos,
            goal_pos,
            agent_start,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn obstacles(&self) -> &BTreeSet<Position> {
        &self.obstacles
    }
    pub fn key_pos(&self) -> Position {
        self.key_pos
    }
    pub fn goal_pos(&self) -> Position {
        self.goal_pos
    }
    pub fn agent_start(&self) -> Position {
        self.agent_start
    }

    fn step_move(&self, state: &GridState, dx: isize, dy: isize) -> GridState {
        match state.move_target(dx, dy) {
            Some(target) => GridState {
                agent_pos: target,
                ..state.clone()
            },
            None => {
                tracing::trace!(from = ?state.agent_pos, dx, dy, "move rejected");
                state.clone()
            }
        }
    }

    fn step_pickup(&self, state: &GridState) -> GridState {
        if state.key_pos == Some(state.agent_pos) {
            GridState {
                key_pos: None,
                ..state.clone()
            }
        } else {
            tracing::trace!(at = ?state.agent_pos, key = ?state.key_pos, "pickup rejected");
            state.clone()
        }
    }
}

impl Environment for GridEnvironment {
    type State = GridState;
    type Action = GridAction;

    fn initial_state(&self) -> GridState {
        GridState {
            width: self.width,
            height: self.height,
            agent_pos: self.agent_start,
            key_pos: Some(self.key_pos),
            goal_pos: self.goal_pos,
            obstacles: Arc::clone(&self.obstacles),
        }
    }

    fn available_actions(&self, state: &GridState) -> Vec<GridAction> {
        let mut actions: Vec<GridAction> = GridAction::ORTHOGONAL
            .into_iter()
            .filter(|action| match *action {
                GridAction::Move { dx, dy } => state.move_target(dx, dy).is_some(),
                GridAction::PickupKey => false,
            })
            .collect();

        if state.key_pos == Some(state.agent_pos) {
            actions.push(GridAction::PickupKey);
        }

        actions
    }

    fn step(&self, state: &GridState, action: &GridAction) -> (GridState, Info) {
        let next = match *action {
            GridAction::Move { dx, dy } => self.step_move(state, dx, dy),
            GridAction::PickupKey => self.step_pickup(state),
        };
        (next, Info::new())
    }

    fn is_terminal(&self, state: &GridState) -> bool {
        state.agent_pos == state.goal_pos
    }
}

#[cfg(test)]
mod tests {
    use serde_test::{Token, assert_tokens};

    use super::*;

    fn corridor() -> GridEnvironment {
        GridEnvironment::new(
            4,
            1,
            [Position::new(2, 0)],
            Position::new(1, 0),
            Position::new(3, 0),
            Position::new(0, 0),
        )
    }

    #[test]
    fn initial_state_copies_configuration() {
        let env = corridor();
        let state = env.initial_state();
        assert_eq!(state.width, 4);
        assert_eq!(state.height, 1);
        assert_eq!(state.agent_pos, Position::new(0, 0));
        assert_eq!(state.key_pos, Some(Position::new(1, 0)));
        assert_eq!(state.goal_pos, Position::new(3, 0));
        assert!(Arc::ptr_eq(&state.obstacles, &env.obstacles));
        assert_eq!(env.initial_state(), state);
    }

    #[test]
    fn diagonal_and_long_moves_are_applied_literally() {
        let env = GridEnvironment::new(
            3,
            3,
            Vec::new(),
            Position::new(2, 2),
            Position::new(2, 2),
            Position::new(0, 0),
        );
        let start = env.initial_state();
        let (diag, _) = env.step(&start, &GridAction::Move { dx: 1, dy: 1 });
        assert_eq!(diag.agent_pos, Position::new(1, 1));
        let (jump, _) = env.step(&start, &GridAction::Move { dx: 2, dy: 0 });
        assert_eq!(jump.agent_pos, Position::new(2, 0));
        let (far, _) = env.step(&start, &GridAction::Move { dx: 3, dy: 0 });
        assert_eq!(far, start);
    }

    #[test]
    fn extreme_offset_is_a_noop() {
        let env = corridor();
        let start = env.initial_state();
        let (next, info) = env.step(&start, &GridAction::Move { dx: isize::MIN, dy: 0 });
        assert_eq!(next, start);
        assert!(info.is_empty());
    }

    #[test]
    fn zero_move_keeps_position() {
        let env = corridor();
        let start = env.initial_state();
        let (next, _) = env.step(&start, &GridAction::Move { dx: 0, dy: 0 });
        assert_eq!(next, start);
    }

    #[test]
    fn pickup_away_from_key_is_a_noop() {
        let env = corridor();
        let start = env.initial_state();
        let (next, _) = env.step(&start, &GridAction::PickupKey);
        assert_eq!(next, start);
        assert!(!next.has_key());
    }

    #[test]
    fn out_of_bounds_obstacles_are_inert() {
        let env = GridEnvironment::new(
            2,
            1,
            [Position::new(-1, 0), Position::new(5, 5)],
            Position::new(1, 0),
            Position::new(1, 0),
            Position::new(0, 0),
        );
        let start = env.initial_state();
        assert_eq!(env.available_actions(&start), vec![GridAction::right()]);
        let (next, _) = env.step(&start, &GridAction::left());
        assert_eq!(next, start);
    }

    #[test]
    fn holding_key_opens_every_obstacle() {
        let env = corridor();
        let state = GridState {
            agent_pos: Position::new(1, 0),
            key_pos: None,
            ..env.initial_state()
        };
        assert!(state.has_key());
        assert!(!state.is_blocked(Position::new(2, 0)));
        assert_eq!(
            env.available_actions(&state),
            vec![GridAction::left(), GridAction::right()]
        );
    }

    #[test]
    fn pickup_offered_after_moves() {
        let env = corridor();
        let state = GridState {
            agent_pos: Position::new(1, 0),
            ..env.initial_state()
        };
        assert_eq!(
            env.available_actions(&state),
            vec![GridAction::left(), GridAction::PickupKey]
        );
    }

    #[test]
    fn terminal_states_still_expose_moves() {
        let env = corridor();
        let state = GridState {
            agent_pos: Position::new(3, 0),
            key_pos: None,
            ..env.initial_state()
        };
        assert!(env.is_terminal(&state));
        assert_eq!(env.available_actions(&state), vec![GridAction::left()]);
    }

    #[test]
    fn test_action_ser_de() {
        assert_tokens(
            &GridAction::Move { dx: 0, dy: -1 },
            &[
                Token::StructVariant {
                    name: "GridAction",
                    variant: "Move",
                    len: 2,
                },
                Token::Str("dx"),
                Token::I64(0),
                Token::Str("dy"),
                Token::I64(-1),
                Token::StructVariantEnd,
            ],
        );
        assert_tokens(
            &GridAction::PickupKey,
            &[Token::UnitVariant {
                name: "GridAction",
                variant: "PickupKey",
            }],
        );
    }
}
