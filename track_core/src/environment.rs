use std::{collections::BTreeMap, fmt::Debug, hash::Hash};

/// Side-channel returned next to every transition.
///
/// Reserved for diagnostic key/value pairs; the core never interprets it.
pub type Info = BTreeMap<String, String>;

/// Marker for action values.
///
/// Actions carry no universal fields. They are plain values compared
/// structurally, so any `Clone + Eq + Hash + Debug` type qualifies.
pub trait Action: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> Action for T {}

/// Marker for state values.
///
/// States are immutable: a transition always produces a new value and never
/// touches the one it was given.
pub trait State: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> State for T {}

/// Contract shared by every discrete, fully observable environment.
///
/// An environment is a bundle of pure functions over its own state and action
/// types. Callers (planners, assessment code, tests) drive episodes through
/// these four operations without knowing the concrete representation.
///
/// The contract itself has no instance; only concrete environments do:
///
/// ```compile_fail
/// use track_core::Environment;
///
/// let env = Environment;
/// ```
pub trait Environment {
    type State: State;
    type Action: Action;

    /// Returns the starting state. Repeated calls return equal states.
    fn initial_state(&self) -> Self::State;

    /// Returns every action that is structurally valid in `state`.
    ///
    /// The order is deterministic for a given state. The result is not
    /// required to be empty at terminal states.
    fn available_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Applies `action` to `state` and returns the resulting state with its
    /// info side-channel.
    ///
    /// Invalid actions are not errors; how they are handled is up to the
    /// environment.
    fn step(&self, state: &Self::State, action: &Self::Action) -> (Self::State, Info);

    /// Reports whether the episode is complete.
    fn is_terminal(&self, state: &Self::State) -> bool;
}
