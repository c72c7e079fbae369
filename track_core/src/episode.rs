use crate::{
    agent::Policy,
    environment::{Environment, Info},
};

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// A terminal state was reached.
    Terminal,
    /// The driver's step budget ran out first.
    StepLimit,
    /// The policy returned no action.
    NoAction,
}

/// One recorded application of `step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<E: Environment> {
    pub state: E::State,
    pub action: E::Action,
    pub next_state: E::State,
    pub info: Info,
    /// False when the environment returned the state unchanged.
    pub accepted: bool,
}

/// Everything that happened during one episode.
#[derive(Debug, Clone)]
pub struct Trajectory<E: Environment> {
    pub initial_state: E::State,
    pub transitions: Vec<Transition<E>>,
    pub final_state: E::State,
    pub outcome: EpisodeOutcome,
}

impl<E: Environment> Trajectory<E> {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Number of actions the environment turned into no-ops.
    pub fn rejected(&self) -> usize {
        self.transitions.iter().filter(|t| !t.accepted).count()
    }

    pub fn actions(&self) -> impl Iterator<Item = &E::Action> {
        self.transitions.iter().map(|t| &t.action)
    }
}

/// Applies `action` and records the result.
pub fn record_step<E: Environment>(env: &E, state: &E::State, action: E::Action) -> Transition<E> {
    let (next_state, info) = env.step(state, &action);
    let accepted = next_state != *state;
    Transition {
        state: state.clone(),
        action,
        next_state,
        info,
        accepted,
    }
}

/// Drives one episode from the initial state.
///
/// Stops at the first terminal state, when the policy has no action, or
/// after `max_steps` transitions. The environment itself has no step limit.
pub fn run_episode<E, P>(env: &E, policy: &mut P, max_steps: usize) -> Trajectory<E>
where
    E: Environment,
    P: Policy<E> + ?Sized,
{
    let initial_state = env.initial_state();
    let mut state = initial_state.clone();
    let mut transitions = Vec::new();

    let outcome = loop {
        if env.is_terminal(&state) {
            break EpisodeOutcome::Terminal;
        }
        if transitions.len() >= max_steps {
            break EpisodeOutcome::StepLimit;
        }
        let Some(action) = policy.select_action(env, &state) else {
            break EpisodeOutcome::NoAction;
        };

        let transition = record_step(env, &state, action);
        tracing::debug!(
            step = transitions.len(),
            action = ?transition.action,
            accepted = transition.accepted,
            "step"
        );
        state = transition.next_state.clone();
        transitions.push(transition);
    };

    tracing::debug!(?outcome, steps = transitions.len(), "episode finished");

    Trajectory {
        initial_state,
        transitions,
        final_state: state,
        outcome,
    }
}
