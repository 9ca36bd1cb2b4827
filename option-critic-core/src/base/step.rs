//! Environment step.
use super::Env;

/// An observation, reward and termination tuple emitted at every
/// interaction step.
pub struct Step<E: Env> {
    /// Observation after the step.
    pub obs: E::Obs,

    /// Reward of the step.
    pub reward: f32,

    /// True termination of the episode.
    pub is_terminated: bool,

    /// Information defined by the environment.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: E::Obs, reward: f32, is_terminated: bool, info: E::Info) -> Self {
        Step {
            obs,
            reward,
            is_terminated,
            info,
        }
    }
}
