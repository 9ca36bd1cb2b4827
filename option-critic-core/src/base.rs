//! Core traits and types.
mod env;
mod step;
pub use env::{Env, Frame, RenderMode};
pub use step::Step;

/// Observation of an environment.
pub trait Obs: Clone + std::fmt::Debug {
    /// Number of scalar elements in the observation.
    fn dim(&self) -> usize;
}

impl Obs for Vec<f32> {
    fn dim(&self) -> usize {
        self.len()
    }
}

/// Action on an environment.
pub trait Act: Clone + std::fmt::Debug {}

impl Act for Vec<f32> {}

/// Additional information attached to a [`Step`].
pub trait Info {}

impl Info for () {}
