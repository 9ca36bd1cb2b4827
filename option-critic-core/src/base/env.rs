//! Environment.
use super::{Act, Info, Obs, Step};
use anyhow::Result;
use std::path::Path;

/// Rendering mode requested from an environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Render for a human watching in real time.
    Human,

    /// Return an RGB frame instead of displaying it.
    RgbArray,
}

/// A raw RGB frame returned by [`Env::render`].
#[derive(Clone, Debug)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Row-major RGB bytes, `3 * width * height` long.
    pub data: Vec<u8>,
}

/// Represents an environment, typically an MDP.
///
/// Episode truncation by step limit is decided by the caller from
/// [`Env::max_episode_steps`]; [`Step::is_terminated`] only reports true
/// termination.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performs an environment step.
    fn step(&mut self, act: &Self::Act) -> Step<Self>
    where
        Self: Sized;

    /// Step limit after which episodes are truncated, if any.
    fn max_episode_steps(&self) -> Option<usize> {
        None
    }

    /// Mean episode return at which the environment counts as solved, if any.
    fn reward_threshold(&self) -> Option<f32> {
        None
    }

    /// Toggles updates of normalization statistics around evaluation runs.
    fn set_training(&mut self, _train: bool) {}

    /// Renders the current state.
    ///
    /// Returns a [`Frame`] in [`RenderMode::RgbArray`] mode; environments
    /// without rendering support return `None`.
    fn render(&mut self, _mode: RenderMode) -> Option<Frame> {
        None
    }

    /// Persists normalization state as opaque JSON.
    fn save_state(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// Restores normalization state.
    ///
    /// A missing file is tolerated and leaves the defaults in place.
    fn load_state(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
