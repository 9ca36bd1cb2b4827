//! Option-critic network.
mod base;
mod config;
pub use base::MlpOptionCritic;
pub use config::ModelConfig;

use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::VarMap;

/// Capability set of an option-critic network.
///
/// The network owns a shared state encoder, two option-value heads, a
/// termination head and per-option Gaussian policy heads. All tensor methods
/// operate on batches; the convenience methods at the bottom operate on a
/// single raw observation during rollouts.
pub trait OptionCriticModel: Sized {
    /// Configuration from which the network is built.
    type Config: Clone;

    /// Builds the network with freshly initialized parameters.
    fn build(config: &Self::Config, device: &Device) -> Result<Self>;

    /// Number of options.
    fn num_options(&self) -> usize;

    /// Variables of the network.
    fn varmap(&self) -> &VarMap;

    /// Encodes a batch of observations into latent states.
    fn encode_state(&self, obs: &Tensor) -> Result<Tensor>;

    /// Option values of the first critic head, shape `(batch, num_options)`.
    fn q1(&self, state: &Tensor) -> Result<Tensor>;

    /// Option values of the second critic head, shape `(batch, num_options)`.
    fn q2(&self, state: &Tensor) -> Result<Tensor>;

    /// Termination probabilities of a batch of observations,
    /// shape `(batch, num_options)`.
    fn terminations(&self, obs: &Tensor) -> Result<Tensor>;

    /// Samples actions and their log probabilities from the policies of the
    /// given options.
    ///
    /// Both returned tensors stay connected to the policy parameters.
    fn policies(&self, state: &Tensor, options: &[usize]) -> Result<(Tensor, Tensor)>;

    /// Epsilon-greedy option selection for a single observation.
    fn get_option(&self, obs: &[f32], epsilon: f64) -> Result<usize>;

    /// Samples an action for a single observation under the given option.
    ///
    /// In eval mode the distribution mean is returned instead of a sample.
    fn get_action(&self, obs: &[f32], option: usize) -> Result<Vec<f32>>;

    /// Samples whether the given option terminates at the observation.
    fn predict_option_termination(&self, obs: &[f32], option: usize) -> Result<bool>;

    /// Switches between stochastic (training) and deterministic (eval)
    /// action sampling.
    fn set_train(&mut self, train: bool);
}
