//! Configuration of the option-critic agent.
use crate::{explorer::EpsilonSchedule, opt::OptimizerConfig, Device};
use anyhow::Result;
use option_critic_core::replay_buffer::ReplayBufferConfig;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Configuration of [`OptionCritic`](super::OptionCritic).
///
/// Generic over the configuration of the network so that agents can be
/// built over different [`OptionCriticModel`](crate::model::OptionCriticModel)
/// implementations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OptionCriticConfig<MC> {
    /// Configuration of the network.
    pub model_config: MC,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Configuration of the replay buffer.
    pub replay_buffer_config: ReplayBufferConfig,

    /// Discount factor.
    pub gamma: f64,

    /// Epsilon-greedy schedule over options.
    pub eps_schedule: EpsilonSchedule,

    /// Batch size of gradient updates.
    pub batch_size: usize,

    /// Number of environment steps between bursts of gradient updates.
    /// The ratio of env steps to gradient steps is locked to 1.
    pub update_every: usize,

    /// Regularization term added to the termination advantage.
    pub termination_reg: f64,

    /// Entropy regularization coefficient of the policy loss.
    pub entropy_reg: f64,

    /// Interpolation factor of the polyak averaging for target networks.
    pub polyak: f64,

    /// Fallback episode step limit when the environment does not define one.
    pub max_ep_len: usize,

    /// Number of episodes run by evaluation.
    pub num_test_episodes: usize,

    /// Directory receiving checkpoints and the progress log.
    pub save_dir: PathBuf,

    /// Seed of action and option sampling.
    pub seed: u64,

    /// Device on which the networks live.
    pub device: Device,
}

impl<MC: Default> Default for OptionCriticConfig<MC> {
    fn default() -> Self {
        Self {
            model_config: MC::default(),
            opt_config: OptimizerConfig::default(),
            replay_buffer_config: ReplayBufferConfig::default(),
            gamma: 0.99,
            eps_schedule: EpsilonSchedule::default(),
            batch_size: 100,
            update_every: 50,
            termination_reg: 0.01,
            entropy_reg: 0.2,
            polyak: 0.995,
            max_ep_len: 1000,
            num_test_episodes: 5,
            save_dir: PathBuf::from("./model"),
            seed: 0,
            device: Device::Cpu,
        }
    }
}

impl<MC> OptionCriticConfig<MC> {
    /// Sets the configuration of the network.
    pub fn model_config(mut self, v: MC) -> Self {
        self.model_config = v;
        self
    }

    /// Sets the configuration of the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the configuration of the replay buffer.
    pub fn replay_buffer_config(mut self, v: ReplayBufferConfig) -> Self {
        self.replay_buffer_config = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the epsilon-greedy schedule.
    pub fn eps_schedule(mut self, v: EpsilonSchedule) -> Self {
        self.eps_schedule = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the number of env steps between update bursts.
    pub fn update_every(mut self, v: usize) -> Self {
        self.update_every = v;
        self
    }

    /// Sets the termination regularization.
    pub fn termination_reg(mut self, v: f64) -> Self {
        self.termination_reg = v;
        self
    }

    /// Sets the entropy regularization coefficient.
    pub fn entropy_reg(mut self, v: f64) -> Self {
        self.entropy_reg = v;
        self
    }

    /// Sets the polyak interpolation factor.
    pub fn polyak(mut self, v: f64) -> Self {
        self.polyak = v;
        self
    }

    /// Sets the fallback episode step limit.
    pub fn max_ep_len(mut self, v: usize) -> Self {
        self.max_ep_len = v;
        self
    }

    /// Sets the number of evaluation episodes.
    pub fn num_test_episodes(mut self, v: usize) -> Self {
        self.num_test_episodes = v;
        self
    }

    /// Sets the save directory.
    pub fn save_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.save_dir = v.into();
        self
    }

    /// Sets the seed of action and option sampling.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }
}

impl<MC: Serialize + DeserializeOwned> OptionCriticConfig<MC> {
    /// Constructs [`OptionCriticConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`OptionCriticConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
