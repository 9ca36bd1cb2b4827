//! Configuration of the MLP option-critic network.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`MlpOptionCritic`](super::MlpOptionCritic).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ModelConfig {
    /// Dimension of observations.
    pub obs_dim: usize,

    /// Dimension of actions.
    pub act_dim: usize,

    /// Number of options.
    pub num_options: usize,

    /// Dimension of the latent state produced by the encoder.
    pub latent_dim: usize,

    /// Hidden units of the encoder and of every head.
    pub hidden_units: Vec<usize>,

    /// Actions are scaled to `[-act_limit, act_limit]`.
    pub act_limit: f64,

    /// Lower clamp of the log standard deviation.
    pub min_lstd: f64,

    /// Upper clamp of the log standard deviation.
    pub max_lstd: f64,

    /// Stabilizer inside the squashing correction logarithm.
    pub epsilon: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            obs_dim: 0,
            act_dim: 0,
            num_options: 1,
            latent_dim: 64,
            hidden_units: vec![64, 64],
            act_limit: 1.0,
            min_lstd: -20.0,
            max_lstd: 2.0,
            epsilon: 1e-4,
        }
    }
}

impl ModelConfig {
    /// Sets the dimension of observations.
    pub fn obs_dim(mut self, v: usize) -> Self {
        self.obs_dim = v;
        self
    }

    /// Sets the dimension of actions.
    pub fn act_dim(mut self, v: usize) -> Self {
        self.act_dim = v;
        self
    }

    /// Sets the number of options.
    pub fn num_options(mut self, v: usize) -> Self {
        self.num_options = v;
        self
    }

    /// Sets the dimension of the latent state.
    pub fn latent_dim(mut self, v: usize) -> Self {
        self.latent_dim = v;
        self
    }

    /// Sets the hidden units of the encoder and heads.
    pub fn hidden_units(mut self, v: Vec<usize>) -> Self {
        self.hidden_units = v;
        self
    }

    /// Sets the action scale.
    pub fn act_limit(mut self, v: f64) -> Self {
        self.act_limit = v;
        self
    }

    /// Constructs [`ModelConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ModelConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
