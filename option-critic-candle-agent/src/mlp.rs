//! Multilayer perceptron.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`].
pub struct MlpConfig {
    pub(crate) in_dim: usize,
    pub(crate) units: Vec<usize>,
    pub(crate) out_dim: usize,
    pub(crate) activation_out: bool,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `activation_out` - If `true`, activation function is added in the final layer.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize, activation_out: bool) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out,
        }
    }
}

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut in_out_pairs: Vec<(usize, usize)> = (0..config.units.len().saturating_sub(1))
        .map(|i| (config.units[i], config.units[i + 1]))
        .collect();
    if let Some(last) = config.units.last() {
        in_out_pairs.insert(0, (config.in_dim, config.units[0]));
        in_out_pairs.push((*last, config.out_dim));
    } else {
        in_out_pairs.push((config.in_dim, config.out_dim));
    }
    let vs = vs.pp(prefix);

    let mut layers = Vec::with_capacity(in_out_pairs.len());
    for (i, &(in_dim, out_dim)) in in_out_pairs.iter().enumerate() {
        layers.push(linear(in_dim, out_dim, vs.pp(format!("ln{}", i)))?);
    }
    Ok(layers)
}

fn mlp_forward(xs: &Tensor, layers: &[Linear]) -> Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs.clone();

    for layer in layers.iter().take(n_layers - 1) {
        xs = layer.forward(&xs)?.relu()?;
    }

    Ok(layers[n_layers - 1].forward(&xs)?)
}

/// Multilayer perceptron with ReLU activation function.
pub struct Mlp {
    config: MlpConfig,
    layers: Vec<Linear>,
}

impl Mlp {
    /// Builds an MLP with variables registered under `prefix`.
    pub fn build(vs: VarBuilder, prefix: &str, config: &MlpConfig) -> Result<Self> {
        let layers = create_linear_layers(prefix, vs, config)?;
        Ok(Self {
            config: config.clone(),
            layers,
        })
    }

    /// Applies the network.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = mlp_forward(xs, &self.layers)?;
        match self.config.activation_out {
            false => Ok(xs),
            true => Ok(xs.relu()?),
        }
    }

    /// Returns the output dimension.
    pub fn out_dim(&self) -> usize {
        self.config.out_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_forward_shape() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(4, vec![8, 8], 3, false);
        let mlp = Mlp::build(vb, "qf", &config)?;

        let xs = Tensor::randn(0f32, 1f32, (5, 4), &Device::Cpu)?;
        let ys = mlp.forward(&xs)?;
        assert_eq!(ys.dims(), &[5, 3]);
        Ok(())
    }

    #[test]
    fn test_no_hidden_layers() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(4, vec![], 2, false);
        let mlp = Mlp::build(vb, "qf", &config)?;

        let xs = Tensor::randn(0f32, 1f32, (1, 4), &Device::Cpu)?;
        assert_eq!(mlp.forward(&xs)?.dims(), &[1, 2]);
        Ok(())
    }
}
