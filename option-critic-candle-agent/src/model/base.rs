//! MLP implementation of the option-critic network.
use super::{ModelConfig, OptionCriticModel};
use crate::{
    mlp::{Mlp, MlpConfig},
    util::flat_argmax,
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{ops::sigmoid, VarBuilder, VarMap};

fn normal_logp(x: &Tensor) -> Result<Tensor> {
    let tmp: Tensor =
        ((-0.5 * (2.0 * std::f32::consts::PI).ln() as f64) - (0.5 * x.powf(2.0)?)?)?;
    Ok(tmp.sum(D::Minus1)?)
}

/// Option-critic network with MLP encoder and heads.
///
/// A shared encoder maps observations to latent states. On top of it sit two
/// option-value heads, a termination head and per-option Gaussian policy
/// heads, all over the same latent. All parameters live in a single
/// [`VarMap`] so one optimizer updates the whole network.
pub struct MlpOptionCritic {
    config: ModelConfig,
    device: Device,
    varmap: VarMap,
    encoder: Mlp,
    pi_mean: Mlp,
    pi_lstd: Mlp,
    qf1: Mlp,
    qf2: Mlp,
    beta: Mlp,
    train: bool,
}

impl MlpOptionCritic {
    fn obs_to_tensor(&self, obs: &[f32]) -> Result<Tensor> {
        Ok(Tensor::from_slice(obs, (1, obs.len()), &self.device)?)
    }

    /// Mean and std of the policy of one option for a single latent state.
    fn policy_params(&self, state: &Tensor, option: usize) -> Result<(Tensor, Tensor)> {
        let n = self.config.num_options;
        let act_dim = self.config.act_dim;
        let mean = self
            .pi_mean
            .forward(state)?
            .reshape((n, act_dim))?
            .narrow(0, option, 1)?
            .squeeze(0)?;
        let lstd = self
            .pi_lstd
            .forward(state)?
            .reshape((n, act_dim))?
            .narrow(0, option, 1)?
            .squeeze(0)?;
        let std = lstd
            .clamp(self.config.min_lstd, self.config.max_lstd)?
            .exp()?;
        Ok((mean, std))
    }
}

impl OptionCriticModel for MlpOptionCritic {
    type Config = ModelConfig;

    fn build(config: &ModelConfig, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let n = config.num_options;
        let units = config.hidden_units.clone();

        let encoder = Mlp::build(
            vb.clone(),
            "encoder",
            &MlpConfig::new(config.obs_dim, units.clone(), config.latent_dim, true),
        )?;
        let pi_mean = Mlp::build(
            vb.clone(),
            "pi_mean",
            &MlpConfig::new(
                config.latent_dim,
                units.clone(),
                n * config.act_dim,
                false,
            ),
        )?;
        let pi_lstd = Mlp::build(
            vb.clone(),
            "pi_lstd",
            &MlpConfig::new(
                config.latent_dim,
                units.clone(),
                n * config.act_dim,
                false,
            ),
        )?;
        let qf1 = Mlp::build(
            vb.clone(),
            "qf1",
            &MlpConfig::new(config.latent_dim, units.clone(), n, false),
        )?;
        let qf2 = Mlp::build(
            vb.clone(),
            "qf2",
            &MlpConfig::new(config.latent_dim, units.clone(), n, false),
        )?;
        let beta = Mlp::build(
            vb,
            "beta",
            &MlpConfig::new(config.latent_dim, units, n, false),
        )?;

        Ok(Self {
            config: config.clone(),
            device: device.clone(),
            varmap,
            encoder,
            pi_mean,
            pi_lstd,
            qf1,
            qf2,
            beta,
            train: true,
        })
    }

    fn num_options(&self) -> usize {
        self.config.num_options
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn encode_state(&self, obs: &Tensor) -> Result<Tensor> {
        self.encoder.forward(obs)
    }

    fn q1(&self, state: &Tensor) -> Result<Tensor> {
        self.qf1.forward(state)
    }

    fn q2(&self, state: &Tensor) -> Result<Tensor> {
        self.qf2.forward(state)
    }

    fn terminations(&self, obs: &Tensor) -> Result<Tensor> {
        let state = self.encode_state(obs)?;
        Ok(sigmoid(&self.beta.forward(&state)?)?)
    }

    fn policies(&self, state: &Tensor, options: &[usize]) -> Result<(Tensor, Tensor)> {
        let b = options.len();
        let n = self.config.num_options;
        let act_dim = self.config.act_dim;

        let idx: Vec<u32> = options.iter().map(|o| *o as u32).collect();
        let idx = Tensor::from_slice(&idx[..], (b, 1, 1), &self.device)?
            .expand((b, 1, act_dim))?
            .contiguous()?;

        let mean = self
            .pi_mean
            .forward(state)?
            .reshape((b, n, act_dim))?
            .gather(&idx, 1)?
            .squeeze(1)?;
        let lstd = self
            .pi_lstd
            .forward(state)?
            .reshape((b, n, act_dim))?
            .gather(&idx, 1)?
            .squeeze(1)?;

        let std = lstd
            .clamp(self.config.min_lstd, self.config.max_lstd)?
            .exp()?;
        let z = Tensor::randn(0f32, 1f32, mean.dims(), &self.device)?;
        let a = (&std * &z + &mean)?.tanh()?;
        let log_p = (normal_logp(&z)?
            - ((1f64 - a.powf(2.0)?)? + self.config.epsilon)?
                .log()?
                .sum(D::Minus1)?)?;
        let pi = (self.config.act_limit * a)?;

        Ok((pi, log_p))
    }

    fn get_option(&self, obs: &[f32], epsilon: f64) -> Result<usize> {
        if fastrand::f64() < epsilon {
            return Ok(fastrand::usize(..self.config.num_options));
        }
        let obs = self.obs_to_tensor(obs)?;
        let state = self.encode_state(&obs)?;
        let q = self.q1(&state)?.minimum(&self.q2(&state)?)?.detach();
        flat_argmax(&q)
    }

    fn get_action(&self, obs: &[f32], option: usize) -> Result<Vec<f32>> {
        let obs = self.obs_to_tensor(obs)?;
        let state = self.encode_state(&obs)?;
        let (mean, std) = self.policy_params(&state, option)?;
        let a = if self.train {
            let z = Tensor::randn(0f32, 1f32, mean.dims(), &self.device)?;
            (std * z + mean)?
        } else {
            mean
        };
        let a = (self.config.act_limit * a.tanh()?)?.detach();
        Ok(a.to_vec1::<f32>()?)
    }

    fn predict_option_termination(&self, obs: &[f32], option: usize) -> Result<bool> {
        let obs = self.obs_to_tensor(obs)?;
        let probs = self.terminations(&obs)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(fastrand::f64() < probs[option] as f64)
    }

    fn set_train(&mut self, train: bool) {
        self.train = train;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig::default()
            .obs_dim(3)
            .act_dim(2)
            .num_options(4)
            .latent_dim(8)
            .hidden_units(vec![8])
    }

    fn model() -> MlpOptionCritic {
        MlpOptionCritic::build(&config(), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_head_shapes() -> Result<()> {
        let m = model();
        let obs = Tensor::randn(0f32, 1f32, (5, 3), &Device::Cpu)?;
        let state = m.encode_state(&obs)?;
        assert_eq!(state.dims(), &[5, 8]);
        assert_eq!(m.q1(&state)?.dims(), &[5, 4]);
        assert_eq!(m.q2(&state)?.dims(), &[5, 4]);
        assert_eq!(m.terminations(&obs)?.dims(), &[5, 4]);
        Ok(())
    }

    #[test]
    fn test_terminations_are_probabilities() -> Result<()> {
        let m = model();
        let obs = Tensor::randn(0f32, 1f32, (5, 3), &Device::Cpu)?;
        for p in m.terminations(&obs)?.flatten_all()?.to_vec1::<f32>()? {
            assert!(p > 0.0 && p < 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_policies_shapes() -> Result<()> {
        let m = model();
        let obs = Tensor::randn(0f32, 1f32, (5, 3), &Device::Cpu)?;
        let state = m.encode_state(&obs)?;
        let (pi, log_p) = m.policies(&state, &[0, 1, 2, 3, 0])?;
        assert_eq!(pi.dims(), &[5, 2]);
        assert_eq!(log_p.dims(), &[5]);
        Ok(())
    }

    #[test]
    fn test_action_within_limit() -> Result<()> {
        let m = model();
        let act = m.get_action(&[0.1, -0.2, 0.3], 2)?;
        assert_eq!(act.len(), 2);
        for a in act {
            assert!(a.abs() <= 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_greedy_option_in_range() -> Result<()> {
        let m = model();
        let option = m.get_option(&[0.1, -0.2, 0.3], 0.0)?;
        assert!(option < 4);
        Ok(())
    }

    #[test]
    fn test_random_option_in_range() -> Result<()> {
        let m = model();
        for _ in 0..20 {
            assert!(m.get_option(&[0.0, 0.0, 0.0], 1.0)? < 4);
        }
        Ok(())
    }
}
