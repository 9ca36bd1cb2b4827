use anyhow::Result;
use option_critic_candle_agent::{
    model::{MlpOptionCritic, ModelConfig},
    option_critic::{OptionCritic, OptionCriticConfig},
};
use option_critic_core::{Env, Step};
use std::path::Path;
use tempdir::TempDir;

/// Deterministic 1-D environment. The position integrates the action,
/// every step yields reward 1 and episodes only end by the step limit.
struct ToyEnv {
    position: f32,
}

impl Env for ToyEnv {
    type Config = ();
    type Obs = Vec<f32>;
    type Act = Vec<f32>;
    type Info = ();

    fn build(_config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self { position: 0.0 })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.position = 0.0;
        Ok(vec![self.position])
    }

    fn step(&mut self, act: &Self::Act) -> Step<Self> {
        self.position += act[0];
        Step::new(vec![self.position], 1.0, false, ())
    }

    fn max_episode_steps(&self) -> Option<usize> {
        Some(5)
    }
}

fn config(save_dir: &Path) -> OptionCriticConfig<ModelConfig> {
    let model_config = ModelConfig::default()
        .obs_dim(1)
        .act_dim(1)
        .num_options(2)
        .latent_dim(4)
        .hidden_units(vec![4]);
    OptionCriticConfig::default()
        .model_config(model_config)
        .batch_size(4)
        .update_every(5)
        .save_dir(save_dir)
        .seed(42)
}

fn agent(save_dir: &Path) -> Result<OptionCritic<ToyEnv, MlpOptionCritic>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let env = ToyEnv::build(&(), 0)?;
    OptionCritic::build(env, config(save_dir))
}

#[test]
fn test_learn_one_trial() -> Result<()> {
    let dir = TempDir::new("option_critic")?;
    let mut agent = agent(dir.path())?;

    agent.learn_one_trial(20, 1)?;

    // 20 steps stored, and a burst of 5 updates every 5 steps once the
    // buffer holds a batch.
    assert_eq!(agent.replay_len(), 20);
    assert_eq!(agent.num_updates(), 20);

    // Four truncated episodes of return 5 were logged, so the best rolling
    // mean is 5 and a per-trial checkpoint exists.
    assert_eq!(agent.best_mean_reward(), 5.0);
    assert!(dir.path().join("best_1.pth").exists());
    assert!(dir.path().join("replay_buffer.pickle").exists());
    assert!(dir.path().join("progress.json").exists());
    Ok(())
}

#[test]
fn test_reinit_network() -> Result<()> {
    let dir = TempDir::new("option_critic")?;
    let mut agent = agent(dir.path())?;

    agent.learn_one_trial(10, 1)?;
    assert!(agent.replay_len() > 0);

    agent.reinit_network()?;
    assert_eq!(agent.replay_len(), 0);
    assert_eq!(agent.best_mean_reward(), f32::NEG_INFINITY);
    Ok(())
}

#[test]
fn test_learn_saves_best_across_trials() -> Result<()> {
    let dir = TempDir::new("option_critic")?;
    let mut agent = agent(dir.path())?;

    agent.learn(10, 2)?;

    assert!(dir.path().join("best.pth").exists());
    // The buffer was cleared by the reinit after the last trial.
    assert_eq!(agent.replay_len(), 0);
    Ok(())
}

#[test]
fn test_save_and_load_weights() -> Result<()> {
    let dir = TempDir::new("option_critic")?;
    let mut agent = agent(dir.path())?;

    agent.learn_one_trial(10, 1)?;
    agent.save_weights(false, None)?;
    assert!(dir.path().join("model_weights.pth").exists());

    agent.load_weights(false, true)?;
    assert_eq!(agent.replay_len(), 10);
    Ok(())
}

#[test]
fn test_load_missing_checkpoint_fails() -> Result<()> {
    let dir = TempDir::new("option_critic")?;
    let mut agent = agent(dir.path())?;

    assert!(agent.load_weights(true, false).is_err());
    Ok(())
}

#[test]
fn test_evaluate_agent() -> Result<()> {
    let dir = TempDir::new("option_critic")?;
    let mut agent = agent(dir.path())?;

    // Evaluation metrics are dumped immediately, not deferred to the next
    // training-episode dump.
    let record = agent.evaluate_agent()?;
    assert_eq!(record.get_scalar("test_ep_len")?, 5.0);
    assert!(record.get_scalar("test_ep_ret").is_ok());
    Ok(())
}

#[test]
fn test_single_episode() -> Result<()> {
    let dir = TempDir::new("option_critic")?;
    let mut agent = agent(dir.path())?;

    let (ep_ret, ep_len) = agent.test(None, false, false)?;
    assert_eq!(ep_len, 5);
    assert_eq!(ep_ret, 5.0);
    Ok(())
}
