//! Agent combining the option-critic network, its target copy, the replay
//! buffer and the trial-based training loop.
use super::OptionCriticConfig;
use crate::{
    model::OptionCriticModel,
    opt::Optimizer,
    recording::save_gif,
    util::{done_to_tensor, load_bundle, obs_to_tensor, reward_to_tensor, save_bundle, track},
};
use anyhow::{bail, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::loss::mse;
use log::info;
use option_critic_core::{
    record::{Logger, Record, RecordValue},
    replay_buffer::{ReplayBuffer, TransitionBatch},
    Env, RenderMode,
};
use std::{collections::HashMap, fs::create_dir_all};

const REPLAY_BUFFER_FILE: &str = "replay_buffer.pickle";
const ENV_STATE_FILE: &str = "env.json";
const BEST_WINDOW: usize = 50;

/// One-step bootstrap target of an option-value head.
///
/// `target = reward + (1 - done) * gamma * ((1 - beta) * Q'_w + beta * V'_w)`
///
/// `done` zeroes the bootstrap on true termination only; step-limit
/// truncation must be masked to 0 before the transition is stored.
pub(crate) fn bellman_target(
    reward: &Tensor,
    done: &Tensor,
    gamma: f64,
    term_prob: &Tensor,
    next_q_omega: &Tensor,
    next_v_omega: &Tensor,
) -> Result<Tensor> {
    let utility = (((1f64 - term_prob)? * next_q_omega)? + (term_prob * next_v_omega)?)?;
    let bootstrap = (gamma * ((1f64 - done)? * utility)?)?;
    Ok((reward + bootstrap)?)
}

/// Option-critic agent with SAC-style updates.
///
/// Owns the environment, the live and target networks, a single optimizer
/// over all live parameters, the replay buffer and the logger. Training runs
/// in trials; each trial starts from freshly initialized networks and an
/// empty buffer.
pub struct OptionCritic<E, M>
where
    E: Env<Obs = Vec<f32>, Act = Vec<f32>>,
    M: OptionCriticModel,
{
    env: E,
    model: M,
    model_tgt: M,
    opt: Optimizer,
    replay_buffer: ReplayBuffer<Vec<f32>>,
    logger: Logger,
    config: OptionCriticConfig<M::Config>,
    device: Device,
    max_ep_len: usize,
    reward_threshold: Option<f32>,
    best_mean_reward: f32,
    n_updates: usize,
}

impl<E, M> OptionCritic<E, M>
where
    E: Env<Obs = Vec<f32>, Act = Vec<f32>>,
    M: OptionCriticModel,
{
    /// Builds the agent around an already constructed environment.
    pub fn build(env: E, config: OptionCriticConfig<M::Config>) -> Result<Self> {
        fastrand::seed(config.seed);
        let device: Device = config.device.into();

        let model = M::build(&config.model_config, &device)?;
        let model_tgt = M::build(&config.model_config, &device)?;
        track(model_tgt.varmap(), model.varmap(), 1.0)?;

        let opt = config.opt_config.build(model.varmap().all_vars())?;
        let replay_buffer = ReplayBuffer::build(&config.replay_buffer_config);
        let logger = Logger::new(Some(config.save_dir.clone()))?;

        let max_ep_len = env.max_episode_steps().unwrap_or(config.max_ep_len);
        let reward_threshold = env.reward_threshold();

        Ok(Self {
            env,
            model,
            model_tgt,
            opt,
            replay_buffer,
            logger,
            config,
            device,
            max_ep_len,
            reward_threshold,
            best_mean_reward: f32::NEG_INFINITY,
            n_updates: 0,
        })
    }

    /// Re-initializes networks, optimizer and replay buffer for a fresh trial.
    pub fn reinit_network(&mut self) -> Result<()> {
        self.best_mean_reward = f32::NEG_INFINITY;
        self.model = M::build(&self.config.model_config, &self.device)?;
        self.model_tgt = M::build(&self.config.model_config, &self.device)?;
        track(self.model_tgt.varmap(), self.model.varmap(), 1.0)?;
        self.opt = self.config.opt_config.build(self.model.varmap().all_vars())?;
        self.replay_buffer = ReplayBuffer::build(&self.config.replay_buffer_config);
        Ok(())
    }

    /// Moves the target parameters toward the live parameters.
    ///
    /// `p' = polyak * p' + (1 - polyak) * p`
    pub fn update_target_network(&mut self) -> Result<()> {
        track(
            self.model_tgt.varmap(),
            self.model.varmap(),
            1.0 - self.config.polyak,
        )
    }

    /// One gradient update of all heads from a sampled batch.
    fn sac_update(&mut self, batch: TransitionBatch<Vec<f32>>) -> Result<()> {
        let (obs, options, rewards, next_obs, is_terminated) = batch.unpack();
        let batch_size = options.len();
        let obs = obs_to_tensor(&obs, &self.device)?;
        let next_obs = obs_to_tensor(&next_obs, &self.device)?;
        let rewards = reward_to_tensor(&rewards, &self.device)?;
        let done = done_to_tensor(&is_terminated, &self.device)?;

        let idx: Vec<u32> = options.iter().map(|o| *o as u32).collect();
        let idx = Tensor::from_slice(&idx[..], (batch_size, 1), &self.device)?;

        let states = self.model.encode_state(&obs)?;
        let (_pi, logp) = self.model.policies(&states, &options)?;

        // Termination probabilities come from the live network; the
        // termination loss is their only gradient path.
        let term_prob = self
            .model
            .terminations(&next_obs)?
            .gather(&idx, D::Minus1)?
            .squeeze(D::Minus1)?;

        // Next states are encoded by the target network.
        let next_states = self.model_tgt.encode_state(&next_obs)?.detach();

        let next_q1 = self.model_tgt.q1(&next_states)?.detach();
        let next_v1_omega = next_q1.max(D::Minus1)?;
        let next_q1_omega = next_q1.gather(&idx, D::Minus1)?.squeeze(D::Minus1)?;
        let q1_u = bellman_target(
            &rewards,
            &done,
            self.config.gamma,
            &term_prob,
            &next_q1_omega,
            &next_v1_omega,
        )?;

        let next_q2 = self.model_tgt.q2(&next_states)?.detach();
        let next_v2_omega = next_q2.max(D::Minus1)?;
        let next_q2_omega = next_q2.gather(&idx, D::Minus1)?.squeeze(D::Minus1)?;
        let q2_u = bellman_target(
            &rewards,
            &done,
            self.config.gamma,
            &term_prob,
            &next_q2_omega,
            &next_v2_omega,
        )?;

        // SAC policy gradient with entropy regularization.
        let q_pi = q1_u.minimum(&q2_u)?.detach();
        let policy_loss = ((self.config.entropy_reg * &logp)? - &q_pi)?.mean_all()?;

        let next_q_omega = next_q1_omega.minimum(&next_q2_omega)?;
        let next_v_omega = next_v1_omega.minimum(&next_v2_omega)?;
        let adv = ((next_q_omega - next_v_omega)? + self.config.termination_reg)?.detach();
        let termination_loss = ((&term_prob * &adv)? * (1f64 - &done)?)?.mean_all()?;

        let q1_pred = self
            .model
            .q1(&states)?
            .gather(&idx, D::Minus1)?
            .squeeze(D::Minus1)?;
        let q2_pred = self
            .model
            .q2(&states)?
            .gather(&idx, D::Minus1)?
            .squeeze(D::Minus1)?;
        let loss_q1 = mse(&q1_pred, &q1_u.detach())?;
        let loss_q2 = mse(&q2_pred, &q2_u.detach())?;
        let loss_q = (&loss_q1 + &loss_q2)?;

        let loss = ((&policy_loss + &termination_loss)? + &loss_q)?;
        self.opt.backward_step(&loss)?;
        self.n_updates += 1;

        self.logger.store(Record::from_slice(&[
            ("loss_q1", RecordValue::Scalar(loss_q1.to_scalar::<f32>()?)),
            ("loss_q2", RecordValue::Scalar(loss_q2.to_scalar::<f32>()?)),
            ("loss_q", RecordValue::Scalar(loss_q.to_scalar::<f32>()?)),
            (
                "policy_loss",
                RecordValue::Scalar(policy_loss.to_scalar::<f32>()?),
            ),
            (
                "termination_loss",
                RecordValue::Scalar(termination_loss.to_scalar::<f32>()?),
            ),
        ]));

        self.update_target_network()
    }

    /// Runs one trial of `timesteps` environment steps.
    ///
    /// Returns early when the best rolling mean reward crosses the
    /// environment's reward threshold.
    pub fn learn_one_trial(&mut self, timesteps: usize, trial_num: usize) -> Result<()> {
        self.model.set_train(true);
        let mut obs = self.env.reset()?;
        let mut ep_ret = 0f32;
        let mut ep_len = 0usize;
        let mut curr_op_len = 0usize;
        let mut option_termination = true;
        let mut current_option = 0usize;
        let mut option_lengths: HashMap<usize, Vec<usize>> = HashMap::new();

        for timestep in 1..=timesteps {
            let epsilon = self.config.eps_schedule.value(timestep);

            if option_termination {
                option_lengths
                    .entry(current_option)
                    .or_insert_with(Vec::new)
                    .push(curr_op_len);
                current_option = self.model.get_option(&obs, epsilon)?;
                curr_op_len = 0;
            }

            let action = self.model.get_action(&obs, current_option)?;
            let step = self.env.step(&action);
            ep_ret += step.reward;
            ep_len += 1;
            curr_op_len += 1;

            // Ignore the termination signal if the episode just hit the
            // step limit, so the bootstrap survives truncation.
            let done = if ep_len == self.max_ep_len {
                false
            } else {
                step.is_terminated
            };
            self.replay_buffer
                .push(obs, current_option, step.reward, step.obs.clone(), done);

            obs = step.obs;
            option_termination = self
                .model
                .predict_option_termination(&obs, current_option)?;

            if self.replay_buffer.len() >= self.config.batch_size
                && timestep % self.config.update_every == 0
            {
                for _ in 0..self.config.update_every {
                    let batch = self.replay_buffer.sample(self.config.batch_size)?;
                    self.sac_update(batch)?;
                }
            }

            if step.is_terminated || ep_len == self.max_ep_len {
                option_lengths
                    .entry(current_option)
                    .or_insert_with(Vec::new)
                    .push(curr_op_len);
                let opt_len = {
                    let lens: Vec<usize> =
                        option_lengths.values().flatten().copied().collect();
                    lens.iter().sum::<usize>() as f32 / lens.len().max(1) as f32
                };
                self.logger.store(Record::from_slice(&[
                    ("ep_ret", RecordValue::Scalar(ep_ret)),
                    ("ep_len", RecordValue::Scalar(ep_len as f32)),
                    ("opt_len", RecordValue::Scalar(opt_len)),
                ]));
                info!("Episode reward: {} | Episode length: {}", ep_ret, ep_len);
                self.logger.dump()?;

                obs = self.env.reset()?;
                ep_ret = 0.0;
                ep_len = 0;
                curr_op_len = 0;
                option_termination = true;
                option_lengths = HashMap::new();

                let returns = self.logger.load_results(&["ep_ret"])?.remove(0);
                if !returns.is_empty() {
                    // Mean training reward over the last 50 episodes.
                    let n = returns.len().min(BEST_WINDOW);
                    let mean_reward =
                        returns[returns.len() - n..].iter().sum::<f32>() / n as f32;

                    if mean_reward > self.best_mean_reward {
                        info!(
                            "Num timesteps: {} | Best mean reward: {:.2} -> {:.2}",
                            timestep, self.best_mean_reward, mean_reward
                        );
                        self.best_mean_reward = mean_reward;
                        self.save_weights(false, Some(&format!("best_{}.pth", trial_num)))?;
                    }

                    if let Some(threshold) = self.reward_threshold {
                        if self.best_mean_reward >= threshold {
                            info!("Solved environment, stopping trial");
                            return Ok(());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs `num_trials` independent trials of `timesteps` steps each and
    /// keeps the weights of the best trial in `best.pth`.
    pub fn learn(&mut self, timesteps: usize, num_trials: usize) -> Result<()> {
        self.env.set_training(true);
        let mut best_reward_trial = f32::NEG_INFINITY;

        for trial in 0..num_trials {
            self.learn_one_trial(timesteps, trial + 1)?;

            if self.best_mean_reward > best_reward_trial {
                best_reward_trial = self.best_mean_reward;
                self.save_weights(true, None)?;
            }

            self.logger.reset()?;
            self.reinit_network()?;
            info!("Trial {}/{} complete", trial + 1, num_trials);
        }
        Ok(())
    }

    /// One greedy step of the option machinery, used by evaluation and test.
    fn greedy_step(
        &mut self,
        obs: &[f32],
        current_option: &mut usize,
        option_termination: bool,
    ) -> Result<Vec<f32>> {
        if option_termination {
            *current_option = self.model.get_option(obs, 0.0)?;
        }
        self.model.get_action(obs, *current_option)
    }

    /// Runs `num_test_episodes` episodes with greedy option selection and
    /// deterministic actions, logging `test_ep_ret` and `test_ep_len`.
    ///
    /// Returns the dumped record of evaluation metrics.
    pub fn evaluate_agent(&mut self) -> Result<Record> {
        self.env.set_training(false);
        self.model.set_train(false);

        for _ in 0..self.config.num_test_episodes {
            let mut obs = self.env.reset()?;
            let mut ep_ret = 0f32;
            let mut ep_len = 0usize;
            let mut current_option = 0usize;
            let mut option_termination = true;

            loop {
                let action = self.greedy_step(&obs, &mut current_option, option_termination)?;
                let step = self.env.step(&action);
                ep_ret += step.reward;
                ep_len += 1;
                obs = step.obs;
                option_termination = self
                    .model
                    .predict_option_termination(&obs, current_option)?;
                if step.is_terminated || ep_len == self.max_ep_len {
                    break;
                }
            }
            self.logger.store(Record::from_slice(&[
                ("test_ep_ret", RecordValue::Scalar(ep_ret)),
                ("test_ep_len", RecordValue::Scalar(ep_len as f32)),
            ]));
        }

        self.model.set_train(true);
        self.env.set_training(true);
        self.logger.dump()
    }

    /// Runs a single greedy episode, optionally rendering it and saving the
    /// frames as `recording.gif` under the save directory.
    ///
    /// Returns the episode return and length.
    pub fn test(
        &mut self,
        timesteps: Option<usize>,
        render: bool,
        record: bool,
    ) -> Result<(f32, usize)> {
        self.model.set_train(false);
        self.env.set_training(false);

        let mut obs = self.env.reset()?;
        let mut ep_ret = 0f32;
        let mut ep_len = 0usize;
        let mut current_option = 0usize;
        let mut option_termination = true;
        let mut frames = Vec::new();
        if record {
            frames.extend(self.env.render(RenderMode::RgbArray));
        }

        loop {
            let action = self.greedy_step(&obs, &mut current_option, option_termination)?;
            let step = self.env.step(&action);
            if record {
                frames.extend(self.env.render(RenderMode::RgbArray));
            } else if render {
                self.env.render(RenderMode::Human);
            }
            ep_ret += step.reward;
            ep_len += 1;
            obs = step.obs;
            option_termination = self
                .model
                .predict_option_termination(&obs, current_option)?;

            let finished = match timesteps {
                Some(t) => ep_len >= t,
                None => step.is_terminated || ep_len == self.max_ep_len,
            };
            if finished {
                break;
            }
        }

        if record && !frames.is_empty() {
            save_gif(&frames, self.config.save_dir.join("recording.gif"), 29)?;
        }

        self.env.set_training(true);
        self.model.set_train(true);
        Ok((ep_ret, ep_len))
    }

    /// Saves live and target weights, the replay buffer and the environment
    /// state under the save directory.
    ///
    /// The weights file is `best.pth` when `best` is set, `model_weights.pth`
    /// otherwise, unless `fname` overrides the name.
    pub fn save_weights(&mut self, best: bool, fname: Option<&str>) -> Result<()> {
        let fname = match (fname, best) {
            (Some(f), _) => f.to_string(),
            (None, true) => "best.pth".to_string(),
            (None, false) => "model_weights.pth".to_string(),
        };
        create_dir_all(&self.config.save_dir)?;
        let path = self.config.save_dir.join(&fname);

        save_bundle(
            &[
                ("oc", self.model.varmap()),
                ("oc_target", self.model_tgt.varmap()),
            ],
            &path,
        )?;
        self.replay_buffer
            .save(self.config.save_dir.join(REPLAY_BUFFER_FILE))?;
        self.env
            .save_state(&self.config.save_dir.join(ENV_STATE_FILE))?;
        info!("Checkpoint saved at {:?}", path);
        Ok(())
    }

    /// Restores weights and optionally the replay buffer from the save
    /// directory.
    ///
    /// Fails when the weights file is missing; a missing environment state
    /// file is tolerated.
    pub fn load_weights(&mut self, best: bool, load_buffer: bool) -> Result<()> {
        let fname = if best { "best.pth" } else { "model_weights.pth" };
        let path = self.config.save_dir.join(fname);
        if !path.is_file() {
            bail!("Checkpoint file not found at {:?}", path);
        }

        if load_buffer {
            self.replay_buffer
                .load(self.config.save_dir.join(REPLAY_BUFFER_FILE))?;
        }
        load_bundle(
            &[
                ("oc", self.model.varmap()),
                ("oc_target", self.model_tgt.varmap()),
            ],
            &path,
            &self.device,
        )?;

        let env_path = self.config.save_dir.join(ENV_STATE_FILE);
        if env_path.is_file() {
            self.env.load_state(&env_path)?;
            info!("Environment state loaded");
        }
        info!("Checkpoint loaded at {:?}", path);
        Ok(())
    }

    /// Number of transitions currently stored in the replay buffer.
    pub fn replay_len(&self) -> usize {
        self.replay_buffer.len()
    }

    /// Number of gradient updates performed so far.
    pub fn num_updates(&self) -> usize {
        self.n_updates
    }

    /// Best rolling mean episode reward of the current trial.
    pub fn best_mean_reward(&self) -> f32 {
        self.best_mean_reward
    }

    /// The live network.
    pub fn model(&self) -> &M {
        &self.model
    }
}
