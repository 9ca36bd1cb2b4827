//! Ring buffer of transitions with uniform sampling.
use super::{ReplayBufferConfig, TransitionBatch};
use anyhow::{bail, Result};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
struct Transition<O> {
    obs: O,
    option: usize,
    reward: f32,
    next_obs: O,
    is_terminated: i8,
}

/// Snapshot of the buffer used for persistence.
#[derive(Deserialize, Serialize)]
struct ReplayBufferState<O> {
    capacity: usize,
    i: usize,
    seed: u64,
    transitions: Vec<Transition<O>>,
}

/// A uniformly sampled replay buffer of fixed capacity.
///
/// Pushing beyond the capacity overwrites the oldest transition.
pub struct ReplayBuffer<O> {
    capacity: usize,
    i: usize,
    seed: u64,
    transitions: Vec<Transition<O>>,
    rng: StdRng,
}

impl<O: Clone> ReplayBuffer<O> {
    /// Builds an empty buffer from its configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configured capacity is zero.
    pub fn build(config: &ReplayBufferConfig) -> Self {
        assert!(config.capacity > 0, "Replay buffer capacity must be > 0");
        Self {
            capacity: config.capacity,
            i: 0,
            seed: config.seed,
            transitions: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Returns the number of stored transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns `true` if no transition has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Returns the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a transition, overwriting the oldest one when full.
    pub fn push(&mut self, obs: O, option: usize, reward: f32, next_obs: O, is_terminated: bool) {
        let t = Transition {
            obs,
            option,
            reward,
            next_obs,
            is_terminated: is_terminated as i8,
        };
        if self.transitions.len() < self.capacity {
            self.transitions.push(t);
        } else {
            self.transitions[self.i] = t;
        }
        self.i = (self.i + 1) % self.capacity;
    }

    /// Samples `size` transitions uniformly with replacement.
    pub fn sample(&mut self, size: usize) -> Result<TransitionBatch<O>> {
        if self.transitions.is_empty() {
            bail!("Cannot sample from an empty replay buffer");
        }
        let n = self.transitions.len();
        let mut batch = TransitionBatch {
            obs: Vec::with_capacity(size),
            option: Vec::with_capacity(size),
            reward: Vec::with_capacity(size),
            next_obs: Vec::with_capacity(size),
            is_terminated: Vec::with_capacity(size),
        };
        for _ in 0..size {
            let ix = (self.rng.next_u32() as usize) % n;
            let t = &self.transitions[ix];
            batch.obs.push(t.obs.clone());
            batch.option.push(t.option);
            batch.reward.push(t.reward);
            batch.next_obs.push(t.next_obs.clone());
            batch.is_terminated.push(t.is_terminated);
        }
        Ok(batch)
    }

    /// Drops all transitions and reseeds the sampling RNG.
    pub fn clear(&mut self) {
        self.transitions.clear();
        self.i = 0;
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    /// Sum of all stored rewards. Convenient for checking eviction order.
    pub fn sum_rewards(&self) -> f32 {
        self.transitions.iter().map(|t| t.reward).sum()
    }
}

impl<O: Clone + Serialize + DeserializeOwned> ReplayBuffer<O> {
    /// Saves the buffer contents to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = ReplayBufferState {
            capacity: self.capacity,
            i: self.i,
            seed: self.seed,
            transitions: self.transitions.clone(),
        };
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), &state)?;
        Ok(())
    }

    /// Restores the buffer contents from a file.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::open(path)?;
        let state: ReplayBufferState<O> = bincode::deserialize_from(BufReader::new(file))?;
        self.capacity = state.capacity;
        self.i = state.i;
        self.seed = state.seed;
        self.transitions = state.transitions;
        self.rng = StdRng::seed_from_u64(self.seed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn obs(v: f32) -> Vec<f32> {
        vec![v]
    }

    fn filled(capacity: usize, n: usize) -> ReplayBuffer<Vec<f32>> {
        let config = ReplayBufferConfig::default().capacity(capacity);
        let mut buffer = ReplayBuffer::build(&config);
        for k in 0..n {
            buffer.push(obs(k as f32), k % 2, k as f32, obs(k as f32 + 1.0), false);
        }
        buffer
    }

    #[test]
    fn test_push_and_len() {
        let buffer = filled(10, 7);
        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.capacity(), 10);
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        // Rewards 0..=4 fill the buffer, 5 and 6 evict 0 and 1.
        let buffer = filled(5, 7);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.sum_rewards(), 2.0 + 3.0 + 4.0 + 5.0 + 6.0);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_zero_capacity_is_rejected() {
        let _: ReplayBuffer<Vec<f32>> =
            ReplayBuffer::build(&ReplayBufferConfig::default().capacity(0));
    }

    #[test]
    fn test_sample_from_empty_fails() {
        let mut buffer: ReplayBuffer<Vec<f32>> =
            ReplayBuffer::build(&ReplayBufferConfig::default());
        assert!(buffer.sample(4).is_err());
    }

    #[test]
    fn test_sample_batch_shape() {
        let mut buffer = filled(10, 3);
        let batch = buffer.sample(8).unwrap();
        assert_eq!(batch.len(), 8);
        assert_eq!(batch.obs.len(), 8);
        assert_eq!(batch.next_obs.len(), 8);
        for (o, n) in batch.obs.iter().zip(batch.next_obs.iter()) {
            assert_eq!(n[0], o[0] + 1.0);
        }
    }

    #[test]
    fn test_clear() {
        let mut buffer = filled(10, 5);
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.sample(1).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new("replay_buffer").unwrap();
        let path = dir.path().join("replay_buffer.pickle");

        let buffer = filled(5, 7);
        buffer.save(&path).unwrap();

        let mut restored: ReplayBuffer<Vec<f32>> =
            ReplayBuffer::build(&ReplayBufferConfig::default());
        restored.load(&path).unwrap();
        assert_eq!(restored.len(), 5);
        assert_eq!(restored.capacity(), 5);
        assert_eq!(restored.sum_rewards(), buffer.sum_rewards());

        // The restored buffer keeps evicting in insertion order.
        restored.push(obs(0.0), 0, 100.0, obs(1.0), false);
        assert_eq!(restored.sum_rewards(), 3.0 + 4.0 + 5.0 + 6.0 + 100.0);
    }
}
