//! Batches of sampled transitions.

/// A batch of transitions sampled from [`ReplayBuffer`](super::ReplayBuffer).
///
/// All fields are parallel vectors of the same length.
#[derive(Clone, Debug)]
pub struct TransitionBatch<O> {
    /// Observations `o_t`.
    pub obs: Vec<O>,

    /// Option indices active at `t`.
    pub option: Vec<usize>,

    /// Rewards `r_t`.
    pub reward: Vec<f32>,

    /// Observations `o_t+1`.
    pub next_obs: Vec<O>,

    /// Termination flags. Step-limit truncation is stored as 0 so that
    /// bootstrapping survives it.
    pub is_terminated: Vec<i8>,
}

impl<O> TransitionBatch<O> {
    /// Returns the number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Unpacks the batch into `(obs, option, reward, next_obs, is_terminated)`.
    pub fn unpack(self) -> (Vec<O>, Vec<usize>, Vec<f32>, Vec<O>, Vec<i8>) {
        (
            self.obs,
            self.option,
            self.reward,
            self.next_obs,
            self.is_terminated,
        )
    }
}
