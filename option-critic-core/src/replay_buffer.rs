//! Replay buffer of option-critic transitions.
//!
//! Transitions `(obs, option, reward, next_obs, is_terminated)` are kept in a
//! fixed-capacity ring buffer; once the capacity is reached the oldest entry
//! is overwritten. Sampling is uniform.
mod base;
mod batch;
mod config;
pub use base::ReplayBuffer;
pub use batch::TransitionBatch;
pub use config::ReplayBufferConfig;
