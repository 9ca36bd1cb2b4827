//! Option-critic agent with SAC-style updates.
mod base;
mod config;
pub use base::OptionCritic;
pub use config::OptionCriticConfig;
