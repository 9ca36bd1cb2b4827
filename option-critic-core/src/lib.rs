#![warn(missing_docs)]
//! Core abstractions for option-critic reinforcement learning.
//!
//! This crate is backend-free: it defines the environment interface, the
//! transition replay buffer and the record/logger types that the agent crate
//! builds upon.
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{Act, Env, Frame, Info, Obs, RenderMode, Step};
