//! Screen-observing desktop agent driven by a vision language model.
//!
//! The loop lives in [`agent`]; everything it touches on the machine goes
//! through the [`platform::Platform`] trait, and everything it asks the model
//! goes through [`model::ModelClient`].

pub mod actions;
pub mod agent;
pub mod artifacts;
pub mod capture;
pub mod catalog;
pub mod codec;
pub mod compositor;
pub mod conversation;
pub mod coords;
pub mod error;
pub mod keys;
pub mod logger;
pub mod model;
pub mod platform;
pub mod settings;
pub mod sleep;
pub mod types;

pub use agent::{Agent, AgentConfig, RunOutcome, StopReason};
pub use error::{Error, Result};
