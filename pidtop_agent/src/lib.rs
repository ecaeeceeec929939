//! Embeddable sampling agent for the `pidtop` diagnoser.
//!
//! A target process calls [`Agent::start`] once; the agent binds a loopback
//! TCP listener on an ephemeral port, publishes `pid -> port` in the
//! filesystem [`registry`], and answers one-shot sampling requests until
//! [`Agent::stop`] or process exit. The diagnoser finds it by pid alone.
//!
//! ```no_run
//! # async fn run() -> Result<(), pidtop_agent::AgentError> {
//! let agent = pidtop_agent::Agent::start(pidtop_agent::Options::default()).await?;
//! // ... application work ...
//! agent.stop();
//! # Ok(())
//! # }
//! ```

mod agent;
pub mod protocol;
pub mod registry;
mod sampler;

pub use agent::{Agent, AgentError, Options};
