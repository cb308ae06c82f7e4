#![deny(unreachable_pub)]

//! Mission-pad swarm pilot for Tello EDU drones.
//!
//! Drives a swarm of drones over the Tello UDP text protocol: each unit
//! runs an independent command/ack exchange on a shared control socket
//! while broadcast telemetry feeds a per-unit decision loop, and a
//! time-of-flight proximity guard can preempt everything with a forced
//! landing. See [`SwarmSession`] for the entry point.

mod command;
mod config;
mod control;
mod errors;
mod guard;
mod session;
mod strategy;
mod telemetry;
mod unit;

pub use command::Command;
pub use config::{DeadheadConfig, FollowConfig, SessionConfig};
pub use control::{Ack, AckOutcome, ControlChannel};
pub use errors::{Error, Result};
pub use guard::ProximityGuard;
pub use session::SwarmSession;
pub use strategy::{DeadheadNTimes, FindPadTask, FollowToEndPad, NextTask, SwarmStrategy};
pub use telemetry::{PadSighting, TelemetryChannel, TelemetryFrame};
pub use unit::{SensedState, TelloUnit};
