//! # joint-playback
//!
//! Replays a recorded joint-angle trajectory on a humanoid robot once both
//! feet are on the ground.
//!
//! ## Flow
//!
//! 1. [`dataset::load`] reads a whitespace-separated text file into a
//!    [`Trajectory`](dataset::Trajectory).
//! 2. [`coordinator::prepare`] moves the robot to the first frame and switches
//!    it to direct position control.
//! 3. Every cycle, [`PlaybackController`](controller::PlaybackController)
//!    either waits for foot contact ([`ReadinessGate`](gate::ReadinessGate)) or
//!    streams the next frame. On first contact it runs the
//!    [`StartupHandshake`](handshake::StartupHandshake), which starts the
//!    base estimator when one is reachable.
//! 4. [`module::run`] paces the cycles and always restores gains and closes
//!    the robot on the way out.
//!
//! Hardware is reached through the [`robot`] traits; [`sim::SimulatedRobot`]
//! implements them for testing without a robot.

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod events;
pub mod gate;
pub mod handshake;
pub mod module;
pub mod playback;
pub mod robot;
pub mod sim;

pub use config::ModuleConfig;
pub use controller::{CycleOutcome, PlaybackController};
pub use dataset::{Frame, Trajectory};
pub use error::{ConfigureError, HandshakeError, LoadError, PlaybackError, PrepareError};
pub use events::{EventSink, PlaybackEvent};
pub use module::{run, JointControlModule, RunSummary};
pub use robot::{ControlMode, JointActuator, SensorSample, WrenchSensor};
