//! Robot collaborator traits.
//!
//! The playback core talks to hardware only through these traits. The joint
//! transport, force/torque acquisition and PID gain storage all live behind
//! them, so a real driver and [`SimulatedRobot`](crate::sim::SimulatedRobot)
//! can be used interchangeably.

use std::fmt;
use std::time::Duration;

/// Actuation mode of the joint controllers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    /// Interpolated moves to absolute targets.
    Position,
    /// Every command is applied immediately, without interpolation.
    PositionDirect,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Position => write!(f, "position"),
            ControlMode::PositionDirect => write!(f, "position direct"),
        }
    }
}

/// Vertical (z-axis) contact forces measured at the feet, in newtons.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorSample {
    pub left_force: f64,
    pub right_force: f64,
}

/// Position-control interface of the robot's joints.
///
/// # Example
///
/// ```no_run
/// use joint_playback::robot::{ControlMode, JointActuator};
///
/// fn start_streaming(robot: &mut impl JointActuator, pose: &[f64]) -> anyhow::Result<()> {
///     robot.switch_to_control_mode(ControlMode::PositionDirect)?;
///     robot.set_direct_position_references(pose)
/// }
/// ```
pub trait JointActuator: Send {
    /// Number of controlled joints.
    fn joint_count(&self) -> usize;

    /// Start a smooth move to `positions` that takes `duration`.
    fn set_position_references(&mut self, positions: &[f64], duration: Duration)
        -> anyhow::Result<()>;

    /// Check whether the last smooth move has finished.
    fn check_motion_done(&mut self) -> anyhow::Result<bool>;

    /// Switch every joint to `mode`.
    fn switch_to_control_mode(&mut self, mode: ControlMode) -> anyhow::Result<()>;

    /// Apply `positions` immediately. Only valid in direct mode.
    fn set_direct_position_references(&mut self, positions: &[f64]) -> anyhow::Result<()>;

    /// Put the PID gains back to the values read at startup.
    fn restore_gains(&mut self) -> anyhow::Result<()>;

    /// Release the connection to the robot.
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Foot force/torque sensors.
pub trait WrenchSensor: Send {
    /// Wait up to `timeout` for fresh feedback. Returns `None` when nothing
    /// arrived in time.
    fn get_feedbacks(&mut self, timeout: Duration) -> anyhow::Result<Option<SensorSample>>;
}
