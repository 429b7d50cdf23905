//! Simulated robot for running playback without hardware.
//!
//! Drop-in replacement for a real joint/force-torque driver. Smooth moves
//! finish after a fixed number of completion polls, direct commands are only
//! accepted in direct mode, and the feet read near-zero force until the
//! configured contact read, after which they carry roughly half the robot's
//! weight each.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::robot::{ControlMode, JointActuator, SensorSample, WrenchSensor};

/// Behaviour knobs for [`SimulatedRobot`].
#[derive(Clone, Debug)]
pub struct SimSettings {
    pub joint_count: usize,
    /// Completion polls needed before a smooth move reports done.
    pub polls_to_settle: u32,
    /// Feedback reads before the feet touch the ground. `None` = never.
    pub contact_after_reads: Option<u64>,
    /// Per-foot load once in contact, newtons.
    pub standing_force: f64,
    /// Amplitude of uniform sensor noise, newtons.
    pub force_noise: f64,
    /// Every n-th feedback read returns nothing. `None` = no dropouts.
    pub dropout_every: Option<u64>,
    pub seed: u64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            joint_count: crate::dataset::DEFAULT_JOINT_COUNT,
            polls_to_settle: 50,
            contact_after_reads: Some(100),
            standing_force: 160.0,
            force_noise: 5.0,
            dropout_every: None,
            seed: 0,
        }
    }
}

pub struct SimulatedRobot {
    settings: SimSettings,
    positions: Vec<f64>,
    target: Option<Vec<f64>>,
    polls_remaining: u32,
    mode: ControlMode,
    gains_modified: bool,
    closed: bool,
    reads: u64,
    direct_commands: u64,
    rng: StdRng,
}

impl SimulatedRobot {
    pub fn new(settings: SimSettings) -> Self {
        Self {
            positions: vec![0.0; settings.joint_count],
            target: None,
            polls_remaining: 0,
            mode: ControlMode::Position,
            gains_modified: false,
            closed: false,
            reads: 0,
            direct_commands: 0,
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
        }
    }

    /// Last commanded joint positions.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn gains_modified(&self) -> bool {
        self.gains_modified
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of accepted direct position commands.
    pub fn direct_commands(&self) -> u64 {
        self.direct_commands
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            anyhow::bail!("robot connection is closed");
        }
        Ok(())
    }

    fn check_width(&self, positions: &[f64]) -> Result<()> {
        if positions.len() != self.settings.joint_count {
            anyhow::bail!(
                "expected {} joint positions, got {}",
                self.settings.joint_count,
                positions.len()
            );
        }
        Ok(())
    }

    fn noise(&mut self) -> f64 {
        let amplitude = self.settings.force_noise;
        if amplitude > 0.0 {
            self.rng.random_range(-amplitude..amplitude)
        } else {
            0.0
        }
    }
}

impl JointActuator for SimulatedRobot {
    fn joint_count(&self) -> usize {
        self.settings.joint_count
    }

    fn set_position_references(&mut self, positions: &[f64], duration: Duration) -> Result<()> {
        self.ensure_open()?;
        self.check_width(positions)?;
        if self.mode != ControlMode::Position {
            anyhow::bail!("smooth moves need position mode, robot is in {}", self.mode);
        }
        tracing::debug!("Sim: moving to initial pose over {:?}", duration);
        self.target = Some(positions.to_vec());
        self.polls_remaining = self.settings.polls_to_settle;
        Ok(())
    }

    fn check_motion_done(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.polls_remaining > 0 {
            self.polls_remaining -= 1;
            return Ok(false);
        }
        if let Some(target) = self.target.take() {
            self.positions = target;
        }
        Ok(true)
    }

    fn switch_to_control_mode(&mut self, mode: ControlMode) -> Result<()> {
        self.ensure_open()?;
        self.mode = mode;
        // Direct mode runs with stiffer streaming gains.
        if mode == ControlMode::PositionDirect {
            self.gains_modified = true;
        }
        Ok(())
    }

    fn set_direct_position_references(&mut self, positions: &[f64]) -> Result<()> {
        self.ensure_open()?;
        self.check_width(positions)?;
        if self.mode != ControlMode::PositionDirect {
            anyhow::bail!("direct commands need position direct mode, robot is in {}", self.mode);
        }
        self.positions.copy_from_slice(positions);
        self.direct_commands += 1;
        Ok(())
    }

    fn restore_gains(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.gains_modified = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl WrenchSensor for SimulatedRobot {
    fn get_feedbacks(&mut self, _timeout: Duration) -> Result<Option<SensorSample>> {
        self.ensure_open()?;
        self.reads += 1;
        if let Some(n) = self.settings.dropout_every {
            if n > 0 && self.reads % n == 0 {
                return Ok(None);
            }
        }

        let in_contact = self
            .settings
            .contact_after_reads
            .is_some_and(|after| self.reads > after);
        let base = if in_contact {
            self.settings.standing_force
        } else {
            0.0
        };
        let left_force = base + self.noise();
        let right_force = base + self.noise();
        Ok(Some(SensorSample {
            left_force,
            right_force,
        }))
    }
}
