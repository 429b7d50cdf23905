//! Playback module lifecycle and periodic runner.
//!
//! A [`JointControlModule`] owns the robot handle and the controller. Setup,
//! every cycle and shutdown all go through `&mut self`, so they can never
//! overlap. [`run`] drives `update()` at the configured period until it is
//! cancelled or a cycle fails, and then always closes the module.
//!
//! # Example
//!
//! ```no_run
//! use joint_playback::config::ModuleConfig;
//! use joint_playback::estimator::TcpPeerNetwork;
//! use joint_playback::events::EventSink;
//! use joint_playback::handshake::StartupHandshake;
//! use joint_playback::module::{run, JointControlModule};
//! use joint_playback::sim::{SimSettings, SimulatedRobot};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ModuleConfig::from_file("jointControl.json")?;
//! let network = TcpPeerNetwork::new(
//!     config.estimator.peers.clone(),
//!     config.connect_timeout(),
//!     config.reply_timeout(),
//! )?;
//! let handshake = StartupHandshake::new(network, config.estimator_names(), config.countdown());
//! let robot = SimulatedRobot::new(SimSettings::default());
//!
//! let mut module = JointControlModule::configure(&config, robot, handshake, EventSink::disabled())?;
//! let summary = run(&mut module, &CancellationToken::new())?;
//! println!("{} frames streamed", summary.frames_streamed);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::ModuleConfig;
use crate::controller::{CycleOutcome, PlaybackController};
use crate::coordinator;
use crate::dataset;
use crate::error::{ConfigureError, PlaybackError};
use crate::events::{EventSink, PlaybackEvent};
use crate::gate::{ReadinessGate, ReadinessState};
use crate::handshake::Handshake;
use crate::playback::PlaybackBuffer;
use crate::robot::{JointActuator, WrenchSensor};

pub struct JointControlModule<R, H>
where
    R: JointActuator + WrenchSensor,
    H: Handshake,
{
    name: String,
    period: Duration,
    robot: R,
    controller: PlaybackController<H>,
    events: EventSink,
    closed: bool,
}

impl<R, H> JointControlModule<R, H>
where
    R: JointActuator + WrenchSensor,
    H: Handshake,
{
    /// Load the dataset and bring the robot to its first frame in direct mode.
    ///
    /// On failure the robot is released and no module is returned.
    pub fn configure(
        config: &ModuleConfig,
        mut robot: R,
        handshake: H,
        events: EventSink,
    ) -> Result<Self, ConfigureError> {
        std::thread::sleep(config.pre_load_delay());

        let buffer = match load_and_prepare(config, &mut robot, &events) {
            Ok(buffer) => buffer,
            Err(e) => {
                release(&mut robot, &events);
                return Err(e);
            }
        };

        let controller = PlaybackController::new(
            buffer,
            ReadinessGate::new(config.trigger.contact_threshold),
            handshake,
            config.feedback_timeout(),
            events.clone(),
        );

        Ok(Self {
            name: config.general.name.clone(),
            period: config.period(),
            robot,
            controller,
            events,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Control period of the module.
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> ReadinessState {
        self.controller.state()
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    pub fn buffer(&self) -> &PlaybackBuffer {
        self.controller.buffer()
    }

    /// Run one control cycle.
    pub fn update(&mut self) -> Result<CycleOutcome, PlaybackError> {
        self.controller.step(&mut self.robot)
    }

    /// Restore the PID gains and close the robot connection. Safe to call twice.
    pub fn close(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let restored = self.robot.restore_gains();
        if restored.is_ok() {
            self.events.emit(PlaybackEvent::GainsRestored);
        }
        if let Err(e) = self.robot.close() {
            if let Err(ref restore) = restored {
                self.events.emit(PlaybackEvent::CleanupFailed {
                    step: "restore gains",
                    reason: format!("{:#}", restore),
                });
            }
            return Err(e);
        }
        self.events.emit(PlaybackEvent::Closed);
        restored
    }
}

impl<R, H> Drop for JointControlModule<R, H>
where
    R: JointActuator + WrenchSensor,
    H: Handshake,
{
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            self.events.emit(PlaybackEvent::CleanupFailed {
                step: "close",
                reason: format!("{:#}", e),
            });
        }
    }
}

fn load_and_prepare<R: JointActuator>(
    config: &ModuleConfig,
    robot: &mut R,
    events: &EventSink,
) -> Result<PlaybackBuffer, ConfigureError> {
    let path = config.dataset_path();
    let trajectory = dataset::load(&path, config.general.joint_count)?;
    events.emit(PlaybackEvent::DatasetLoaded {
        path,
        frames: trajectory.len(),
        joints: config.general.joint_count,
    });

    let buffer = PlaybackBuffer::new(trajectory);
    coordinator::prepare(robot, &buffer, &config.prepare_settings(), events)?;
    Ok(buffer)
}

/// Best-effort cleanup after a failed setup.
fn release<R: JointActuator>(robot: &mut R, events: &EventSink) {
    for (step, result) in [
        ("restore gains", robot.restore_gains()),
        ("close", robot.close()),
    ] {
        if let Err(e) = result {
            events.emit(PlaybackEvent::CleanupFailed {
                step,
                reason: format!("{:#}", e),
            });
        }
    }
}

/// Counters from a run that ended by cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub frames_streamed: u64,
    /// Cycles that finished after the next deadline had passed.
    pub overruns: u64,
}

/// Drive `module` at its period until `cancel` fires or a cycle fails.
///
/// Both ways out go through [`JointControlModule::close`]. A fatal cycle error
/// is returned even if the cleanup also fails.
pub fn run<R, H>(
    module: &mut JointControlModule<R, H>,
    cancel: &CancellationToken,
) -> Result<RunSummary, PlaybackError>
where
    R: JointActuator + WrenchSensor,
    H: Handshake,
{
    let period = module.period();
    let mut cycles = 0u64;
    let mut frames_streamed = 0u64;
    let mut overruns = 0u64;
    let mut next = Instant::now();

    let result = loop {
        if cancel.is_cancelled() {
            break Ok(());
        }
        match module.update() {
            Ok(outcome) => {
                cycles += 1;
                if let CycleOutcome::Streamed { .. } = outcome {
                    frames_streamed += 1;
                }
            }
            Err(e) => break Err(e),
        }

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            overruns += 1;
            tracing::debug!(
                "[{}] cycle overran by {:.1}ms",
                module.name(),
                (now - next).as_secs_f64() * 1000.0
            );
            next = now;
        }
    };

    if let Err(e) = module.close() {
        tracing::error!("[{}] Unable to close the module: {:#}", module.name(), e);
    }

    result.map(|()| RunSummary {
        cycles,
        frames_streamed,
        overruns,
    })
}
