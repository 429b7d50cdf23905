//! Per-cycle playback state machine.
//!
//! While idle, each cycle reads the foot sensors and checks the readiness
//! gate. The first time it passes, the startup handshake runs and the
//! controller becomes active for the rest of the session. While active, each
//! cycle streams the current frame and advances the buffer.

use std::time::Duration;

use crate::error::PlaybackError;
use crate::events::{EventSink, PlaybackEvent};
use crate::gate::{ReadinessGate, ReadinessState};
use crate::handshake::Handshake;
use crate::playback::PlaybackBuffer;
use crate::robot::{JointActuator, WrenchSensor};

/// What a successful cycle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No sensor data this cycle; try again next cycle.
    FeedbackUnavailable,
    /// Feedback read, contact not detected yet.
    Waiting,
    /// Contact detected and handshake done; streaming starts next cycle.
    Started,
    /// Frame `frame` was sent to the robot.
    Streamed { frame: usize },
}

pub struct PlaybackController<H> {
    state: ReadinessState,
    buffer: PlaybackBuffer,
    gate: ReadinessGate,
    handshake: H,
    feedback_timeout: Duration,
    events: EventSink,
    exhausted: bool,
}

impl<H: Handshake> PlaybackController<H> {
    pub fn new(
        buffer: PlaybackBuffer,
        gate: ReadinessGate,
        handshake: H,
        feedback_timeout: Duration,
        events: EventSink,
    ) -> Self {
        Self {
            state: ReadinessState::Idle,
            buffer,
            gate,
            handshake,
            feedback_timeout,
            events,
            exhausted: false,
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    pub fn buffer(&self) -> &PlaybackBuffer {
        &self.buffer
    }

    /// Run one control cycle.
    ///
    /// Only fatal conditions are errors; after one the loop must stop.
    pub fn step<R>(&mut self, robot: &mut R) -> Result<CycleOutcome, PlaybackError>
    where
        R: JointActuator + WrenchSensor + ?Sized,
    {
        match self.state {
            ReadinessState::Idle => self.wait_for_contact(robot),
            ReadinessState::Active => self.stream(robot),
        }
    }

    fn wait_for_contact<R>(&mut self, robot: &mut R) -> Result<CycleOutcome, PlaybackError>
    where
        R: WrenchSensor + ?Sized,
    {
        let sample = match robot.get_feedbacks(self.feedback_timeout) {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                self.events.emit(PlaybackEvent::FeedbackUnavailable {
                    reason: format!("no data within {:?}", self.feedback_timeout),
                });
                return Ok(CycleOutcome::FeedbackUnavailable);
            }
            Err(e) => {
                self.events.emit(PlaybackEvent::FeedbackUnavailable {
                    reason: format!("{:#}", e),
                });
                return Ok(CycleOutcome::FeedbackUnavailable);
            }
        };

        if !self.gate.evaluate_sample(&sample) {
            return Ok(CycleOutcome::Waiting);
        }

        self.events.emit(PlaybackEvent::ContactDetected {
            left_force: sample.left_force,
            right_force: sample.right_force,
        });
        self.handshake.run(&self.events)?;
        self.state = ReadinessState::Active;
        self.events.emit(PlaybackEvent::PlaybackStarted {
            frames: self.buffer.len(),
        });
        Ok(CycleOutcome::Started)
    }

    fn stream<R>(&mut self, robot: &mut R) -> Result<CycleOutcome, PlaybackError>
    where
        R: JointActuator + ?Sized,
    {
        let frame = self.buffer.position();
        let positions = self.buffer.current()?;
        if let Err(reason) = robot.set_direct_position_references(positions) {
            self.events.emit(PlaybackEvent::CommandFailed {
                frame,
                reason: format!("{:#}", reason),
            });
            return Err(PlaybackError::CommandFailed { frame, reason });
        }

        self.buffer.advance()?;
        if !self.exhausted && self.buffer.is_holding() {
            self.exhausted = true;
            self.events.emit(PlaybackEvent::TrajectoryExhausted {
                frame: self.buffer.position(),
            });
        }
        Ok(CycleOutcome::Streamed { frame })
    }
}
