//! Move to the first frame, then hand the joints over to direct control.
//!
//! Order matters on hardware: switching to direct mode before the robot has
//! reached the first frame would make the first streamed command a jump.

use std::time::{Duration, Instant};

use crate::error::PrepareError;
use crate::events::{EventSink, PlaybackEvent};
use crate::playback::PlaybackBuffer;
use crate::robot::{ControlMode, JointActuator};

/// Timing of the preparation sequence.
#[derive(Clone, Copy, Debug)]
pub struct PrepareSettings {
    /// Duration of the interpolated move to the first frame.
    pub initial_move: Duration,
    /// Give up waiting for the move after this long.
    pub motion_timeout: Duration,
    /// Pause between motion-done polls.
    pub poll_interval: Duration,
    /// Wait after the mode switch before declaring ready.
    pub settle: Duration,
}

impl Default for PrepareSettings {
    fn default() -> Self {
        Self {
            initial_move: Duration::from_secs(5),
            motion_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(10),
            settle: Duration::from_secs(2),
        }
    }
}

/// Bring the robot to the first frame of `buffer` and switch to direct mode.
pub fn prepare<A: JointActuator + ?Sized>(
    actuator: &mut A,
    buffer: &PlaybackBuffer,
    settings: &PrepareSettings,
    events: &EventSink,
) -> Result<(), PrepareError> {
    let first = buffer.first().map_err(|_| PrepareError::EmptyBuffer)?;
    let expected = actuator.joint_count();
    if first.len() != expected {
        return Err(PrepareError::JointCountMismatch {
            expected,
            found: first.len(),
        });
    }

    events.emit(PlaybackEvent::MovingToInitialPose {
        duration: settings.initial_move,
    });
    actuator
        .set_position_references(first, settings.initial_move)
        .map_err(PrepareError::InitialMoveFailed)?;

    let deadline = Instant::now() + settings.motion_timeout;
    let mut polls = 0u32;
    loop {
        polls = polls.saturating_add(1);
        if actuator
            .check_motion_done()
            .map_err(PrepareError::MotionCheckFailed)?
        {
            break;
        }
        if Instant::now() >= deadline {
            return Err(PrepareError::MotionTimeout(settings.motion_timeout));
        }
        std::thread::sleep(settings.poll_interval);
    }
    events.emit(PlaybackEvent::InitialPoseReached { polls });

    actuator
        .switch_to_control_mode(ControlMode::PositionDirect)
        .map_err(PrepareError::ModeSwitchFailed)?;
    events.emit(PlaybackEvent::ControlModeSwitched {
        mode: ControlMode::PositionDirect,
    });

    std::thread::sleep(settings.settle);
    events.emit(PlaybackEvent::ReadyToPlay);
    Ok(())
}
