//! Structured playback events.
//!
//! The playback core reports what it is doing as [`PlaybackEvent`] values sent
//! through an [`EventSink`]. Formatting is left to whoever drains the channel;
//! [`spawn_event_logger`] turns events into `tracing` records.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::robot::ControlMode;

#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    DatasetLoaded {
        path: PathBuf,
        frames: usize,
        joints: usize,
    },
    MovingToInitialPose {
        duration: Duration,
    },
    InitialPoseReached {
        polls: u32,
    },
    ControlModeSwitched {
        mode: ControlMode,
    },
    ReadyToPlay,
    /// Soft failure: no sensor data this cycle.
    FeedbackUnavailable {
        reason: String,
    },
    ContactDetected {
        left_force: f64,
        right_force: f64,
    },
    EstimatorNotFound {
        name: String,
    },
    EstimatorConnected {
        name: String,
    },
    StreamRedirected {
        from: String,
        to: String,
    },
    EstimatorReplied {
        command: String,
        reply: String,
    },
    Countdown {
        remaining: u32,
    },
    PlaybackStarted {
        frames: usize,
    },
    /// The cursor reached the last frame; it is held from now on.
    TrajectoryExhausted {
        frame: usize,
    },
    CommandFailed {
        frame: usize,
        reason: String,
    },
    GainsRestored,
    /// Cleanup step that failed but did not stop the rest of the cleanup.
    CleanupFailed {
        step: &'static str,
        reason: String,
    },
    Closed,
}

/// Sending half of the event channel. Events are dropped when disabled or
/// when nobody listens.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PlaybackEvent>>,
}

impl EventSink {
    /// Create a connected sink and its receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: PlaybackEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Log a single event through `tracing`.
pub fn log_event(event: &PlaybackEvent) {
    match event {
        PlaybackEvent::DatasetLoaded {
            path,
            frames,
            joints,
        } => tracing::info!(
            "Loaded {} frames of {} joints from {}",
            frames,
            joints,
            path.display()
        ),
        PlaybackEvent::MovingToInitialPose { duration } => tracing::info!(
            "Moving to the initial pose over {:.1}s",
            duration.as_secs_f64()
        ),
        PlaybackEvent::InitialPoseReached { polls } => {
            tracing::info!("Initial pose reached ({} polls)", polls)
        }
        PlaybackEvent::ControlModeSwitched { mode } => {
            tracing::info!("Preparation completed. Switched to {}", mode)
        }
        PlaybackEvent::ReadyToPlay => tracing::info!("Ready to play!"),
        PlaybackEvent::FeedbackUnavailable { reason } => {
            tracing::debug!("No feedback this cycle: {}", reason)
        }
        PlaybackEvent::ContactDetected {
            left_force,
            right_force,
        } => tracing::info!(
            "Contact detected (left {:.1} N, right {:.1} N)",
            left_force,
            right_force
        ),
        PlaybackEvent::EstimatorNotFound { name } => {
            tracing::info!("{} not found, skipping estimator startup", name)
        }
        PlaybackEvent::EstimatorConnected { name } => tracing::info!("Connected to {}", name),
        PlaybackEvent::StreamRedirected { from, to } => {
            tracing::info!("Connected {} to {}", from, to)
        }
        PlaybackEvent::EstimatorReplied { command, reply } => {
            tracing::info!("Sent {}, received: {}", command, reply)
        }
        PlaybackEvent::Countdown { remaining } => tracing::info!("Starting.... {}", remaining),
        PlaybackEvent::PlaybackStarted { frames } => {
            tracing::info!("Playback started ({} frames)", frames)
        }
        PlaybackEvent::TrajectoryExhausted { frame } => {
            tracing::info!("End of trajectory, holding frame {}", frame)
        }
        PlaybackEvent::CommandFailed { frame, reason } => {
            tracing::error!("Error while sending frame {}: {}", frame, reason)
        }
        PlaybackEvent::GainsRestored => tracing::info!("PID gains restored"),
        PlaybackEvent::CleanupFailed { step, reason } => {
            tracing::error!("Cleanup step '{}' failed: {}", step, reason)
        }
        PlaybackEvent::Closed => tracing::info!("Connection with the robot closed"),
    }
}

/// Drain `rx` on a dedicated thread, logging every event.
///
/// The thread exits once every [`EventSink`] connected to `rx` is dropped.
pub fn spawn_event_logger(
    mut rx: mpsc::UnboundedReceiver<PlaybackEvent>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("playback-events".to_string())
        .spawn(move || {
            while let Some(event) = rx.blocking_recv() {
                log_event(&event);
            }
        })
}
