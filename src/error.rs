//! Error types for trajectory playback.
//!
//! Setup errors ([`LoadError`], [`PrepareError`], [`ConfigureError`]) abort
//! configuration. [`PlaybackError`] is returned by a control cycle only when the
//! loop must stop. Soft conditions such as missing sensor feedback are never
//! errors; they show up as events instead.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from reading a trajectory dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The dataset file could not be opened.
    #[error("failed to open {}: {io}", .path.display())]
    FileNotFound { path: PathBuf, io: std::io::Error },

    /// Reading failed part way through the file.
    #[error("failed to read line {line}: {io}")]
    Read { line: usize, io: std::io::Error },

    /// A line does not have exactly the expected number of fields.
    #[error("malformed input on line {line}: expected {expected} fields, found {found}")]
    MalformedInput {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A token could not be parsed as a number.
    #[error("invalid number {token:?} on line {line}")]
    InvalidNumber { line: usize, token: String },

    /// A value parsed but is NaN or infinite.
    #[error("non-finite value in column {column} on line {line}")]
    NonFinite { line: usize, column: usize },

    /// The file contains no data lines.
    #[error("dataset contains no frames")]
    Empty,

    /// Zero fields per frame were requested.
    #[error("expected field count must be positive")]
    ZeroWidth,
}

/// Fatal errors from the one-time move to the initial pose and mode switch.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("cannot prepare from an empty trajectory")]
    EmptyBuffer,

    #[error("initial frame has {found} joints, robot has {expected}")]
    JointCountMismatch { expected: usize, found: usize },

    #[error("error while setting the initial position: {0:#}")]
    InitialMoveFailed(anyhow::Error),

    #[error("unable to check if the motion is done: {0:#}")]
    MotionCheckFailed(anyhow::Error),

    #[error("initial motion not done after {0:?}")]
    MotionTimeout(Duration),

    #[error("failed to switch to position direct: {0:#}")]
    ModeSwitchFailed(anyhow::Error),
}

/// Failures of the startup exchange with the estimation service.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("failed to connect to {name}: {reason:#}")]
    Connect { name: String, reason: anyhow::Error },

    #[error("failed to connect {from} to {to}: {reason:#}")]
    Redirect {
        from: String,
        to: String,
        reason: anyhow::Error,
    },

    #[error("command {command:?} failed: {reason:#}")]
    Command {
        command: String,
        reason: anyhow::Error,
    },
}

/// Fatal control-cycle errors. Any of these terminates the session.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("cannot read from an empty playback buffer")]
    EmptyBuffer,

    #[error("startup handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("error while sending frame {frame} to the robot: {reason:#}")]
    CommandFailed { frame: usize, reason: anyhow::Error },
}

/// Errors that keep a module from being configured.
#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Prepare(#[from] PrepareError),
}
