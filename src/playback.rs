//! Playback buffer with hold-last-frame semantics.
//!
//! The buffer is an immutable frame array plus a cursor. `advance()` moves the
//! cursor forward but never past the last frame, so once the data runs out the
//! robot keeps receiving the final pose instead of jumping back to the start.

use crate::dataset::{Frame, Trajectory};
use crate::error::PlaybackError;

#[derive(Clone, Debug)]
pub struct PlaybackBuffer {
    frames: Vec<Frame>,
    cursor: usize,
}

impl PlaybackBuffer {
    pub fn new(trajectory: Trajectory) -> Self {
        Self {
            frames: trajectory.into_frames(),
            cursor: 0,
        }
    }

    /// Frame under the cursor.
    pub fn current(&self) -> Result<&Frame, PlaybackError> {
        self.frames.get(self.cursor).ok_or(PlaybackError::EmptyBuffer)
    }

    /// First frame of the trajectory, regardless of the cursor.
    pub fn first(&self) -> Result<&Frame, PlaybackError> {
        self.frames.first().ok_or(PlaybackError::EmptyBuffer)
    }

    /// Move to the next frame, holding on the last one.
    pub fn advance(&mut self) -> Result<(), PlaybackError> {
        if self.frames.is_empty() {
            return Err(PlaybackError::EmptyBuffer);
        }
        self.cursor = (self.cursor + 1).min(self.frames.len() - 1);
        Ok(())
    }

    /// Index of the frame under the cursor.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True once the cursor sits on the last frame.
    pub fn is_holding(&self) -> bool {
        !self.frames.is_empty() && self.cursor == self.frames.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DEFAULT_JOINT_COUNT;

    fn buffer(values: &[f64]) -> PlaybackBuffer {
        let frames = values
            .iter()
            .map(|&v| Frame::filled(DEFAULT_JOINT_COUNT, v))
            .collect();
        PlaybackBuffer::new(Trajectory::from_frames(frames))
    }

    #[test]
    fn test_three_frame_scenario() {
        let mut buf = buffer(&[0.0, 1.0, 2.0]);
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(buf.current().unwrap()[0]);
            buf.advance().unwrap();
        }
        assert_eq!(seen, vec![0.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_tail_is_bit_identical() {
        let frames = vec![
            Frame::new(vec![0.1, 0.2, 0.3]),
            Frame::new(vec![-0.7, 1.0 / 3.0, 2.5e-9]),
        ];
        let last = frames[1].clone();
        let mut buf = PlaybackBuffer::new(Trajectory::from_frames(frames));

        for _ in 0..2 {
            buf.advance().unwrap();
        }
        for _ in 0..50 {
            let current = buf.current().unwrap();
            let bits: Vec<u64> = current.iter().map(|v| v.to_bits()).collect();
            let expected: Vec<u64> = last.iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits, expected);
            buf.advance().unwrap();
        }
        assert!(buf.is_holding());
        assert_eq!(buf.position(), 1);
    }

    #[test]
    fn test_first_ignores_cursor() {
        let mut buf = buffer(&[4.0, 5.0]);
        buf.advance().unwrap();
        assert_eq!(buf.first().unwrap()[0], 4.0);
        assert_eq!(buf.current().unwrap()[0], 5.0);
    }

    #[test]
    fn test_single_frame_holds_immediately() {
        let mut buf = buffer(&[9.0]);
        assert!(buf.is_holding());
        buf.advance().unwrap();
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.current().unwrap()[0], 9.0);
    }

    #[test]
    fn test_empty_buffer() {
        let mut buf = PlaybackBuffer::new(Trajectory::default());
        assert!(matches!(buf.current(), Err(PlaybackError::EmptyBuffer)));
        assert!(matches!(buf.advance(), Err(PlaybackError::EmptyBuffer)));
        assert!(matches!(buf.first(), Err(PlaybackError::EmptyBuffer)));
        assert_eq!(buf.position(), 0);
        assert!(!buf.is_holding());
    }
}
