//! Trajectory dataset loading.
//!
//! A dataset is a plain text file with one frame per line and one
//! whitespace-separated joint position per column:
//!
//! ```text
//! 0.00 0.12 -0.35 ...   <- frame 0, exactly `joint_count` values
//! 0.01 0.12 -0.34 ...   <- frame 1
//! ```
//!
//! Loading is all-or-nothing: a single bad line rejects the whole file.
//! Blank lines are ignored.
//!
//! # Example
//!
//! ```no_run
//! use joint_playback::dataset::{self, DEFAULT_JOINT_COUNT};
//!
//! let path = dataset::dataset_path(".", "walking");
//! let trajectory = dataset::load(&path, DEFAULT_JOINT_COUNT)?;
//! println!("{} frames", trajectory.len());
//! # Ok::<(), joint_playback::error::LoadError>(())
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Joint count of the full-body datasets.
pub const DEFAULT_JOINT_COUNT: usize = 23;

/// One timestep's joint-position vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame(Vec<f64>);

impl Frame {
    /// Create a frame from joint positions.
    pub fn new(positions: Vec<f64>) -> Self {
        Self(positions)
    }

    /// Create a frame with every joint at `value`.
    pub fn filled(joint_count: usize, value: f64) -> Self {
        Self(vec![value; joint_count])
    }

    /// Joint positions as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Deref for Frame {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for Frame {
    fn from(positions: Vec<f64>) -> Self {
        Self(positions)
    }
}

/// An ordered sequence of frames that all have the same width.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    frames: Vec<Frame>,
}

impl Trajectory {
    /// Build a trajectory from frames already in memory.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the trajectory has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Width of the frames, or `None` for an empty trajectory.
    pub fn joint_count(&self) -> Option<usize> {
        self.frames.first().map(|f| f.len())
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

/// Conventional location of a dataset: `<root>/txtDatasets/<type>/jointDataset.txt`.
pub fn dataset_path(root: impl AsRef<Path>, dataset_type: &str) -> PathBuf {
    root.as_ref()
        .join("txtDatasets")
        .join(dataset_type)
        .join("jointDataset.txt")
}

/// Load a dataset file, requiring exactly `expected_fields` values per line.
pub fn load(path: impl AsRef<Path>, expected_fields: usize) -> Result<Trajectory, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|io| LoadError::FileNotFound {
        path: path.to_path_buf(),
        io,
    })?;
    parse(BufReader::new(file), expected_fields)
}

/// Parse dataset text from any buffered reader.
pub fn parse<R: BufRead>(reader: R, expected_fields: usize) -> Result<Trajectory, LoadError> {
    if expected_fields == 0 {
        return Err(LoadError::ZeroWidth);
    }

    let mut frames = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|io| LoadError::Read { line: line_no, io })?;
        if line.trim().is_empty() {
            continue;
        }
        frames.push(parse_line(&line, line_no, expected_fields)?);
    }

    if frames.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(Trajectory { frames })
}

fn parse_line(line: &str, line_no: usize, expected_fields: usize) -> Result<Frame, LoadError> {
    let found = line.split_whitespace().count();
    if found != expected_fields {
        return Err(LoadError::MalformedInput {
            line: line_no,
            expected: expected_fields,
            found,
        });
    }

    let mut positions = Vec::with_capacity(expected_fields);
    for (column, token) in line.split_whitespace().enumerate() {
        let value: f64 = token.parse().map_err(|_| LoadError::InvalidNumber {
            line: line_no,
            token: token.to_string(),
        })?;
        if !value.is_finite() {
            return Err(LoadError::NonFinite {
                line: line_no,
                column: column + 1,
            });
        }
        positions.push(value);
    }
    Ok(Frame(positions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn row(value: f64, k: usize) -> String {
        vec![format!("{}", value); k].join(" ")
    }

    #[test]
    fn test_load_preserves_order_and_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jointDataset.txt");
        let mut file = File::create(&path).unwrap();
        for i in 0..7 {
            writeln!(file, "{}", row(i as f64 * 0.5, 4)).unwrap();
        }
        drop(file);

        let trajectory = load(&path, 4).unwrap();
        assert_eq!(trajectory.len(), 7);
        assert_eq!(trajectory.joint_count(), Some(4));
        for (i, frame) in trajectory.frames().iter().enumerate() {
            assert_eq!(frame.len(), 4);
            assert!(frame.iter().all(|&v| v == i as f64 * 0.5));
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("nope.txt"), 23).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));
    }

    #[test]
    fn test_short_line_rejects_everything() {
        let text = format!("{}\n{}\n{}\n", row(0.0, 23), row(1.0, 23), row(2.0, 22));
        let err = parse(Cursor::new(text), 23).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MalformedInput {
                line: 3,
                expected: 23,
                found: 22
            }
        ));
    }

    #[test]
    fn test_long_line_rejects_everything() {
        let text = format!("{}\n{}\n", row(0.0, 23), row(1.0, 24));
        let err = parse(Cursor::new(text), 23).unwrap_err();
        assert!(matches!(err, LoadError::MalformedInput { found: 24, .. }));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let text = format!("\n{}\n   \n{}\n\n", row(1.0, 3), row(2.0, 3));
        let trajectory = parse(Cursor::new(text), 3).unwrap();
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.frames()[1].as_slice(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_mixed_whitespace_and_exponents() {
        let trajectory = parse(Cursor::new("1e-3\t-2.5   +3\n"), 3).unwrap();
        assert_eq!(trajectory.frames()[0].as_slice(), &[1e-3, -2.5, 3.0]);
    }

    #[test]
    fn test_invalid_and_non_finite_tokens() {
        let err = parse(Cursor::new("1.0 abc 3.0\n"), 3).unwrap_err();
        assert!(matches!(err, LoadError::InvalidNumber { line: 1, ref token } if token == "abc"));

        let err = parse(Cursor::new("1.0 2.0 3.0\n1.0 NaN 3.0\n"), 3).unwrap_err();
        assert!(matches!(err, LoadError::NonFinite { line: 2, column: 2 }));
    }

    #[test]
    fn test_empty_input_and_zero_width() {
        assert!(matches!(
            parse(Cursor::new("\n\n"), 3).unwrap_err(),
            LoadError::Empty
        ));
        assert!(matches!(
            parse(Cursor::new("1 2 3\n"), 0).unwrap_err(),
            LoadError::ZeroWidth
        ));
    }

    #[test]
    fn test_dataset_path_layout() {
        let path = dataset_path("/data", "walking");
        assert_eq!(
            path,
            PathBuf::from("/data/txtDatasets/walking/jointDataset.txt")
        );
    }
}
