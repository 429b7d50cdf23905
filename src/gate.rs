//! Foot-contact readiness gate.

use crate::robot::SensorSample;

/// Default contact threshold in newtons.
pub const DEFAULT_CONTACT_THRESHOLD: f64 = 100.0;

/// Whether playback is still waiting for contact or already streaming.
///
/// The only transition is `Idle -> Active`, once per session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadinessState {
    #[default]
    Idle,
    Active,
}

/// Decides if both feet are loaded enough to start playback.
///
/// The gate has no memory; the controller owns the one-shot transition.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessGate {
    threshold: f64,
}

impl ReadinessGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True iff both forces are strictly above the threshold.
    pub fn evaluate(&self, left_force: f64, right_force: f64) -> bool {
        left_force > self.threshold && right_force > self.threshold
    }

    pub fn evaluate_sample(&self, sample: &SensorSample) -> bool {
        self.evaluate(sample.left_force, sample.right_force)
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONTACT_THRESHOLD)
    }
}
