//! Audio input abstractions.
//!
//! `AudioInput` opens a capture stream for one recording attempt. The
//! controller pulls samples from the stream on every level tick and once
//! more when the recording is finalized.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use crate::error::RecordingError;

/// Opens capture streams on an input device.
pub trait AudioInput: Send + Sync {
    /// Open a mono capture stream, preferring `sample_rate`.
    fn open(&self, sample_rate: u32) -> Result<Box<dyn CaptureStream>, RecordingError>;
}

/// A running capture from an input device.
pub trait CaptureStream: Send {
    /// Actual sample rate of the delivered samples.
    fn sample_rate(&self) -> u32;

    /// Append every sample captured since the previous call to `out`.
    fn read_available(&mut self, out: &mut Vec<f32>);

    /// Release the device. Further reads return nothing.
    fn close(&mut self);
}

/// Desktop stub input producing broadband noise with a wandering amplitude.
///
/// Samples are generated against the Tokio clock, so paused-time tests get
/// exactly `elapsed * sample_rate` samples.
pub struct SyntheticInput {
    max_amplitude: f32,
    seed: Option<u64>,
}

impl SyntheticInput {
    pub fn new() -> Self {
        Self {
            max_amplitude: 0.5,
            seed: None,
        }
    }

    /// Input that only ever delivers digital silence
    pub fn silent() -> Self {
        Self {
            max_amplitude: 0.0,
            seed: None,
        }
    }

    /// Deterministic noise for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            max_amplitude: 0.5,
            seed: Some(seed),
        }
    }
}

impl Default for SyntheticInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput for SyntheticInput {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn CaptureStream>, RecordingError> {
        if sample_rate == 0 {
            return Err(RecordingError::DeviceUnavailable {
                reason: "sample rate must be greater than 0".to_string(),
            });
        }
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Box::new(SyntheticCapture {
            sample_rate,
            max_amplitude: self.max_amplitude,
            rng,
            opened_at: Instant::now(),
            delivered: 0,
            closed: false,
        }))
    }
}

struct SyntheticCapture {
    sample_rate: u32,
    max_amplitude: f32,
    rng: StdRng,
    opened_at: Instant,
    delivered: u64,
    closed: bool,
}

impl CaptureStream for SyntheticCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_available(&mut self, out: &mut Vec<f32>) {
        if self.closed {
            return;
        }
        let elapsed = self.opened_at.elapsed();
        let due = (elapsed.as_secs_f64() * self.sample_rate as f64) as u64;
        let pending = due.saturating_sub(self.delivered);
        if pending == 0 {
            return;
        }

        let amplitude = if self.max_amplitude > 0.0 {
            self.rng.gen_range(0.05..=1.0) * self.max_amplitude
        } else {
            0.0
        };
        out.reserve(pending as usize);
        for _ in 0..pending {
            let sample = if amplitude > 0.0 {
                self.rng.gen_range(-amplitude..=amplitude)
            } else {
                0.0
            };
            out.push(sample);
        }
        self.delivered = due;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Input that always fails to open, standing in for a missing or denied device
pub struct UnavailableInput {
    reason: String,
}

impl UnavailableInput {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AudioInput for UnavailableInput {
    fn open(&self, _sample_rate: u32) -> Result<Box<dyn CaptureStream>, RecordingError> {
        Err(RecordingError::DeviceUnavailable {
            reason: self.reason.clone(),
        })
    }
}

/// Platform default input
pub fn default_input() -> std::sync::Arc<dyn AudioInput> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "microphone")] {
            std::sync::Arc::new(super::cpal_input::CpalInput::new())
        } else {
            std::sync::Arc::new(SyntheticInput::new())
        }
    }
}
