// LevelMeter - input level in 0..=9 for the recording indicator
//
// Mirrors a browser analyser node: FFT magnitudes are mapped onto a byte
// scale over a fixed decibel window, averaged, and bucketed into ten steps.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Lower edge of the decibel window (maps to 0)
const MIN_DB: f32 = -100.0;
/// Upper edge of the decibel window (maps to 255)
const MAX_DB: f32 = -30.0;
/// Highest level reported
pub const MAX_LEVEL: u8 = 9;

pub struct LevelMeter {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl LevelMeter {
    /// Create a meter over the most recent `window_size` samples
    pub fn new(window_size: usize) -> Self {
        let size = window_size.max(2);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let window = (0..size)
            .map(|i| {
                0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()
            })
            .collect();

        Self {
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); size],
        }
    }

    /// Compute the level of the tail of `samples`
    ///
    /// Fewer samples than the window are zero-padded at the front.
    pub fn level(&mut self, samples: &[f32]) -> u8 {
        let size = self.window.len();
        let tail = &samples[samples.len().saturating_sub(size)..];
        let pad = size - tail.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let bins = size / 2;
        let byte_sum: f32 = self.buffer[..bins]
            .iter()
            .map(|c| {
                let magnitude = c.norm() / size as f32;
                let db = 20.0 * magnitude.max(1e-12).log10();
                ((db - MIN_DB) / (MAX_DB - MIN_DB) * 255.0).clamp(0.0, 255.0)
            })
            .sum();
        let average = byte_sum / bins as f32;

        ((average / 255.0 * 10.0).floor() as u8).min(MAX_LEVEL)
    }
}
