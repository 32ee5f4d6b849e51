//! CPAL microphone input for desktop platforms.
//!
//! `cpal::Stream` is not `Send` on every host, so each capture owns a
//! dedicated thread that builds the stream and keeps it alive until the
//! capture is closed. The input callback pushes mono samples into a
//! lock-free SPSC ring buffer drained by `read_available`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};

use super::input::{AudioInput, CaptureStream};
use crate::error::RecordingError;

/// Seconds of audio the ring buffer can hold between drains
const RING_SECONDS: usize = 2;

/// Default system input device
#[derive(Default)]
pub struct CpalInput {
    _unit: (),
}

impl CpalInput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioInput for CpalInput {
    fn open(&self, _sample_rate: u32) -> Result<Box<dyn CaptureStream>, RecordingError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, Consumer<f32>), RecordingError>>();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("cpal-capture".to_string())
            .spawn(move || {
                let stream = match build_input_stream() {
                    Ok((stream, rate, consumer)) => {
                        if let Err(err) = stream.play() {
                            let _ = ready_tx.send(Err(RecordingError::DeviceUnavailable {
                                reason: format!("failed to start input stream: {}", err),
                            }));
                            return;
                        }
                        let _ = ready_tx.send(Ok((rate, consumer)));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                while thread_running.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(20));
                }
                drop(stream);
            })
            .map_err(|e| RecordingError::DeviceUnavailable {
                reason: format!("failed to spawn capture thread: {}", e),
            })?;

        let (sample_rate, consumer) = ready_rx
            .recv()
            .map_err(|_| RecordingError::DeviceUnavailable {
                reason: "capture thread exited during startup".to_string(),
            })??;

        log::info!("[CpalInput] Capture started at {} Hz", sample_rate);

        Ok(Box::new(CpalCapture {
            sample_rate,
            consumer,
            running,
            thread: Some(thread),
        }))
    }
}

fn build_input_stream() -> Result<(cpal::Stream, u32, Consumer<f32>), RecordingError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RecordingError::DeviceUnavailable {
            reason: "No default input device found".to_string(),
        })?;

    let config = device
        .default_input_config()
        .map_err(|e| RecordingError::DeviceUnavailable {
            reason: format!("Failed to get default input config: {:?}", e),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let channels_count = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0;

    let (mut producer, consumer): (Producer<f32>, Consumer<f32>) =
        RingBuffer::new(sample_rate as usize * RING_SECONDS);

    let err_fn = |err| log::error!("[CpalInput] Input stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // De-interleave: keep the first channel, drop samples when full
                for frame in data.chunks(channels_count.max(1)) {
                    let _ = producer.push(frame.first().copied().unwrap_or(0.0));
                }
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(RecordingError::DeviceUnavailable {
                reason: "Only F32 sample format is currently supported for input".to_string(),
            })
        }
    }
    .map_err(|e| RecordingError::DeviceUnavailable {
        reason: format!("{:?}", e),
    })?;

    Ok((stream, sample_rate, consumer))
}

struct CpalCapture {
    sample_rate: u32,
    consumer: Consumer<f32>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_available(&mut self, out: &mut Vec<f32>) {
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
        }
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.close();
    }
}
