//! RecordingController: microphone capture lifecycle for one practice attempt.
//!
//! A recording owns two Tokio tasks: the elapsed ticker (1 s) and the level
//! ticker (100 ms). Both are spawned by `start()` and aborted together by
//! whichever path ends the recording (manual stop, auto-stop or cancel).
//! Every finalize path writes the capture into the same "finished" slot, so
//! the owner consumes it through `take_finished()` regardless of how the
//! recording ended.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::input::{AudioInput, CaptureStream};
use super::level::LevelMeter;
use super::wav::encode_wav;
use crate::config::RecordingConfig;
use crate::error::{log_recording_error, RecordingError};

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Manual,
    AutoStop,
}

/// Lifecycle notifications published by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    Started,
    Tick { elapsed_secs: u32 },
    Level { level: u8 },
    Stopped { duration_secs: u32, reason: StopReason },
    Cancelled,
}

/// Snapshot for the recording indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingStatus {
    pub is_recording: bool,
    pub elapsed_secs: u32,
    pub level: u8,
}

/// A finished capture, identical for manual stop and auto-stop
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// 16-bit mono PCM WAV
    pub wav: Vec<u8>,
    pub duration_secs: u32,
    pub sample_rate: u32,
    pub sample_count: usize,
    pub level_samples: Vec<u8>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl CapturedAudio {
    /// Bytes to submit for analysis; empty when nothing was captured
    pub fn payload(&self) -> &[u8] {
        if self.sample_count == 0 {
            &[]
        } else {
            &self.wav
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

struct ActiveRecording {
    stream: Box<dyn CaptureStream>,
    samples: Vec<f32>,
    level_samples: Vec<u8>,
    meter: LevelMeter,
    started_at: DateTime<Utc>,
    tickers: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct RecorderShared {
    active: Option<ActiveRecording>,
    finished: Option<CapturedAudio>,
    elapsed_secs: u32,
    level: u8,
}

struct RecorderCore {
    shared: Mutex<RecorderShared>,
    events: broadcast::Sender<RecordingEvent>,
    finished_notify: Notify,
    config: RecordingConfig,
}

impl RecorderCore {
    fn lock(&self) -> Result<MutexGuard<'_, RecorderShared>, RecordingError> {
        self.shared.lock().map_err(|_| RecordingError::LockPoisoned)
    }

    fn emit(&self, event: RecordingEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// End the active recording and park the capture in the finished slot.
    ///
    /// Returns false when nothing was recording.
    fn finalize(&self, reason: StopReason) -> Result<bool, RecordingError> {
        let mut shared = self.lock()?;
        let Some(mut active) = shared.active.take() else {
            return Ok(false);
        };

        for ticker in active.tickers.drain(..) {
            ticker.abort();
        }
        active.stream.read_available(&mut active.samples);
        active.stream.close();

        let sample_rate = active.stream.sample_rate();
        let duration_secs = shared.elapsed_secs;
        shared.level = 0;

        let wav = match encode_wav(&active.samples, sample_rate) {
            Ok(wav) => wav,
            Err(err) => {
                log_recording_error(&err, "finalize");
                return Err(err);
            }
        };

        shared.finished = Some(CapturedAudio {
            wav,
            duration_secs,
            sample_rate,
            sample_count: active.samples.len(),
            level_samples: std::mem::take(&mut active.level_samples),
            started_at: active.started_at,
            stopped_at: Utc::now(),
        });
        drop(shared);

        log::info!(
            "[RecordingController] Recording stopped ({:?}) after {}s",
            reason,
            duration_secs
        );
        self.emit(RecordingEvent::Stopped {
            duration_secs,
            reason,
        });
        self.finished_notify.notify_one();
        Ok(true)
    }

    fn on_elapsed_tick(&self) -> Result<bool, RecordingError> {
        let elapsed = {
            let mut shared = self.lock()?;
            if shared.active.is_none() {
                return Ok(false);
            }
            shared.elapsed_secs += 1;
            shared.elapsed_secs
        };
        self.emit(RecordingEvent::Tick {
            elapsed_secs: elapsed,
        });

        if elapsed >= self.config.max_duration_secs {
            log::info!(
                "[RecordingController] Maximum duration of {}s reached",
                self.config.max_duration_secs
            );
            self.finalize(StopReason::AutoStop)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn on_level_tick(&self) -> Result<bool, RecordingError> {
        let level = {
            let mut guard = self.lock()?;
            let shared = &mut *guard;
            let Some(active) = shared.active.as_mut() else {
                return Ok(false);
            };
            active.stream.read_available(&mut active.samples);
            let level = active.meter.level(&active.samples);
            active.level_samples.push(level);
            shared.level = level;
            level
        };
        tracing::trace!(level, "recording level");
        self.emit(RecordingEvent::Level { level });
        Ok(true)
    }
}

/// Owns the capture timers and the finished-capture slot
pub struct RecordingController {
    core: Arc<RecorderCore>,
    input: Arc<dyn AudioInput>,
}

impl RecordingController {
    pub fn new(input: Arc<dyn AudioInput>, config: RecordingConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            core: Arc::new(RecorderCore {
                shared: Mutex::new(RecorderShared::default()),
                events,
                finished_notify: Notify::new(),
                config,
            }),
            input,
        }
    }

    /// Begin capturing. Fails without spawning timers when the device or
    /// runtime is unavailable.
    pub fn start(&self) -> Result<(), RecordingError> {
        let handle = Handle::try_current().map_err(|_| RecordingError::RuntimeUnavailable)?;

        let mut shared = self.core.lock()?;
        if shared.active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let stream = self.input.open(self.core.config.sample_rate).map_err(|err| {
            log_recording_error(&err, "start");
            err
        })?;

        shared.elapsed_secs = 0;
        shared.level = 0;
        shared.finished = None;

        let tick = Duration::from_millis(self.core.config.tick_interval_ms.max(1));
        let level_tick = Duration::from_millis(self.core.config.level_interval_ms.max(1));
        let tickers = vec![
            spawn_ticker(&handle, Arc::downgrade(&self.core), tick, |core| {
                core.on_elapsed_tick()
            }),
            spawn_ticker(&handle, Arc::downgrade(&self.core), level_tick, |core| {
                core.on_level_tick()
            }),
        ];

        shared.active = Some(ActiveRecording {
            stream,
            samples: Vec::new(),
            level_samples: Vec::new(),
            meter: LevelMeter::new(self.core.config.level_window),
            started_at: Utc::now(),
            tickers,
        });
        drop(shared);

        log::info!(
            "[RecordingController] Recording started (max {}s)",
            self.core.config.max_duration_secs
        );
        self.core.emit(RecordingEvent::Started);
        Ok(())
    }

    /// Stop the running recording and hand back its capture.
    ///
    /// Returns `Ok(None)` when nothing is recording and no capture is waiting.
    pub fn stop(&self) -> Result<Option<CapturedAudio>, RecordingError> {
        self.core.finalize(StopReason::Manual)?;
        self.take_finished()
    }

    /// Take the finished capture, at most once per recording
    pub fn take_finished(&self) -> Result<Option<CapturedAudio>, RecordingError> {
        Ok(self.core.lock()?.finished.take())
    }

    /// Tear down timers and discard everything captured so far
    pub fn cancel(&self) -> Result<(), RecordingError> {
        let mut shared = self.core.lock()?;
        shared.finished = None;
        shared.level = 0;
        let Some(mut active) = shared.active.take() else {
            return Ok(());
        };
        for ticker in active.tickers.drain(..) {
            ticker.abort();
        }
        active.stream.close();
        drop(shared);

        log::debug!("[RecordingController] Recording cancelled");
        self.core.emit(RecordingEvent::Cancelled);
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.core
            .lock()
            .map(|shared| shared.active.is_some())
            .unwrap_or(false)
    }

    pub fn status(&self) -> Result<RecordingStatus, RecordingError> {
        let shared = self.core.lock()?;
        Ok(RecordingStatus {
            is_recording: shared.active.is_some(),
            elapsed_secs: shared.elapsed_secs,
            level: shared.level,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.core.events.subscribe()
    }

    /// Resolves after a capture lands in the finished slot
    pub async fn finished_notified(&self) {
        self.core.finished_notify.notified().await
    }

    /// Handle for waiting on finished captures from another task
    pub(crate) fn finished_waiter(&self) -> FinishedWaiter {
        FinishedWaiter {
            core: Arc::downgrade(&self.core),
        }
    }

    pub fn max_duration_secs(&self) -> u32 {
        self.core.config.max_duration_secs
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Err(err) = self.cancel() {
            log_recording_error(&err, "drop");
        }
    }
}

/// Weak handle to the finished-capture notification
pub(crate) struct FinishedWaiter {
    core: Weak<RecorderCore>,
}

impl FinishedWaiter {
    /// Wait for the next finished capture. Returns false once the
    /// controller is gone.
    pub(crate) async fn wait(&self) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        core.finished_notify.notified().await;
        true
    }
}

fn spawn_ticker<F>(
    handle: &Handle,
    core: Weak<RecorderCore>,
    period: Duration,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut(&RecorderCore) -> Result<bool, RecordingError> + Send + 'static,
{
    handle.spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(core) = core.upgrade() else {
                break;
            };
            match on_tick(&core) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    log_recording_error(&err, "ticker");
                    break;
                }
            }
        }
    })
}
