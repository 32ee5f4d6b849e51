// Recording module - microphone capture for practice attempts
//
// input: device seam (AudioInput / CaptureStream) and the synthetic stub
// cpal_input: real microphone behind the `microphone` feature
// level: FFT level meter for the recording indicator
// wav: 16-bit PCM encoding of the finished capture
// controller: timers, auto-stop and the finished-capture slot

mod controller;
#[cfg(feature = "microphone")]
mod cpal_input;
mod input;
mod level;
mod wav;

pub use controller::{
    CapturedAudio, RecordingController, RecordingEvent, RecordingStatus, StopReason,
};
pub(crate) use controller::FinishedWaiter;
#[cfg(feature = "microphone")]
pub use cpal_input::CpalInput;
pub use input::{default_input, AudioInput, CaptureStream, SyntheticInput, UnavailableInput};
pub use level::{LevelMeter, MAX_LEVEL};
pub use wav::encode_wav;
