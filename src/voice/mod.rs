//! Audio handling
//!
//! WAV encoding/decoding, microphone capture, and speaker playback.

mod capture;
pub mod codec;
mod playback;

pub use capture::{AudioCapture, SAMPLE_RATE};
pub use codec::{AudioBuffer, decode, encode, samples_to_wav};
pub use playback::{AudioSink, Speaker};
