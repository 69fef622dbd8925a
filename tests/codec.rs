//! WAV codec integration tests

use companion::Error;
use tokio_test::{assert_err, assert_ok};
use companion::voice::{SAMPLE_RATE, decode, encode, samples_to_wav};

mod common;
use common::{generate_sine_samples, wav_bytes};

#[test]
fn test_sixteen_bit_header_decodes_to_half_scale() {
    let data: Vec<u8> = [16384i16; 4].iter().flat_map(|s| s.to_le_bytes()).collect();

    let buffer = assert_ok!(decode(&wav_bytes(1, 16000, 16, &data)));

    assert_eq!(buffer.channels(), 1);
    assert_eq!(buffer.sample_rate(), 16000);
    assert_eq!(buffer.samples(), &[0.5; 4]);
}

#[test]
fn test_twenty_four_bit_is_unsupported() {
    let result = decode(&wav_bytes(1, 16000, 24, &[0; 24]));

    assert!(matches!(result, Err(Error::UnsupportedFormat(24))));
}

#[test]
#[allow(clippy::cast_precision_loss)]
fn test_round_trip_is_exact_for_pcm_values() {
    // Every value representable in 16-bit PCM survives unchanged
    let samples: Vec<f32> = (-32768i32..32768)
        .step_by(97)
        .map(|v| v as f32 / 32768.0)
        .collect();

    let buffer = decode(&encode(&samples, 1, 22050).unwrap()).unwrap();

    assert_eq!(buffer.sample_rate(), 22050);
    assert_eq!(buffer.samples(), samples.as_slice());
}

#[test]
fn test_round_trip_stereo_preserves_interleaving() {
    let samples = vec![0.25, -0.25, 0.5, -0.5, 0.0, 1.0 - 1.0 / 32768.0];

    let buffer = decode(&encode(&samples, 2, 44100).unwrap()).unwrap();

    assert_eq!(buffer.channels(), 2);
    assert_eq!(buffer.frames(), 3);
    assert_eq!(buffer.samples(), samples.as_slice());
}

#[test]
fn test_round_trip_sine_within_quantization() {
    let samples = generate_sine_samples(440.0, 0.25, 0.8);

    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();
    let buffer = decode(&wav).unwrap();

    assert_eq!(buffer.samples().len(), samples.len());
    for (original, decoded) in samples.iter().zip(buffer.samples()) {
        assert!((original - decoded).abs() <= 1.0 / 32768.0);
    }
}

#[test]
fn test_duration_follows_rate() {
    let samples = vec![0.0; 16000];

    let buffer = decode(&samples_to_wav(&samples, SAMPLE_RATE).unwrap()).unwrap();

    assert_eq!(buffer.duration().as_millis(), 1000);
}

#[test]
fn test_garbage_is_rejected() {
    assert!(matches!(assert_err!(decode(&[0u8; 64])), Error::Audio(_)));
    assert!(matches!(assert_err!(decode(&[])), Error::Audio(_)));
}
