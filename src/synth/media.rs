//! Tiny binary fixtures built in memory.

use std::{f64::consts::TAU, sync::LazyLock};

use base64::{Engine, engine::general_purpose::STANDARD};

/// A valid 4x4 RGB PNG.
const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAQAAAAECAIAAAAmkwkpAAAAKUlEQVR4nA3HMQEAAAzCMIRVGGdFIXDLlyQSGxcTBIvjU6mt62cyOzcPp2MTQTYdST8AAAAASUVORK5CYII=";

static TINY_PNG: LazyLock<Vec<u8>> = LazyLock::new(|| {
    STANDARD
        .decode(TINY_PNG_BASE64)
        .unwrap_or_default()
});

/// Raw bytes of the 4x4 PNG.
pub fn tiny_png() -> &'static [u8] {
    &TINY_PNG
}

/// The 4x4 PNG as a `data:` URL for chat `image_url` parts.
pub fn tiny_png_data_url() -> String {
    format!("data:image/png;base64,{TINY_PNG_BASE64}")
}

/// The 4x4 PNG as a JSON byte array, the form `/run` image models accept.
pub fn tiny_png_byte_array() -> Vec<u8> {
    TINY_PNG.clone()
}

/// 16-bit little-endian mono PCM samples of a sine tone.
pub fn pcm_sine_wave(frequency_hz: f64, duration_ms: u32, sample_rate: u32) -> Vec<u8> {
    let samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1000) as usize;
    let amplitude = f64::from(i16::MAX) * 0.5;

    let mut pcm = Vec::with_capacity(samples * 2);
    for n in 0..samples {
        let t = n as f64 / f64::from(sample_rate);
        let sample = (amplitude * (TAU * frequency_hz * t).sin()) as i16;
        pcm.extend_from_slice(&sample.to_le_bytes());
    }
    pcm
}
