//! Shared fixtures for unit tests

use base64::{engine::general_purpose, Engine as _};
use std::io::Cursor;

/// 16-bit PCM WAV file holding a quiet 440Hz tone
pub fn wav_bytes(frames: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8_000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    bytes
}

/// `data:audio/wav;base64,...` locator for [`wav_bytes`]
pub fn wav_data_uri(frames: usize, sample_rate: u32, channels: u16) -> String {
    format!(
        "data:audio/wav;base64,{}",
        general_purpose::STANDARD.encode(wav_bytes(frames, sample_rate, channels))
    )
}

/// Track payload JSON as the dashboard stores it
pub fn track_payload(frames: usize, sample_rate: u32) -> String {
    serde_json::json!({
        "content": wav_data_uri(frames, sample_rate, 1),
        "filename": "tone.wav",
    })
    .to_string()
}
