//! Decoded PCM sample storage
//!
//! A [`DecodedBuffer`] is the randomly-accessible result of decoding one
//! track payload. It is immutable once built and shared between the source
//! nodes that play it through an `Arc`.

use std::sync::Arc;

/// Planar f32 samples at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    /// One vector per channel, all of equal length
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Build a buffer from planar channel data.
    ///
    /// Channels shorter than the longest one are padded with silence.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(frames, 0.0);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Build a buffer from interleaved samples
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        if channel_count == 0 {
            return Self::new(Vec::new(), sample_rate);
        }

        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }

        Self::new(channels, sample_rate)
    }

    /// Single-channel buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds at the buffer's own sample rate
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn planes(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Mono down-mix of one frame (average of all channels)
    pub fn mono_frame(&self, frame: usize) -> f32 {
        let count = self.channels.len();
        if count == 0 {
            return 0.0;
        }
        let sum: f32 = self
            .channels
            .iter()
            .map(|ch| ch.get(frame).copied().unwrap_or(0.0))
            .sum();
        sum / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let buffer = DecodedBuffer::mono(vec![0.0; 24_000], 48_000);
        assert_eq!(buffer.frames(), 24_000);
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_interleaved() {
        let buffer = DecodedBuffer::from_interleaved(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 44_100);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.planes()[0], vec![0.1, 0.3, 0.5]);
        assert_eq!(buffer.planes()[1], vec![0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_uneven_channels_are_padded() {
        let buffer = DecodedBuffer::new(vec![vec![1.0, 1.0, 1.0], vec![1.0]], 8_000);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.planes()[1], vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mono_frame_downmix() {
        let buffer = DecodedBuffer::new(vec![vec![1.0, 0.5], vec![0.0, -0.5]], 8_000);
        assert!((buffer.mono_frame(0) - 0.5).abs() < 1e-6);
        assert!(buffer.mono_frame(1).abs() < 1e-6);
        assert_eq!(buffer.mono_frame(10), 0.0);
    }
}
