//! Fixed delay element

/// Circular delay line that outputs its input after a fixed number of frames
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_frames: usize,
}

impl DelayLine {
    /// Delay of `delay_secs` at `sample_rate`, rounded to the nearest frame
    pub fn new(delay_secs: f64, sample_rate: u32) -> Self {
        let delay_frames = (delay_secs.max(0.0) * sample_rate as f64).round() as usize;
        Self::with_frames(delay_frames)
    }

    pub fn with_frames(delay_frames: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_frames + 1],
            write_pos: 0,
            delay_frames,
        }
    }

    pub fn delay_frames(&self) -> usize {
        self.delay_frames
    }

    pub fn next_sample(&mut self, sample: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = sample;

        let read_pos = (self.write_pos + len - self.delay_frames) % len;
        let delayed = self.buffer[read_pos];

        self.write_pos = (self.write_pos + 1) % len;
        delayed
    }
}
