//! Buffer source node
//!
//! A [`SourceNode`] reads a shared [`DecodedBuffer`] at a given playback
//! rate, optionally looping over the whole buffer. The render thread owns the
//! node itself; the session controls it through a cloneable [`SourceHandle`]
//! that shares only the lifecycle state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::audio::buffer::DecodedBuffer;
use crate::error::AudioError;

const STATE_IDLE: u8 = 0;
const STATE_PLAYING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Lifecycle of a source node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Constructed, not yet started
    Idle,
    /// Emitting samples
    Playing,
    /// Stopped explicitly or reached the end of a non-looping buffer
    Stopped,
}

impl SourceState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            STATE_IDLE => SourceState::Idle,
            STATE_PLAYING => SourceState::Playing,
            _ => SourceState::Stopped,
        }
    }
}

/// Control handle for a source node, shared with the render side
#[derive(Debug, Clone)]
pub struct SourceHandle {
    state: Arc<AtomicU8>,
    label: &'static str,
}

impl SourceHandle {
    /// Begin emitting samples now
    pub fn start(&self) -> Result<(), AudioError> {
        self.state
            .compare_exchange(STATE_IDLE, STATE_PLAYING, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| {
                AudioError::StreamError(format!("source '{}' already started", self.label))
            })
    }

    /// Stop emitting samples.
    ///
    /// Fails with [`AudioError::AlreadyStopped`] when the source already ended.
    pub fn stop(&self) -> Result<(), AudioError> {
        match self.state.swap(STATE_STOPPED, Ordering::SeqCst) {
            STATE_STOPPED => Err(AudioError::AlreadyStopped),
            _ => Ok(()),
        }
    }

    pub fn state(&self) -> SourceState {
        SourceState::from_raw(self.state.load(Ordering::SeqCst))
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Renderable buffer source
pub struct SourceNode {
    buffer: Arc<DecodedBuffer>,
    playback_rate: f64,
    looping: bool,
    /// Loop end in seconds; the loop always starts at zero
    loop_end: f64,
    /// Read position in frames
    position: f64,
    state: Arc<AtomicU8>,
    label: &'static str,
}

impl SourceNode {
    pub fn new(buffer: Arc<DecodedBuffer>, label: &'static str) -> Self {
        Self {
            buffer,
            playback_rate: 1.0,
            looping: false,
            loop_end: 0.0,
            position: 0.0,
            state: Arc::new(AtomicU8::new(STATE_IDLE)),
            label,
        }
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_loop_end(&mut self, seconds: f64) {
        self.loop_end = seconds;
    }

    pub fn handle(&self) -> SourceHandle {
        SourceHandle {
            state: self.state.clone(),
            label: self.label,
        }
    }

    pub fn buffer(&self) -> &Arc<DecodedBuffer> {
        &self.buffer
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn loop_end(&self) -> f64 {
        self.loop_end
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Seconds of output this source produces for one pass over its buffer
    pub fn effective_duration(&self) -> f64 {
        if self.playback_rate <= 0.0 {
            return 0.0;
        }
        self.buffer.duration_secs() / self.playback_rate
    }

    fn loop_end_frames(&self) -> f64 {
        let total = self.buffer.frames() as f64;
        if self.loop_end > 0.0 {
            (self.loop_end * self.buffer.sample_rate() as f64).min(total)
        } else {
            total
        }
    }

    /// Produce the next mono sample and advance the read position
    pub fn next_sample(&mut self) -> f32 {
        if self.state.load(Ordering::Relaxed) != STATE_PLAYING {
            return 0.0;
        }

        let frames = self.buffer.frames();
        if frames == 0 {
            self.state.store(STATE_STOPPED, Ordering::Relaxed);
            return 0.0;
        }

        if self.looping {
            let end = self.loop_end_frames();
            if end > 0.0 && self.position >= end {
                self.position %= end;
            }
        } else if self.position >= frames as f64 {
            self.state.store(STATE_STOPPED, Ordering::Relaxed);
            return 0.0;
        }

        // Linear interpolation between neighbouring frames
        let index = self.position.floor() as usize;
        let frac = (self.position - index as f64) as f32;
        let current = self.buffer.mono_frame(index);
        let next = if index + 1 < frames {
            self.buffer.mono_frame(index + 1)
        } else if self.looping {
            self.buffer.mono_frame(0)
        } else {
            0.0
        };

        self.position += self.playback_rate;
        current + (next - current) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Arc<DecodedBuffer> {
        DecodedBuffer::mono((0..frames).map(|i| i as f32).collect(), 10).into_shared()
    }

    #[test]
    fn test_silent_until_started() {
        let mut node = SourceNode::new(ramp(4), "test");
        node.next_sample();
        assert_eq!(node.next_sample(), 0.0);
        assert_eq!(node.handle().state(), SourceState::Idle);
    }

    #[test]
    fn test_plays_once_then_stops() {
        let mut node = SourceNode::new(ramp(3), "test");
        let handle = node.handle();
        handle.start().unwrap();

        let out: Vec<f32> = (0..5).map(|_| node.next_sample()).collect();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 0.0, 0.0]);
        assert_eq!(handle.state(), SourceState::Stopped);
    }

    #[test]
    fn test_loops_whole_buffer() {
        let mut node = SourceNode::new(ramp(3), "test");
        node.set_loop(true);
        node.set_loop_end(0.3);
        node.handle().start().unwrap();

        let out: Vec<f32> = (0..7).map(|_| node.next_sample()).collect();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_playback_rate_interpolates() {
        let mut node = SourceNode::new(ramp(4), "test");
        node.set_playback_rate(0.5);
        node.handle().start().unwrap();

        let out: Vec<f32> = (0..4).map(|_| node.next_sample()).collect();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_effective_duration() {
        let mut node = SourceNode::new(ramp(20), "test");
        node.set_playback_rate(2.0);
        assert!((node.effective_duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_twice_reports_already_stopped() {
        let node = SourceNode::new(ramp(4), "test");
        let handle = node.handle();
        handle.start().unwrap();
        assert!(handle.stop().is_ok());
        assert_eq!(handle.stop(), Err(AudioError::AlreadyStopped));
    }

    #[test]
    fn test_stop_after_natural_end() {
        let mut node = SourceNode::new(ramp(1), "test");
        let handle = node.handle();
        handle.start().unwrap();
        node.next_sample();
        node.next_sample();
        assert_eq!(handle.stop(), Err(AudioError::AlreadyStopped));
    }
}
