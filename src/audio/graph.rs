//! Signal graph construction and rendering
//!
//! ```text
//!   Single mode                         Dual mode
//!
//!   buffer ─► source L ─────────► L     buffer A ─► source A ─► delay ─► L|R
//!         └─► source R ─► delay ─► R     buffer B ─► source B ─► delay ─► R|L
//! ```
//!
//! Each path carries a mono signal into one input of a two-channel merger.
//! Building a graph has no side effects: sources stay idle until the
//! session starts them through their [`SourceHandle`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::audio::buffer::DecodedBuffer;
use crate::audio::delay::DelayLine;
use crate::audio::source::{SourceHandle, SourceNode};
use crate::error::AudioError;

/// How many distinct tracks a session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    /// One track duplicated to both channels, the right one delayed
    Single,
    /// Two tracks, one per channel, both delayed
    Dual,
}

impl TrackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackMode::Single => "single",
            TrackMode::Dual => "dual",
        }
    }

    /// Number of decoded buffers the mode needs
    pub fn track_count(&self) -> usize {
        match self {
            TrackMode::Single => 1,
            TrackMode::Dual => 2,
        }
    }
}

impl fmt::Display for TrackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which input a signal path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackRole {
    Track1,
    Track2,
}

/// Per-session left/right decision for dual mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelAssignment {
    /// Track 1 on the left, track 2 on the right
    Track1Left,
    /// Track 2 on the left, track 1 on the right
    Track1Right,
}

impl ChannelAssignment {
    pub fn from_bool(track1_left: bool) -> Self {
        if track1_left {
            ChannelAssignment::Track1Left
        } else {
            ChannelAssignment::Track1Right
        }
    }

    pub fn track1_left(&self) -> bool {
        matches!(self, ChannelAssignment::Track1Left)
    }
}

/// One decoded track and the speed it plays at
#[derive(Debug, Clone)]
pub struct TrackInput {
    pub buffer: Arc<DecodedBuffer>,
    pub speed: f64,
}

impl TrackInput {
    pub fn new(buffer: Arc<DecodedBuffer>, speed: f64) -> Self {
        Self { buffer, speed }
    }
}

/// Graph construction parameters shared by every path
#[derive(Debug, Clone, Copy)]
pub struct GraphParams {
    pub mode: TrackMode,
    pub delay_ms: u32,
    pub loop_count: u32,
    pub assignment: ChannelAssignment,
    /// Rate of the processing context the graph renders into
    pub sample_rate: u32,
}

/// Source, optional delay element, merger input
pub struct ChannelPath {
    role: TrackRole,
    source: SourceNode,
    delay: Option<DelayLine>,
}

impl ChannelPath {
    fn new(role: TrackRole, source: SourceNode, delay: Option<DelayLine>) -> Self {
        Self {
            role,
            source,
            delay,
        }
    }

    pub fn role(&self) -> TrackRole {
        self.role
    }

    pub fn source(&self) -> &SourceNode {
        &self.source
    }

    pub fn is_delayed(&self) -> bool {
        self.delay.is_some()
    }

    pub fn delay_frames(&self) -> usize {
        self.delay.as_ref().map_or(0, DelayLine::delay_frames)
    }

    fn next_sample(&mut self) -> f32 {
        let sample = self.source.next_sample();
        match self.delay.as_mut() {
            Some(delay) => delay.next_sample(sample),
            None => sample,
        }
    }
}

/// Two paths merged into a stereo output
pub struct SignalGraph {
    left: ChannelPath,
    right: ChannelPath,
}

impl SignalGraph {
    pub fn left(&self) -> &ChannelPath {
        &self.left
    }

    pub fn right(&self) -> &ChannelPath {
        &self.right
    }

    /// Next stereo frame
    pub fn next_frame(&mut self) -> (f32, f32) {
        (self.left.next_sample(), self.right.next_sample())
    }

    /// Fill an interleaved output buffer with `channels` channels.
    ///
    /// Channels beyond the second receive silence; a mono output receives the
    /// average of both paths.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in out.chunks_mut(channels) {
            let (left, right) = self.next_frame();
            match frame.len() {
                1 => frame[0] = (left + right) * 0.5,
                _ => {
                    frame[0] = left;
                    frame[1] = right;
                    for sample in frame.iter_mut().skip(2) {
                        *sample = 0.0;
                    }
                }
            }
        }
    }
}

/// A built, not yet started graph plus what the session needs to run it
pub struct GraphHandle {
    pub graph: SignalGraph,
    /// Control handles for every source node in the graph
    pub sources: Vec<SourceHandle>,
    /// Seconds per pass for each track, in track order
    pub durations: Vec<f64>,
}

impl GraphHandle {
    /// Longest per-track duration
    pub fn effective_duration(&self) -> f64 {
        self.durations.iter().copied().fold(0.0, f64::max)
    }
}

fn configure_source(
    buffer: Arc<DecodedBuffer>,
    speed: f64,
    loop_count: u32,
    label: &'static str,
) -> SourceNode {
    let mut source = SourceNode::new(buffer, label);
    source.set_playback_rate(speed);
    source.set_loop(loop_count > 1);
    if loop_count > 1 {
        let end = source.buffer().duration_secs();
        source.set_loop_end(end);
    }
    source
}

/// Build the routing graph for one session
pub fn build(tracks: &[TrackInput], params: GraphParams) -> Result<GraphHandle, AudioError> {
    if tracks.len() != params.mode.track_count() {
        return Err(AudioError::InvalidGraph(format!(
            "{} mode needs {} track(s), got {}",
            params.mode,
            params.mode.track_count(),
            tracks.len()
        )));
    }
    if let Some(bad) = tracks.iter().find(|t| !(t.speed.is_finite() && t.speed > 0.0)) {
        return Err(AudioError::InvalidGraph(format!(
            "playback speed must be positive, got {}",
            bad.speed
        )));
    }

    let delay_secs = params.delay_ms as f64 / 1000.0;

    let (left, right) = match params.mode {
        TrackMode::Single => {
            let track = &tracks[0];
            let loops = params.loop_count;
            let left = configure_source(track.buffer.clone(), track.speed, loops, "single-left");
            let right = configure_source(track.buffer.clone(), track.speed, loops, "single-right");
            (
                ChannelPath::new(TrackRole::Track1, left, None),
                ChannelPath::new(
                    TrackRole::Track1,
                    right,
                    Some(DelayLine::new(delay_secs, params.sample_rate)),
                ),
            )
        }
        TrackMode::Dual => {
            let track1 = ChannelPath::new(
                TrackRole::Track1,
                configure_source(
                    tracks[0].buffer.clone(),
                    tracks[0].speed,
                    params.loop_count,
                    "track-1",
                ),
                Some(DelayLine::new(delay_secs, params.sample_rate)),
            );
            let track2 = ChannelPath::new(
                TrackRole::Track2,
                configure_source(
                    tracks[1].buffer.clone(),
                    tracks[1].speed,
                    params.loop_count,
                    "track-2",
                ),
                Some(DelayLine::new(delay_secs, params.sample_rate)),
            );
            if params.assignment.track1_left() {
                (track1, track2)
            } else {
                (track2, track1)
            }
        }
    };

    // Track order, so the session starts track 1 first in both orientations
    let mut paths = [&left, &right];
    paths.sort_by_key(|p| match p.role {
        TrackRole::Track1 => 0,
        TrackRole::Track2 => 1,
    });
    let sources = paths.iter().map(|p| p.source.handle()).collect();
    // Both single-mode paths play the same track
    let mut durations: Vec<f64> = paths.iter().map(|p| p.source.effective_duration()).collect();
    durations.truncate(params.mode.track_count());

    tracing::debug!(
        "Built {} graph: L={:?}{} R={:?}{} delay={}ms loops={}",
        params.mode,
        left.role,
        if left.is_delayed() { "+delay" } else { "" },
        right.role,
        if right.is_delayed() { "+delay" } else { "" },
        params.delay_ms,
        params.loop_count
    );

    Ok(GraphHandle {
        graph: SignalGraph { left, right },
        sources,
        durations,
    })
}
