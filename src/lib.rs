//! # Phantom Words
//!
//! Stereo playback engine for the "phantom words" auditory illusion: a
//! looping speech sample is played into both ears with a small time offset
//! (or two different samples, one per ear) so the listener starts hearing
//! words that are not there.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 Host UI (ui::server / CLI `play`)                    │
//! │        PlaybackForm ──► request_playback      stop_playback          │
//! └──────────────────────────────┬───────────────────────────────────────┘
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │            Session Lifecycle Manager (playback::manager)             │
//! │   validate ─► stop previous ─► new context ─► generation += 1        │
//! │                                   │                                  │
//! │                       tokio::spawn│(decode, build, start)            │
//! └───────────────────────────────────┼──────────────────────────────────┘
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Audio Decoder (codec::decoder)   data: URI / path ─► symphonia      │
//! │                                   ─► rubato resample ─► buffer       │
//! └───────────────────────────────────┬──────────────────────────────────┘
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │             Signal Graph Builder (audio::graph)                      │
//! │                                                                      │
//! │   Single:  source ───────────────────┐                               │
//! │            source ──► delay ─────────┤                               │
//! │                                      ├──► merger (L, R) ──► output   │
//! │   Dual:    track 1 ──► delay ────────┤                               │
//! │            track 2 ──► delay ────────┘   (random side per request)   │
//! └───────────────────────────────────┬──────────────────────────────────┘
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │   Playback Session (playback::session)                               │
//! │   connect ─► start sources ─► stop timer (duration × loops)          │
//! │   ProcessingContext: cpal output thread | OfflineContext             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod playback;
#[cfg(feature = "server")]
pub mod ui;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Sample rate of the offline backend
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default HTTP port for the web UI
    pub const DEFAULT_HTTP_PORT: u16 = 8050;

    /// Largest accepted encoded audio payload (30 MiB)
    pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 30 * 1024 * 1024;

    /// Longest delay a delay element accepts, in milliseconds
    pub const DEFAULT_MAX_DELAY_MS: u32 = 1000;
}
