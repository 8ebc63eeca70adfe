//! Playback control: request validation, sessions and their lifecycle

pub mod manager;
pub mod request;
pub mod session;
pub mod status;

pub use manager::{PlaybackManager, PlaybackSnapshot};
pub use request::{PlaybackForm, PlaybackRequest, TrackPayload, TrackSpec};
pub use session::PlaybackSession;
pub use status::{Locale, StatusKind, StatusMessage};
