//! Session lifecycle manager
//!
//! Owns the single "current session" slot. Every playback request first
//! stops and releases whatever session exists, creates a fresh processing
//! context, and returns a provisional status immediately; decoding, graph
//! construction and start happen on a background task.
//!
//! Requests are tagged with a generation number. Any background step whose
//! generation is no longer current (a newer request or an explicit stop came
//! in while it was decoding) discards its result instead of starting audio.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::{Handle, RuntimeFlavor};
use uuid::Uuid;

use crate::audio::context::ContextFactory;
use crate::audio::graph::{self, ChannelAssignment, GraphParams, TrackInput, TrackMode};
use crate::codec::AudioDecoder;
use crate::config::AudioConfig;
use crate::constants::DEFAULT_MAX_DELAY_MS;
use crate::playback::request::{PlaybackForm, PlaybackRequest};
use crate::playback::session::PlaybackSession;
use crate::playback::status::{Locale, StatusMessage};

/// Point-in-time view of the manager
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSnapshot {
    pub playing: bool,
    pub generation: u64,
    pub session_id: Option<Uuid>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub scheduled_stop_secs: Option<f64>,
}

struct ManagerInner {
    factory: Arc<dyn ContextFactory>,
    decoder: AudioDecoder,
    rng: Mutex<Box<dyn RngCore + Send>>,
    slot: Mutex<Option<PlaybackSession>>,
    generation: AtomicU64,
    active: AtomicBool,
    locale: Locale,
    max_delay_ms: u32,
}

/// Entry point for play / stop / is-playing
#[derive(Clone)]
pub struct PlaybackManager {
    inner: Arc<ManagerInner>,
}

impl PlaybackManager {
    pub fn new(factory: Arc<dyn ContextFactory>, decoder: AudioDecoder) -> Self {
        Self::with_rng(factory, decoder, Box::new(StdRng::from_entropy()))
    }

    /// Manager drawing channel assignments from the given generator
    pub fn with_rng(
        factory: Arc<dyn ContextFactory>,
        decoder: AudioDecoder,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self::assemble(factory, decoder, rng, Locale::default(), DEFAULT_MAX_DELAY_MS)
    }

    /// Manager configured from the `[audio]` config section
    pub fn from_config(
        factory: Arc<dyn ContextFactory>,
        decoder: AudioDecoder,
        audio: &AudioConfig,
        locale: Locale,
    ) -> Self {
        Self::assemble(
            factory,
            decoder,
            Box::new(StdRng::from_entropy()),
            locale,
            audio.max_delay_ms,
        )
    }

    fn assemble(
        factory: Arc<dyn ContextFactory>,
        decoder: AudioDecoder,
        rng: Box<dyn RngCore + Send>,
        locale: Locale,
        max_delay_ms: u32,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                factory,
                decoder,
                rng: Mutex::new(rng),
                slot: Mutex::new(None),
                generation: AtomicU64::new(0),
                active: AtomicBool::new(false),
                locale,
                max_delay_ms,
            }),
        }
    }

    pub fn locale(&self) -> Locale {
        self.inner.locale
    }

    /// Handle a play-button press from the host UI.
    ///
    /// Returns at once; decoding and playback continue in the background and
    /// report only through logs. Must be called inside a Tokio runtime.
    pub fn request_playback(&self, form: &PlaybackForm) -> StatusMessage {
        if !form.is_click() {
            return StatusMessage::Ready;
        }

        match form.validate() {
            Ok(request) => self.play(request),
            Err(e) => {
                tracing::info!("Rejected playback request: {}", e);
                StatusMessage::Invalid(e)
            }
        }
    }

    /// Start playback of an already validated request
    pub fn play(&self, mut request: PlaybackRequest) -> StatusMessage {
        let inner = &self.inner;
        if request.delay_ms > inner.max_delay_ms {
            tracing::warn!(
                "Delay {}ms exceeds the {}ms maximum, clamping",
                request.delay_ms,
                inner.max_delay_ms
            );
            request.delay_ms = inner.max_delay_ms;
        }
        let mode = request.mode;

        let (generation, previous) = {
            let mut slot = inner.slot.lock();
            let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            inner.active.store(false, Ordering::SeqCst);
            (generation, slot.take())
        };
        if let Some(previous) = previous {
            tracing::debug!("Stopping session {} before new request", previous.id());
            retire(previous);
        }

        let context = match blocking(|| inner.factory.create()) {
            Ok(context) => context,
            Err(e) => {
                tracing::error!("Failed to create audio context: {}", e);
                return StatusMessage::OutputUnavailable(e.to_string());
            }
        };
        let sample_rate = context.sample_rate();
        let session = PlaybackSession::new(generation, context);

        {
            let mut slot = inner.slot.lock();
            if !inner.is_current(generation) {
                drop(slot);
                tracing::debug!("Request {} superseded while opening output", generation);
                retire(session);
                return StatusMessage::Playing(mode);
            }
            *slot = Some(session);
            inner.active.store(true, Ordering::SeqCst);
        }

        let assignment = self.draw_assignment();
        if mode == TrackMode::Dual {
            tracing::info!(
                "Channel assignment: Track 1 on {}, Track 2 on {}",
                if assignment.track1_left() { "left" } else { "right" },
                if assignment.track1_left() { "right" } else { "left" }
            );
        }

        tracing::info!(
            "Playback request {} accepted: {} mode, delay {}ms, {} loop(s)",
            generation,
            mode,
            request.delay_ms,
            request.loop_count
        );

        let task = run_request(self.inner.clone(), generation, request, assignment, sample_rate);
        tokio::spawn(task);

        StatusMessage::Playing(mode)
    }

    /// Stop any active session; safe to call at any time
    pub fn stop_playback(&self) -> StatusMessage {
        let inner = &self.inner;
        let previous = {
            let mut slot = inner.slot.lock();
            // Pending decodes must not start audio after an explicit stop
            inner.generation.fetch_add(1, Ordering::SeqCst);
            inner.active.store(false, Ordering::SeqCst);
            slot.take()
        };

        if let Some(session) = previous {
            let id = session.id();
            retire(session);
            tracing::info!("Session {} stopped", id);
        }

        StatusMessage::Stopped
    }

    /// Advisory is-playing flag
    pub fn is_playing(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let slot = self.inner.slot.lock();
        let session = slot.as_ref();
        PlaybackSnapshot {
            playing: self.is_playing(),
            generation: self.generation(),
            session_id: session.map(PlaybackSession::id),
            started_at: session.and_then(PlaybackSession::started_at),
            scheduled_stop_secs: session
                .and_then(PlaybackSession::scheduled_stop)
                .map(|d| d.as_secs_f64()),
        }
    }

    /// Fresh uniform left/right draw
    fn draw_assignment(&self) -> ChannelAssignment {
        ChannelAssignment::from_bool(self.inner.rng.lock().gen_bool(0.5))
    }
}

/// Background tail of a request: decode, build, start
async fn run_request(
    inner: Arc<ManagerInner>,
    generation: u64,
    request: PlaybackRequest,
    assignment: ChannelAssignment,
    sample_rate: u32,
) {
    let decodes = request.tracks().into_iter().map(|track| {
        inner
            .decoder
            .decode(&track.locator, track.filename.as_deref(), sample_rate)
    });

    let buffers = match futures_util::future::try_join_all(decodes).await {
        Ok(buffers) => buffers,
        Err(e) => {
            tracing::error!("Error processing audio for request {}: {}", generation, e);
            inner.fail(generation);
            return;
        }
    };

    let tracks: Vec<TrackInput> = buffers
        .into_iter()
        .zip(request.tracks())
        .map(|(buffer, track)| TrackInput::new(buffer, track.speed))
        .collect();

    let params = GraphParams {
        mode: request.mode,
        delay_ms: request.delay_ms,
        loop_count: request.loop_count,
        assignment,
        sample_rate,
    };
    inner.launch(generation, &tracks, params);
}

/// Run a call that may block on the output device without stalling the
/// other tasks of a multi-threaded runtime
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Stop a session already taken out of the slot
fn retire(mut session: PlaybackSession) {
    blocking(move || session.stop());
}

impl ManagerInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Build and start the graph if the request is still current
    fn launch(self: &Arc<Self>, generation: u64, tracks: &[TrackInput], params: GraphParams) {
        let mut slot = self.slot.lock();
        if !self.is_current(generation) {
            tracing::debug!("Discarding stale request {}", generation);
            return;
        }
        let Some(session) = slot.as_mut().filter(|s| s.generation() == generation) else {
            tracing::debug!("No session for request {}, discarding", generation);
            return;
        };

        let started = graph::build(tracks, params).and_then(|handle| {
            let weak: Weak<ManagerInner> = Arc::downgrade(self);
            session.start(handle, params.loop_count, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.complete(generation);
                }
            })
        });

        if let Err(e) = started {
            tracing::error!("Failed to start playback for request {}: {}", generation, e);
            self.active.store(false, Ordering::SeqCst);
            let failed = slot.take();
            drop(slot);
            if let Some(session) = failed {
                retire(session);
            }
        }
    }

    /// Scheduled stop fired
    fn complete(&self, generation: u64) {
        let finished = {
            let mut slot = self.slot.lock();
            if slot.as_ref().map(PlaybackSession::generation) != Some(generation) {
                return;
            }
            self.active.store(false, Ordering::SeqCst);
            slot.take()
        };
        if let Some(mut session) = finished {
            blocking(move || session.complete());
        }
    }

    /// Background step failed: deactivate the attempted session
    fn fail(&self, generation: u64) {
        let failed = {
            let mut slot = self.slot.lock();
            if !self.is_current(generation) {
                return;
            }
            self.active.store(false, Ordering::SeqCst);
            slot.take()
        };
        if let Some(session) = failed {
            retire(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::context::{OfflineContextFactory, ProcessingContext};
    use crate::audio::graph::TrackRole;
    use crate::error::{AudioError, ValidationError};
    use crate::test_support::track_payload;
    use std::time::Duration;

    const RATE: u32 = 8_000;

    fn manager() -> (PlaybackManager, Arc<OfflineContextFactory>) {
        let factory = Arc::new(OfflineContextFactory::new(RATE));
        let manager = PlaybackManager::with_rng(
            factory.clone(),
            AudioDecoder::default(),
            Box::new(StdRng::seed_from_u64(7)),
        );
        (manager, factory)
    }

    fn single_form(frames: usize) -> PlaybackForm {
        PlaybackForm {
            click: Some(1),
            delay: Some("200".into()),
            loops: Some("1".into()),
            track1: Some(track_payload(frames, RATE)),
            track2: None,
            mode: Some("single".into()),
            speed1: Some("1.0".into()),
            speed2: None,
        }
    }

    fn dual_form(frames: usize) -> PlaybackForm {
        PlaybackForm {
            mode: Some("dual".into()),
            track2: Some(track_payload(frames * 2, RATE)),
            speed2: Some("2.0".into()),
            ..single_form(frames)
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_without_click_is_noop() {
        let (manager, factory) = manager();
        let form = PlaybackForm {
            click: None,
            ..single_form(800)
        };
        assert_eq!(manager.request_playback(&form), StatusMessage::Ready);
        assert!(factory.created().is_empty());
        assert!(!manager.is_playing());
    }

    #[tokio::test]
    async fn test_dual_without_second_speed_is_rejected() {
        let (manager, factory) = manager();
        let form = PlaybackForm {
            speed2: None,
            ..dual_form(800)
        };
        assert_eq!(
            manager.request_playback(&form),
            StatusMessage::Invalid(ValidationError::MissingSecondTrack)
        );
        assert!(factory.created().is_empty());
        assert!(!manager.is_playing());
        assert_eq!(manager.generation(), 0);
    }

    #[tokio::test]
    async fn test_single_mode_builds_expected_graph() {
        let (manager, factory) = manager();
        let status = manager.request_playback(&single_form(8_000));
        assert_eq!(status, StatusMessage::Playing(TrackMode::Single));
        assert!(manager.is_playing());

        let probe = factory.last().unwrap();
        assert!(wait_until(|| probe.is_connected()).await);

        let shape = probe
            .with_graph(|g| {
                (
                    Arc::ptr_eq(g.left().source().buffer(), g.right().source().buffer()),
                    g.left().is_delayed(),
                    g.right().is_delayed(),
                    g.right().delay_frames(),
                )
            })
            .unwrap();
        assert_eq!(shape, (true, false, true, 1_600));

        let snapshot = manager.snapshot();
        assert!(snapshot.playing);
        assert!(snapshot.session_id.is_some());
        assert!((snapshot.scheduled_stop_secs.unwrap() - 1.0).abs() < 1e-6);
        manager.stop_playback();
    }

    #[tokio::test]
    async fn test_dual_mode_builds_two_delayed_paths() {
        let (manager, factory) = manager();
        assert_eq!(
            manager.request_playback(&dual_form(8_000)),
            StatusMessage::Playing(TrackMode::Dual)
        );

        let probe = factory.last().unwrap();
        assert!(wait_until(|| probe.is_connected()).await);

        let (distinct, both_delayed, roles) = probe
            .with_graph(|g| {
                (
                    !Arc::ptr_eq(g.left().source().buffer(), g.right().source().buffer()),
                    g.left().is_delayed() && g.right().is_delayed(),
                    (g.left().role(), g.right().role()),
                )
            })
            .unwrap();
        assert!(distinct);
        assert!(both_delayed);
        assert!(
            roles == (TrackRole::Track1, TrackRole::Track2)
                || roles == (TrackRole::Track2, TrackRole::Track1)
        );

        // Track 2 is twice as long at twice the speed
        let snapshot = manager.snapshot();
        assert!((snapshot.scheduled_stop_secs.unwrap() - 1.0).abs() < 1e-6);
        manager.stop_playback();
    }

    #[tokio::test]
    async fn test_channel_assignment_is_balanced() {
        let (manager, _factory) = manager();
        let left = (0..2_000)
            .filter(|_| manager.draw_assignment().track1_left())
            .count();
        assert!((800..1_200).contains(&left), "track 1 left {} / 2000", left);
    }

    #[tokio::test]
    async fn test_new_request_stops_previous_session() {
        let (manager, factory) = manager();
        manager.request_playback(&single_form(80_000));
        let first = factory.last().unwrap();
        assert!(wait_until(|| first.is_connected()).await);

        manager.request_playback(&single_form(80_000));
        assert!(first.is_closed());
        assert!(manager.is_playing());

        let second = factory.last().unwrap();
        assert!(wait_until(|| second.is_connected()).await);
        assert!(!second.is_closed());
        manager.stop_playback();
    }

    #[tokio::test]
    async fn test_superseded_request_never_starts() {
        let (manager, factory) = manager();
        manager.request_playback(&single_form(8_000));
        manager.request_playback(&dual_form(8_000));

        let probes = factory.created();
        assert_eq!(probes.len(), 2);
        assert!(wait_until(|| probes[1].is_connected()).await);

        // Give the superseded decode time to finish and be discarded
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(probes[0].is_closed());
        assert!(!probes[0].is_connected());
        assert!(manager.is_playing());
        manager.stop_playback();
    }

    #[tokio::test]
    async fn test_stop_while_decoding_prevents_playback() {
        let (manager, factory) = manager();
        manager.request_playback(&single_form(8_000));
        assert_eq!(manager.stop_playback(), StatusMessage::Stopped);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let probe = factory.last().unwrap();
        assert!(!probe.is_connected());
        assert!(!manager.is_playing());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (manager, _factory) = manager();
        assert_eq!(manager.stop_playback(), StatusMessage::Stopped);
        assert_eq!(manager.stop_playback(), StatusMessage::Stopped);
        assert!(!manager.is_playing());

        manager.request_playback(&single_form(8_000));
        manager.stop_playback();
        manager.stop_playback();
        assert!(!manager.is_playing());
    }

    #[tokio::test]
    async fn test_decode_failure_deactivates() {
        let (manager, factory) = manager();
        let form = PlaybackForm {
            track1: Some(r#"{"content": "data:audio/wav;base64,bm90IGF1ZGlv"}"#.into()),
            ..single_form(0)
        };
        assert_eq!(manager.request_playback(&form), StatusMessage::Playing(TrackMode::Single));
        assert!(wait_until(|| !manager.is_playing()).await);
        assert!(factory.last().unwrap().is_closed());

        // Still usable afterwards
        manager.request_playback(&single_form(8_000));
        assert!(manager.is_playing());
        manager.stop_playback();
    }

    #[tokio::test]
    async fn test_natural_completion_clears_flag() {
        let (manager, factory) = manager();
        // 50ms of audio played once
        manager.request_playback(&single_form(400));
        assert!(manager.is_playing());

        assert!(wait_until(|| !manager.is_playing()).await);
        assert!(factory.last().unwrap().is_closed());
        assert!(manager.snapshot().session_id.is_none());
    }

    #[tokio::test]
    async fn test_unplayably_slow_speed_deactivates() {
        let (manager, factory) = manager();
        let form = PlaybackForm {
            speed1: Some("1e-20".into()),
            ..single_form(8_000)
        };
        assert_eq!(manager.request_playback(&form), StatusMessage::Playing(TrackMode::Single));

        assert!(wait_until(|| !manager.is_playing()).await);
        let probe = factory.last().unwrap();
        assert!(probe.is_closed());
        assert!(!probe.is_connected());
        assert!(manager.snapshot().session_id.is_none());
    }

    struct FailingFactory;

    impl ContextFactory for FailingFactory {
        fn create(&self) -> Result<Box<dyn ProcessingContext>, AudioError> {
            Err(AudioError::DeviceNotFound("no output".into()))
        }
    }

    #[tokio::test]
    async fn test_output_unavailable() {
        let manager = PlaybackManager::new(Arc::new(FailingFactory), AudioDecoder::default());
        let status = manager.request_playback(&single_form(800));
        assert!(matches!(status, StatusMessage::OutputUnavailable(_)));
        assert!(!manager.is_playing());
    }

    #[tokio::test]
    async fn test_delay_is_clamped_to_maximum() {
        let (manager, factory) = manager();
        let form = PlaybackForm {
            delay: Some("5000".into()),
            ..single_form(8_000)
        };
        manager.request_playback(&form);
        let probe = factory.last().unwrap();
        assert!(wait_until(|| probe.is_connected()).await);
        let frames = probe.with_graph(|g| g.right().delay_frames()).unwrap();
        assert_eq!(frames, RATE as usize * DEFAULT_MAX_DELAY_MS as usize / 1000);
        manager.stop_playback();
    }
}
