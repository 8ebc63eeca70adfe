//! Playback session
//!
//! A session owns one processing context and the sources connected to it.
//! Starting it connects the graph, starts every source and schedules a
//! cancellable completion timer for `duration * loop_count`. Stopping it is
//! idempotent: sources that already ended are skipped, the context is
//! closed and nothing keeps referring to the stopped nodes.
//!
//! The process-wide is-playing flag belongs to the lifecycle manager, which
//! knows whether a session is still the current one.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio::context::ProcessingContext;
use crate::audio::graph::GraphHandle;
use crate::audio::source::SourceHandle;
use crate::error::AudioError;

/// Resources of one playback request
pub struct PlaybackSession {
    id: Uuid,
    generation: u64,
    context: Box<dyn ProcessingContext>,
    sources: Vec<SourceHandle>,
    stop_timer: Option<JoinHandle<()>>,
    started_at: Option<DateTime<Utc>>,
    scheduled_stop: Option<Duration>,
    released: bool,
}

/// Time until the scheduled stop for a graph played `loop_count` times
pub fn playback_duration(handle: &GraphHandle, loop_count: u32) -> Result<Duration, AudioError> {
    let secs = handle.effective_duration() * loop_count.max(1) as f64;
    Duration::try_from_secs_f64(secs).map_err(|_| AudioError::DurationOutOfRange(secs))
}

impl PlaybackSession {
    /// New, not yet started session
    pub fn new(generation: u64, context: Box<dyn ProcessingContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            context,
            sources: Vec::new(),
            stop_timer: None,
            started_at: None,
            scheduled_stop: None,
            released: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sources(&self) -> &[SourceHandle] {
        &self.sources
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn scheduled_stop(&self) -> Option<Duration> {
        self.scheduled_stop
    }

    /// Started and not yet stopped or completed
    pub fn is_active(&self) -> bool {
        self.started_at.is_some() && !self.released
    }

    /// Connect and start the graph, then schedule `on_complete` to run once
    /// playback has had time to finish. Must be called inside a Tokio runtime.
    pub fn start<F>(
        &mut self,
        handle: GraphHandle,
        loop_count: u32,
        on_complete: F,
    ) -> Result<Duration, AudioError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.released {
            return Err(AudioError::ContextClosed);
        }
        let duration = playback_duration(&handle, loop_count)?;
        let GraphHandle { graph, sources, .. } = handle;

        self.context.connect(graph)?;
        self.sources = sources;

        // Start back to back so both channels begin together
        for source in &self.sources {
            source.start()?;
        }
        self.started_at = Some(Utc::now());
        self.scheduled_stop = Some(duration);

        self.stop_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_complete();
        }));

        tracing::info!(
            "Session {} (generation {}) started {} source(s), stopping in {:.2}s",
            self.id,
            self.generation,
            self.sources.len(),
            duration.as_secs_f64()
        );
        Ok(duration)
    }

    /// Force-stop: cancel the timer, stop every source and close the context
    pub fn stop(&mut self) {
        if let Some(timer) = self.stop_timer.take() {
            timer.abort();
        }
        self.release();
    }

    /// Natural end, called from the completion timer itself
    pub fn complete(&mut self) {
        // Dropping the handle detaches the running timer task
        self.stop_timer.take();
        self.release();
        tracing::info!("Session {} completed", self.id);
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for source in self.sources.drain(..) {
            match source.stop() {
                Ok(()) | Err(AudioError::AlreadyStopped) => {}
                Err(e) => tracing::warn!("Failed to stop source '{}': {}", source.label(), e),
            }
        }

        if !self.context.is_closed() {
            if let Err(e) = self.context.close() {
                tracing::warn!("Error closing audio context: {}", e);
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.stop();
    }
}
