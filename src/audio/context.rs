//! Audio processing contexts
//!
//! A processing context is the destination a [`SignalGraph`] renders into.
//! Each playback session creates its own context and closes it when the
//! session ends. [`OfflineContext`] renders nowhere until asked to, which is
//! what headless hosts and tests use; the cpal-backed context lives in
//! [`crate::audio::output`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::graph::SignalGraph;
use crate::error::AudioError;

/// Destination for a session's signal graph
pub trait ProcessingContext: Send {
    /// Rate every buffer must be decoded to
    fn sample_rate(&self) -> u32;

    /// Connect the graph's merger to the destination
    fn connect(&mut self, graph: SignalGraph) -> Result<(), AudioError>;

    /// Release the destination. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), AudioError>;

    fn is_closed(&self) -> bool;
}

/// Creates a fresh context per playback session
pub trait ContextFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn ProcessingContext>, AudioError>;
}

/// Shared view of an offline context, usable after the session owns it
#[derive(Clone)]
pub struct OfflineProbe {
    graph: Arc<Mutex<Option<SignalGraph>>>,
    closed: Arc<AtomicBool>,
    sample_rate: u32,
}

impl OfflineProbe {
    pub fn is_connected(&self) -> bool {
        self.graph.lock().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render `frames` stereo frames, silence if nothing is connected
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        if self.is_closed() {
            return out;
        }
        if let Some(graph) = self.graph.lock().as_mut() {
            graph.render(&mut out, 2);
        }
        out
    }

    /// Inspect the connected graph
    pub fn with_graph<R>(&self, f: impl FnOnce(&SignalGraph) -> R) -> Option<R> {
        self.graph.lock().as_ref().map(f)
    }
}

/// Context that holds its graph in memory and renders on demand
pub struct OfflineContext {
    probe: OfflineProbe,
}

impl OfflineContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            probe: OfflineProbe {
                graph: Arc::new(Mutex::new(None)),
                closed: Arc::new(AtomicBool::new(false)),
                sample_rate,
            },
        }
    }

    pub fn probe(&self) -> OfflineProbe {
        self.probe.clone()
    }
}

impl ProcessingContext for OfflineContext {
    fn sample_rate(&self) -> u32 {
        self.probe.sample_rate
    }

    fn connect(&mut self, graph: SignalGraph) -> Result<(), AudioError> {
        if self.is_closed() {
            return Err(AudioError::ContextClosed);
        }
        *self.probe.graph.lock() = Some(graph);
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.probe.closed.store(true, Ordering::SeqCst);
        self.probe.graph.lock().take();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.probe.is_closed()
    }
}

/// Number of probes an [`OfflineContextFactory`] keeps
const PROBE_HISTORY: usize = 64;

/// Factory for [`OfflineContext`]s that remembers the contexts it made
pub struct OfflineContextFactory {
    sample_rate: u32,
    created: Mutex<Vec<OfflineProbe>>,
}

impl OfflineContextFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Probes for the most recent contexts, oldest first
    pub fn created(&self) -> Vec<OfflineProbe> {
        self.created.lock().clone()
    }

    pub fn last(&self) -> Option<OfflineProbe> {
        self.created.lock().last().cloned()
    }
}

impl ContextFactory for OfflineContextFactory {
    fn create(&self) -> Result<Box<dyn ProcessingContext>, AudioError> {
        let context = OfflineContext::new(self.sample_rate);
        let mut created = self.created.lock();
        if created.len() == PROBE_HISTORY {
            created.remove(0);
        }
        created.push(context.probe());
        Ok(Box::new(context))
    }
}
