//! Audio output through cpal
//!
//! The cpal stream is created and owned by a dedicated thread, since streams
//! cannot move between threads on every platform. The graph is shared with
//! the output callback behind a mutex; until a graph is connected, and after
//! the context is closed, the callback writes silence.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::context::{ContextFactory, ProcessingContext};
use crate::audio::device::{get_default_output_device, get_output_device, AudioDevice};
use crate::audio::graph::SignalGraph;
use crate::error::AudioError;

/// How long context creation waits for the output thread to open its stream
const STREAM_OPEN_TIMEOUT: Duration = Duration::from_secs(2);

type SharedGraph = Arc<Mutex<Option<SignalGraph>>>;

/// Processing context rendering to a cpal output device
pub struct CpalContext {
    graph: SharedGraph,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Receiver<AudioError>,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

impl CpalContext {
    /// Open an output stream on the named device, or the default device
    pub fn open(device_name: Option<&str>) -> Result<Self, AudioError> {
        let device = match device_name {
            Some(name) => get_output_device(name)?,
            None => get_default_output_device()?,
        };
        let default_config = device.default_output_config()?;
        let sample_format = default_config.sample_format();
        let config: StreamConfig = default_config.into();

        let graph: SharedGraph = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let sample_rate = config.sample_rate.0;
        let channels = config.channels;
        let name = device.name.clone();

        let thread_graph = graph.clone();
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name("phantom-output".to_string())
            .spawn(move || {
                let stream = build_stream(&device, &config, sample_format, thread_graph, error_tx);
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream is dropped here, releasing the device
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv_timeout(STREAM_OPEN_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                return Err(AudioError::StreamError(
                    "timed out waiting for output stream".to_string(),
                ));
            }
        }

        tracing::debug!(
            "Opened output context on '{}': {}Hz, {} channels, {:?}",
            name,
            sample_rate,
            channels,
            sample_format
        );

        Ok(Self {
            graph,
            running,
            thread_handle: Some(handle),
            error_rx,
            sample_rate,
            channels,
            device_name: name,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Check for stream errors reported by the output callback
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

fn build_stream(
    device: &AudioDevice,
    config: &StreamConfig,
    sample_format: SampleFormat,
    graph: SharedGraph,
    error_tx: crossbeam_channel::Sender<AudioError>,
) -> Result<cpal::Stream, AudioError> {
    match sample_format {
        SampleFormat::F32 => build_typed_stream::<f32>(device, config, graph, error_tx),
        SampleFormat::I16 => build_typed_stream::<i16>(device, config, graph, error_tx),
        SampleFormat::U16 => build_typed_stream::<u16>(device, config, graph, error_tx),
        format => Err(AudioError::UnsupportedFormat(format!("{:?}", format))),
    }
}

fn build_typed_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &AudioDevice,
    config: &StreamConfig,
    graph: SharedGraph,
    error_tx: crossbeam_channel::Sender<AudioError>,
) -> Result<cpal::Stream, AudioError> {
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .inner()
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.clear();
                scratch.resize(data.len(), 0.0);
                if let Some(graph) = graph.lock().as_mut() {
                    graph.render(&mut scratch, channels);
                }
                for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(sample);
                }
            },
            move |err| {
                let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

impl ProcessingContext for CpalContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(&mut self, graph: SignalGraph) -> Result<(), AudioError> {
        if self.is_closed() {
            return Err(AudioError::ContextClosed);
        }
        *self.graph.lock() = Some(graph);
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);
        self.graph.lock().take();

        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| AudioError::StreamError("output thread panicked".to_string()))?;
        }
        while let Some(err) = self.check_errors() {
            tracing::warn!("Output stream reported: {}", err);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Opens a [`CpalContext`] per session
pub struct CpalContextFactory {
    device_name: Option<String>,
}

impl CpalContextFactory {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl ContextFactory for CpalContextFactory {
    fn create(&self) -> Result<Box<dyn ProcessingContext>, AudioError> {
        Ok(Box::new(CpalContext::open(self.device_name.as_deref())?))
    }
}
