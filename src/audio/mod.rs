//! Audio subsystem module

pub mod buffer;
pub mod context;
pub mod delay;
pub mod device;
pub mod graph;
pub mod output;
pub mod source;

pub use buffer::DecodedBuffer;
pub use context::{ContextFactory, OfflineContext, OfflineContextFactory, ProcessingContext};
pub use device::{list_output_devices, AudioDevice, AudioDeviceInfo};
pub use graph::{
    ChannelAssignment, GraphHandle, GraphParams, SignalGraph, TrackInput, TrackMode, TrackRole,
};
pub use output::{CpalContext, CpalContextFactory};
pub use source::{SourceHandle, SourceNode, SourceState};
