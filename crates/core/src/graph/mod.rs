//! Seam between the engine and the audio subsystem.
//!
//! The engine only wires nodes together and schedules parameter changes; the
//! backend applies them at its own sample-accurate clock. Implementations
//! live outside this crate (the application ships a cpal-backed one), while
//! [`MockGraph`] records every operation for lifecycle tests.

use std::sync::Arc;

use glam::Vec3;

use crate::config::{SampleBuffer, Waveform};
use crate::Result;

/// Opaque handle to a node owned by the backend.
pub type NodeId = u64;

/// Distance-attenuation settings applied to every spatial voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PannerSettings {
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
}

impl Default for PannerSettings {
    fn default() -> Self {
        Self {
            ref_distance: 1.0,
            max_distance: 20.0,
            rolloff: 1.0,
        }
    }
}

/// Node-factory and parameter-scheduling interface of the audio subsystem.
///
/// Position setting comes in two flavours: per-axis parameters and a legacy
/// single-call fallback. [`AudioGraph::has_position_params`] is queried once
/// at voice creation so per-frame updates never branch on capability.
pub trait AudioGraph {
    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId;
    fn create_buffer_source(
        &mut self,
        buffer: Arc<SampleBuffer>,
        looped: bool,
        playback_rate: f32,
    ) -> NodeId;
    fn create_gain(&mut self, level: f32) -> NodeId;
    fn create_panner(&mut self, settings: PannerSettings) -> NodeId;

    fn connect(&mut self, from: NodeId, to: NodeId);
    fn connect_to_output(&mut self, from: NodeId);
    fn disconnect(&mut self, node: NodeId);

    fn start_source(&mut self, node: NodeId);
    fn stop_source(&mut self, node: NodeId);

    /// Sets a gain immediately, applied on the next rendering quantum.
    fn set_gain(&mut self, node: NodeId, level: f32);
    /// Linearly ramps a gain to `target` over `seconds`.
    fn ramp_gain(&mut self, node: NodeId, target: f32, seconds: f32);

    /// Whether per-axis position parameters are available.
    fn has_position_params(&self) -> bool;
    fn set_position(&mut self, node: NodeId, position: Vec3);
    /// Single-call positioning fallback for backends without per-axis
    /// parameters.
    fn set_position_legacy(&mut self, node: NodeId, position: Vec3);

    /// Resumes a suspended output. Fails with
    /// [`crate::ShapeAudioError::AudioBlocked`] if the backend stays
    /// suspended.
    fn resume(&mut self) -> Result<()>;

    /// Decodes raw bytes into a playable buffer. Fails with
    /// [`crate::ShapeAudioError::Decode`] on malformed input.
    fn decode(&mut self, bytes: &[u8]) -> Result<SampleBuffer>;

    /// The backend's clock, in seconds. Monotonic; used to time deferred
    /// voice teardown against the scheduled gain ramps.
    fn now(&self) -> f64;
}

mod mock;

pub use mock::{GraphOp, MockGraph};
