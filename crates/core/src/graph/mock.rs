use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;

use crate::config::{SampleBuffer, Waveform};
use crate::{Result, ShapeAudioError};

use super::{AudioGraph, NodeId, PannerSettings};

/// One recorded backend operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    CreateOscillator {
        id: NodeId,
        waveform: Waveform,
        frequency: f32,
    },
    CreateBufferSource {
        id: NodeId,
        looped: bool,
        playback_rate: f32,
    },
    CreateGain {
        id: NodeId,
        level: f32,
    },
    CreatePanner {
        id: NodeId,
    },
    Connect {
        from: NodeId,
        to: NodeId,
    },
    ConnectToOutput {
        from: NodeId,
    },
    Disconnect {
        node: NodeId,
    },
    StartSource {
        node: NodeId,
    },
    StopSource {
        node: NodeId,
    },
    SetGain {
        node: NodeId,
        level: f32,
    },
    RampGain {
        node: NodeId,
        target: f32,
        seconds: f32,
    },
    SetPosition {
        node: NodeId,
        position: Vec3,
    },
    SetPositionLegacy {
        node: NodeId,
        position: Vec3,
    },
    Resume,
}

/// In-memory [`AudioGraph`] that records every operation and tracks node
/// state, so tests can assert voice lifecycle behaviour without an audio
/// device. Time only moves when [`MockGraph::advance`] is called.
#[derive(Debug, Default)]
pub struct MockGraph {
    ops: Vec<GraphOp>,
    next_id: NodeId,
    time: f64,
    /// When set, per-axis position parameters report as unavailable and the
    /// legacy single-call setter is expected instead.
    pub legacy_positioning: bool,
    /// When set, `resume` fails once with `AudioBlocked`, then clears.
    pub blocked: bool,
    gains: HashMap<NodeId, f32>,
    positions: HashMap<NodeId, Vec3>,
}

impl MockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[GraphOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn advance(&mut self, seconds: f64) {
        self.time += seconds;
    }

    pub fn gain_of(&self, node: NodeId) -> Option<f32> {
        self.gains.get(&node).copied()
    }

    pub fn position_of(&self, node: NodeId) -> Option<Vec3> {
        self.positions.get(&node).copied()
    }

    pub fn count(&self, matches: impl Fn(&GraphOp) -> bool) -> usize {
        self.ops.iter().filter(|op| matches(*op)).count()
    }

    fn fresh_id(&mut self) -> NodeId {
        self.next_id += 1;
        self.next_id
    }
}

impl AudioGraph for MockGraph {
    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        let id = self.fresh_id();
        self.ops.push(GraphOp::CreateOscillator {
            id,
            waveform,
            frequency,
        });
        id
    }

    fn create_buffer_source(
        &mut self,
        _buffer: Arc<SampleBuffer>,
        looped: bool,
        playback_rate: f32,
    ) -> NodeId {
        let id = self.fresh_id();
        self.ops.push(GraphOp::CreateBufferSource {
            id,
            looped,
            playback_rate,
        });
        id
    }

    fn create_gain(&mut self, level: f32) -> NodeId {
        let id = self.fresh_id();
        self.gains.insert(id, level);
        self.ops.push(GraphOp::CreateGain { id, level });
        id
    }

    fn create_panner(&mut self, _settings: PannerSettings) -> NodeId {
        let id = self.fresh_id();
        self.ops.push(GraphOp::CreatePanner { id });
        id
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        self.ops.push(GraphOp::Connect { from, to });
    }

    fn connect_to_output(&mut self, from: NodeId) {
        self.ops.push(GraphOp::ConnectToOutput { from });
    }

    fn disconnect(&mut self, node: NodeId) {
        self.ops.push(GraphOp::Disconnect { node });
    }

    fn start_source(&mut self, node: NodeId) {
        self.ops.push(GraphOp::StartSource { node });
    }

    fn stop_source(&mut self, node: NodeId) {
        self.ops.push(GraphOp::StopSource { node });
    }

    fn set_gain(&mut self, node: NodeId, level: f32) {
        self.gains.insert(node, level);
        self.ops.push(GraphOp::SetGain { node, level });
    }

    fn ramp_gain(&mut self, node: NodeId, target: f32, seconds: f32) {
        // The mock applies ramps instantly; only the schedule is recorded.
        self.gains.insert(node, target);
        self.ops.push(GraphOp::RampGain {
            node,
            target,
            seconds,
        });
    }

    fn has_position_params(&self) -> bool {
        !self.legacy_positioning
    }

    fn set_position(&mut self, node: NodeId, position: Vec3) {
        assert!(
            !self.legacy_positioning,
            "per-axis positioning used on a legacy-only backend"
        );
        self.positions.insert(node, position);
        self.ops.push(GraphOp::SetPosition { node, position });
    }

    fn set_position_legacy(&mut self, node: NodeId, position: Vec3) {
        self.positions.insert(node, position);
        self.ops.push(GraphOp::SetPositionLegacy { node, position });
    }

    fn resume(&mut self) -> Result<()> {
        self.ops.push(GraphOp::Resume);
        if self.blocked {
            self.blocked = false;
            return Err(ShapeAudioError::AudioBlocked);
        }
        Ok(())
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<SampleBuffer> {
        if bytes.is_empty() {
            return Err(ShapeAudioError::Decode("empty input".to_string()));
        }
        Ok(SampleBuffer {
            sample_rate: 48_000,
            samples: vec![0.0; 48],
        })
    }

    fn now(&self) -> f64 {
        self.time
    }
}
