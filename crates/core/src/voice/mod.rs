//! Voice lifecycle: one spatial audio source per shape vertex.

use glam::Vec3;
use tracing::debug;

use crate::config::{ConfigSnapshot, SourceType};
use crate::graph::{AudioGraph, NodeId, PannerSettings};

/// Nominal per-voice level before the master stage.
const VOICE_LEVEL: f32 = 0.6;

/// Fade duration for both voice creation and teardown, in seconds. Kept
/// symmetric so rapid structural rebuilds cross-fade without a perceptible
/// dip.
pub const FADE_SECONDS: f32 = 0.05;

/// Node chain of one active voice. `source → gain → panner → master`.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    pub source: NodeId,
    pub gain: NodeId,
    pub panner: NodeId,
}

/// A voice that has been faded out but whose nodes are still alive until the
/// fade window has elapsed. Disconnecting while still audible clicks.
#[derive(Debug)]
struct RetiredVoice {
    source: NodeId,
    gain: NodeId,
    panner: NodeId,
    deadline: f64,
}

/// How panner positions are pushed each frame, resolved once per build from
/// the backend's capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionStrategy {
    PerAxis,
    Legacy,
}

/// Owns the active voice set and the master output gain stage.
///
/// Only the sync loop (positions, volume) and the rebuild trigger may touch
/// this state. Voice `i` is always positioned at vertex `i` of the same
/// frame's geometry.
#[derive(Debug, Default)]
pub struct VoiceManager {
    voices: Vec<Voice>,
    master: Option<NodeId>,
    strategy: Option<PositionStrategy>,
    retired: Vec<RetiredVoice>,
    retired_masters: Vec<(NodeId, f64)>,
}

impl VoiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// True while faded-out voices are still waiting to be reaped.
    pub fn has_pending_teardown(&self) -> bool {
        !self.retired.is_empty() || !self.retired_masters.is_empty()
    }

    /// Tears down any existing voices, then creates one voice per vertex of
    /// the active shape. Each voice fades in from silence over
    /// [`FADE_SECONDS`]; all voices route through a fresh master gain stage
    /// at `config.master_volume`.
    pub fn build(&mut self, graph: &mut dyn AudioGraph, config: &ConfigSnapshot) {
        self.teardown(graph);

        let master = graph.create_gain(config.master_volume);
        graph.connect_to_output(master);
        self.master = Some(master);

        let strategy = if graph.has_position_params() {
            PositionStrategy::PerAxis
        } else {
            PositionStrategy::Legacy
        };
        self.strategy = Some(strategy);

        let def = config.shape.definition();
        // Sample mode without a decoded buffer falls back to the oscillator.
        let sample = match config.source_type {
            SourceType::Sample => config.sample.as_ref(),
            SourceType::Synth => None,
        };

        for i in 0..def.vertex_count() {
            let interval = def.interval(i);
            let panner = graph.create_panner(PannerSettings::default());

            let gain = graph.create_gain(0.0);
            graph.ramp_gain(gain, VOICE_LEVEL, FADE_SECONDS);

            let source = match sample {
                Some(buffer) => graph.create_buffer_source(buffer.clone(), true, interval),
                None => graph.create_oscillator(config.waveform, config.base_frequency * interval),
            };

            graph.connect(source, gain);
            graph.connect(gain, panner);
            graph.connect(panner, master);
            graph.start_source(source);

            self.voices.push(Voice {
                source,
                gain,
                panner,
            });
        }

        debug!(
            shape = config.shape.key(),
            voices = self.voices.len(),
            legacy = matches!(strategy, PositionStrategy::Legacy),
            "voices built"
        );
    }

    /// Fades every active voice to silence and queues its nodes for release
    /// once the fade window has elapsed (see [`VoiceManager::reap`]). The
    /// master stage stays connected until its last voice is released.
    /// Idempotent: a no-op on an empty voice set.
    pub fn teardown(&mut self, graph: &mut dyn AudioGraph) {
        if self.voices.is_empty() && self.master.is_none() {
            return;
        }

        let deadline = graph.now() + FADE_SECONDS as f64;
        let fading = self.voices.len();
        for voice in self.voices.drain(..) {
            graph.ramp_gain(voice.gain, 0.0, FADE_SECONDS);
            self.retired.push(RetiredVoice {
                source: voice.source,
                gain: voice.gain,
                panner: voice.panner,
                deadline,
            });
        }
        if let Some(master) = self.master.take() {
            self.retired_masters.push((master, deadline));
        }
        self.strategy = None;

        debug!(fading, "voices fading out");
    }

    /// Releases retired voices whose fade window has elapsed. Called once per
    /// frame by the sync loop.
    pub fn reap(&mut self, graph: &mut dyn AudioGraph) {
        let now = graph.now();
        let mut i = 0;
        while i < self.retired.len() {
            if self.retired[i].deadline <= now {
                let voice = self.retired.swap_remove(i);
                graph.stop_source(voice.source);
                graph.disconnect(voice.source);
                graph.disconnect(voice.gain);
                graph.disconnect(voice.panner);
            } else {
                i += 1;
            }
        }
        self.retired_masters.retain(|(master, deadline)| {
            if *deadline <= now {
                graph.disconnect(*master);
                false
            } else {
                true
            }
        });
    }

    /// Force-releases everything, fade deadlines included. Used on shutdown
    /// so no voice can outlive the engine.
    pub fn finalize(&mut self, graph: &mut dyn AudioGraph) {
        for voice in &self.voices {
            graph.ramp_gain(voice.gain, 0.0, FADE_SECONDS);
        }
        for voice in self.voices.drain(..) {
            graph.stop_source(voice.source);
            graph.disconnect(voice.source);
            graph.disconnect(voice.gain);
            graph.disconnect(voice.panner);
        }
        for voice in self.retired.drain(..) {
            graph.stop_source(voice.source);
            graph.disconnect(voice.source);
            graph.disconnect(voice.gain);
            graph.disconnect(voice.panner);
        }
        if let Some(master) = self.master.take() {
            graph.disconnect(master);
        }
        for (master, _) in self.retired_masters.drain(..) {
            graph.disconnect(master);
        }
        self.strategy = None;
    }

    /// Moves every voice's panner to its bound vertex for this frame. The
    /// positioning strategy was fixed at build time, so this never branches
    /// on backend capability.
    pub fn update_positions(&mut self, graph: &mut dyn AudioGraph, vertices: &[Vec3]) {
        let Some(strategy) = self.strategy else {
            return;
        };
        for (voice, position) in self.voices.iter().zip(vertices) {
            match strategy {
                PositionStrategy::PerAxis => graph.set_position(voice.panner, *position),
                PositionStrategy::Legacy => graph.set_position_legacy(voice.panner, *position),
            }
        }
    }

    /// Updates the master stage level. User-driven and continuous, so it is
    /// applied on the next rendering quantum without a ramp.
    pub fn set_master_volume(&mut self, graph: &mut dyn AudioGraph, level: f32) {
        if let Some(master) = self.master {
            graph.set_gain(master, level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ShapeKind;
    use crate::graph::{GraphOp, MockGraph};

    fn config_for(shape: ShapeKind) -> ConfigSnapshot {
        ConfigSnapshot {
            shape,
            ..ConfigSnapshot::default()
        }
    }

    #[test]
    fn build_creates_one_voice_per_vertex() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        for kind in ShapeKind::ALL {
            voices.build(&mut graph, &config_for(kind));
            assert_eq!(voices.voice_count(), kind.definition().vertex_count());
        }
    }

    #[test]
    fn oscillator_frequencies_follow_the_intervals() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        let mut config = config_for(ShapeKind::Square);
        config.base_frequency = 200.0;
        voices.build(&mut graph, &config);

        let freqs: Vec<f32> = graph
            .ops()
            .iter()
            .filter_map(|op| match op {
                GraphOp::CreateOscillator { frequency, .. } => Some(*frequency),
                _ => None,
            })
            .collect();
        assert_eq!(freqs, vec![200.0, 250.0, 300.0, 375.0]);
    }

    #[test]
    fn sample_mode_uses_intervals_as_playback_rates() {
        use crate::config::{SampleBuffer, SourceType};
        use std::sync::Arc;

        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        let mut config = config_for(ShapeKind::Triangle);
        config.source_type = SourceType::Sample;
        config.sample = Some(Arc::new(SampleBuffer {
            sample_rate: 48_000,
            samples: vec![0.0; 16],
        }));
        voices.build(&mut graph, &config);

        let rates: Vec<f32> = graph
            .ops()
            .iter()
            .filter_map(|op| match op {
                GraphOp::CreateBufferSource {
                    looped: true,
                    playback_rate,
                    ..
                } => Some(*playback_rate),
                _ => None,
            })
            .collect();
        assert_eq!(rates, vec![1.0, 1.25, 1.5]);
        assert_eq!(
            graph.count(|op| matches!(op, GraphOp::CreateOscillator { .. })),
            0
        );
    }

    #[test]
    fn sample_mode_without_a_buffer_falls_back_to_synth() {
        use crate::config::SourceType;

        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        let mut config = config_for(ShapeKind::Triangle);
        config.source_type = SourceType::Sample;
        voices.build(&mut graph, &config);

        assert_eq!(
            graph.count(|op| matches!(op, GraphOp::CreateOscillator { .. })),
            3
        );
    }

    #[test]
    fn voices_fade_in_from_silence() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        voices.build(&mut graph, &config_for(ShapeKind::Triangle));

        let voice_gains: Vec<NodeId> = voices.voices().iter().map(|v| v.gain).collect();
        for gain in voice_gains {
            assert!(graph.ops().contains(&GraphOp::CreateGain {
                id: gain,
                level: 0.0
            }));
            assert!(graph.ops().contains(&GraphOp::RampGain {
                node: gain,
                target: VOICE_LEVEL,
                seconds: FADE_SECONDS
            }));
        }
    }

    #[test]
    fn teardown_fades_then_releases_after_the_window() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        voices.build(&mut graph, &config_for(ShapeKind::Square));
        let old = voices.voices().to_vec();

        voices.teardown(&mut graph);
        assert_eq!(voices.voice_count(), 0);
        assert!(voices.has_pending_teardown());

        // Inside the fade window nothing is stopped or disconnected yet.
        voices.reap(&mut graph);
        assert_eq!(
            graph.count(|op| matches!(op, GraphOp::StopSource { .. })),
            0
        );

        graph.advance(FADE_SECONDS as f64 + 0.01);
        voices.reap(&mut graph);
        assert!(!voices.has_pending_teardown());
        for voice in &old {
            assert!(graph.ops().contains(&GraphOp::StopSource {
                node: voice.source
            }));
            assert!(graph.ops().contains(&GraphOp::Disconnect {
                node: voice.panner
            }));
        }
    }

    #[test]
    fn teardown_on_empty_set_is_a_no_op() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        voices.teardown(&mut graph);
        voices.teardown(&mut graph);
        assert!(graph.ops().is_empty());
    }

    #[test]
    fn positions_track_vertices_exactly() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        voices.build(&mut graph, &config_for(ShapeKind::Triangle));

        let verts = vec![
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-1.0, 0.5, 0.0),
            Vec3::new(0.0, -2.0, 4.0),
        ];
        voices.update_positions(&mut graph, &verts);
        for (voice, vertex) in voices.voices().iter().zip(&verts) {
            assert_eq!(graph.position_of(voice.panner), Some(*vertex));
        }
    }

    #[test]
    fn legacy_backend_gets_the_fallback_setter_without_per_frame_probing() {
        let mut graph = MockGraph::new();
        graph.legacy_positioning = true;
        let mut voices = VoiceManager::new();
        voices.build(&mut graph, &config_for(ShapeKind::Triangle));

        let verts = vec![Vec3::ZERO; 3];
        voices.update_positions(&mut graph, &verts);
        assert_eq!(
            graph.count(|op| matches!(op, GraphOp::SetPositionLegacy { .. })),
            3
        );
        assert_eq!(
            graph.count(|op| matches!(op, GraphOp::SetPosition { .. })),
            0
        );
    }

    #[test]
    fn master_volume_updates_without_a_rebuild() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        voices.build(&mut graph, &config_for(ShapeKind::Circle));
        graph.clear_ops();

        voices.set_master_volume(&mut graph, 0.85);
        assert_eq!(graph.count(|op| matches!(op, GraphOp::SetGain { .. })), 1);
        assert_eq!(
            graph.count(|op| matches!(op, GraphOp::CreateGain { .. })),
            0
        );
    }

    #[test]
    fn finalize_releases_everything_even_mid_fade() {
        let mut graph = MockGraph::new();
        let mut voices = VoiceManager::new();
        voices.build(&mut graph, &config_for(ShapeKind::Square));
        voices.teardown(&mut graph);
        voices.build(&mut graph, &config_for(ShapeKind::Circle));

        voices.finalize(&mut graph);
        assert_eq!(voices.voice_count(), 0);
        assert!(!voices.has_pending_teardown());
        // Four retired + eight active sources all stopped.
        assert_eq!(
            graph.count(|op| matches!(op, GraphOp::StopSource { .. })),
            12
        );
    }
}
