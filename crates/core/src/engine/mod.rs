//! Per-frame driver coupling geometry, renderer and audio voices.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::AnimationClock;
use crate::config::{ConfigSnapshot, SourceType};
use crate::geometry;
use crate::graph::AudioGraph;
use crate::render::FrameSink;
use crate::voice::VoiceManager;
use crate::Result;

/// Audio subsystem state. `Building`, `Rebuilding` and `TearingDown` are
/// transient: they only exist inside a single engine call, so observers see
/// voices existing continuously across a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Building,
    Playing,
    Rebuilding,
    TearingDown,
}

/// The synchronization engine: owns the animation clock, the voice set and
/// the configuration snapshot, and drives one tick per rendered frame.
///
/// Within a tick, geometry is computed once and pushed to both the renderer
/// sink and the voice panners, so light and sound always agree on where the
/// vertices are.
#[derive(Debug)]
pub struct Engine<G: AudioGraph> {
    graph: G,
    clock: AnimationClock,
    voices: VoiceManager,
    config: ConfigSnapshot,
    state: PlaybackState,
}

impl<G: AudioGraph> Engine<G> {
    pub fn new(graph: G) -> Self {
        Self::with_config(graph, ConfigSnapshot::default())
    }

    pub fn with_config(graph: G, config: ConfigSnapshot) -> Self {
        Self {
            graph,
            clock: AnimationClock::new(),
            voices: VoiceManager::new(),
            config,
            state: PlaybackState::Stopped,
        }
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Playing | PlaybackState::Rebuilding
        )
    }

    pub fn voice_count(&self) -> usize {
        self.voices.voice_count()
    }

    /// Starts playback: resumes the output if it was suspended, then builds
    /// one voice per vertex of the active shape. A resume refusal leaves the
    /// engine cleanly stopped; the next play attempt resumes again.
    pub fn play(&mut self) -> Result<()> {
        if self.is_playing() {
            return Ok(());
        }
        self.graph.resume()?;
        self.state = PlaybackState::Building;
        self.voices.build(&mut self.graph, &self.config);
        self.state = PlaybackState::Playing;
        info!(shape = self.config.shape.key(), "playback started");
        Ok(())
    }

    /// Stops playback with a fade; node release happens on subsequent ticks
    /// once the fade window has elapsed. Idempotent.
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.state = PlaybackState::TearingDown;
        self.voices.teardown(&mut self.graph);
        self.state = PlaybackState::Stopped;
        info!("playback stopped");
    }

    /// Replaces the configuration snapshot. A structural change while
    /// playing triggers exactly one teardown followed by one build; the old
    /// voices fade out while the new ones fade in, and the engine reports
    /// playing throughout. Non-structural edits are absorbed by the next
    /// tick.
    pub fn apply_config(&mut self, next: ConfigSnapshot) {
        let rebuild = self.is_playing() && next.is_structural_change(&self.config);
        self.config = next;
        if rebuild {
            self.state = PlaybackState::Rebuilding;
            self.voices.build(&mut self.graph, &self.config);
            self.state = PlaybackState::Playing;
            info!(
                shape = self.config.shape.key(),
                voices = self.voices.voice_count(),
                "voices rebuilt after structural change"
            );
        }
    }

    /// Decodes raw bytes and, on success, switches the configuration to loop
    /// the new sample. A decode failure leaves the current configuration and
    /// voice set untouched.
    pub fn load_sample(&mut self, bytes: &[u8]) -> Result<()> {
        let buffer = match self.graph.decode(bytes) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(%err, "sample decode failed; keeping the active source");
                return Err(err);
            }
        };
        info!(
            seconds = buffer.duration_seconds(),
            sample_rate = buffer.sample_rate,
            "sample decoded"
        );
        let mut next = self.config.clone();
        next.sample = Some(Arc::new(buffer));
        next.source_type = SourceType::Sample;
        self.apply_config(next);
        Ok(())
    }

    /// Zeroes the rotation angle and elevation phase. Audio is unaffected.
    pub fn reset_motion(&mut self) {
        self.clock.reset();
    }

    /// Advances one frame: clock, geometry, renderer publication, panner
    /// positions, master volume, then deferred voice release. Geometry is
    /// computed before either consumer sees it, so both receive the
    /// identical vertex set.
    pub fn tick(&mut self, dt: f32, sink: &mut dyn FrameSink) {
        self.clock.advance(dt, self.config.orbit_speed);
        let elevation = self.clock.elevation(
            self.config.auto_elevation,
            self.config.elev_speed,
            self.config.elev_range,
        );

        let def = self.config.shape.definition();
        let vertices =
            geometry::vertex_positions(def, self.config.radius, self.clock.rotation(), elevation);
        let edges = geometry::edge_list(def);

        sink.publish(&vertices, &edges, elevation);

        if self.is_playing() {
            self.voices.update_positions(&mut self.graph, &vertices);
            self.voices
                .set_master_volume(&mut self.graph, self.config.master_volume);
        }
        self.voices.reap(&mut self.graph);
    }

    /// Releases every audio resource immediately, including voices still
    /// inside their fade window. For shutdown paths where no further ticks
    /// will run.
    pub fn shutdown(&mut self) {
        self.voices.finalize(&mut self.graph);
        self.state = PlaybackState::Stopped;
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ShapeKind;
    use crate::config::Waveform;
    use crate::graph::{GraphOp, MockGraph};
    use crate::render::{CapturingSink, NullSink};
    use crate::voice::FADE_SECONDS;

    fn playing_engine() -> Engine<MockGraph> {
        let mut engine = Engine::new(MockGraph::new());
        engine.play().unwrap();
        engine
    }

    #[test]
    fn play_builds_one_voice_per_vertex() {
        let engine = playing_engine();
        assert!(engine.is_playing());
        assert_eq!(engine.voice_count(), 3);
    }

    #[test]
    fn structural_change_rebuilds_once_and_stays_playing() {
        let mut engine = playing_engine();
        engine.graph_mut().clear_ops();

        let mut next = engine.config().clone();
        next.waveform = Waveform::Square;
        engine.apply_config(next);

        assert!(engine.is_playing());
        assert_eq!(engine.state(), PlaybackState::Playing);
        // Exactly one teardown: the three old voice gains ramp to silence.
        let fade_outs = engine.graph().count(
            |op| matches!(op, GraphOp::RampGain { target, .. } if *target == 0.0),
        );
        assert_eq!(fade_outs, 3);
        // Exactly one build: three new oscillators at the new waveform.
        let created = engine.graph().count(|op| {
            matches!(
                op,
                GraphOp::CreateOscillator {
                    waveform: Waveform::Square,
                    ..
                }
            )
        });
        assert_eq!(created, 3);
    }

    #[test]
    fn shape_change_updates_the_voice_count() {
        let mut engine = playing_engine();
        let mut next = engine.config().clone();
        next.shape = ShapeKind::Circle;
        engine.apply_config(next);
        assert_eq!(engine.voice_count(), 8);

        let mut next = engine.config().clone();
        next.shape = ShapeKind::Pyramid;
        engine.apply_config(next);
        assert_eq!(engine.voice_count(), 5);
    }

    #[test]
    fn non_structural_change_never_touches_the_voice_topology() {
        let mut engine = playing_engine();
        engine.graph_mut().clear_ops();

        let mut next = engine.config().clone();
        next.radius = 5.0;
        next.orbit_speed = 1.5;
        next.master_volume = 0.8;
        engine.apply_config(next);
        engine.tick(0.016, &mut NullSink);

        let graph = engine.graph();
        assert_eq!(graph.count(|op| matches!(op, GraphOp::CreateGain { .. })), 0);
        assert_eq!(graph.count(|op| matches!(op, GraphOp::StopSource { .. })), 0);
        assert_eq!(graph.count(|op| matches!(op, GraphOp::RampGain { .. })), 0);
    }

    #[test]
    fn published_frame_matches_panner_positions() {
        let mut engine = playing_engine();
        let mut sink = CapturingSink::default();
        engine.tick(0.02, &mut sink);

        assert_eq!(sink.frames, 1);
        assert_eq!(sink.vertices.len(), 3);
        assert_eq!(sink.edges, vec![(0, 1), (1, 2), (2, 0)]);
        let panners: Vec<_> = engine
            .graph()
            .ops()
            .iter()
            .filter_map(|op| match op {
                GraphOp::SetPosition { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(panners, sink.vertices);
    }

    #[test]
    fn ticking_while_stopped_still_animates_but_stays_silent() {
        let mut engine = Engine::new(MockGraph::new());
        let mut sink = CapturingSink::default();
        engine.tick(0.05, &mut sink);

        assert_eq!(sink.frames, 1);
        assert!(!engine.is_playing());
        assert_eq!(
            engine
                .graph()
                .count(|op| matches!(op, GraphOp::SetPosition { .. })),
            0
        );
    }

    #[test]
    fn stop_releases_voices_after_the_fade_window() {
        let mut engine = playing_engine();
        engine.stop();
        assert!(!engine.is_playing());
        assert_eq!(engine.voice_count(), 0);

        engine.graph_mut().advance(FADE_SECONDS as f64 + 0.01);
        engine.tick(0.016, &mut NullSink);
        assert_eq!(
            engine
                .graph()
                .count(|op| matches!(op, GraphOp::StopSource { .. })),
            3
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let mut engine = playing_engine();
        engine.stop();
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn blocked_output_fails_play_and_recovers_on_the_next_attempt() {
        let mut graph = MockGraph::new();
        graph.blocked = true;
        let mut engine = Engine::new(graph);

        assert!(engine.play().is_err());
        assert!(!engine.is_playing());
        assert_eq!(engine.voice_count(), 0);

        engine.play().unwrap();
        assert!(engine.is_playing());
    }

    #[test]
    fn decode_failure_leaves_the_voice_set_and_source_intact() {
        let mut engine = playing_engine();
        let before = engine.config().source_type;

        assert!(engine.load_sample(&[]).is_err());
        assert_eq!(engine.config().source_type, before);
        assert!(engine.config().sample.is_none());
        assert_eq!(engine.voice_count(), 3);
    }

    #[test]
    fn successful_decode_switches_to_the_sample_source() {
        let mut engine = playing_engine();
        engine.load_sample(&[1, 2, 3, 4]).unwrap();

        assert_eq!(engine.config().source_type, SourceType::Sample);
        assert!(engine.config().sample.is_some());
        assert!(engine.is_playing());
        assert_eq!(
            engine
                .graph()
                .count(|op| matches!(op, GraphOp::CreateBufferSource { .. })),
            3
        );
    }

    #[test]
    fn reset_motion_returns_the_frame_to_origin() {
        let mut engine = playing_engine();
        let mut next = engine.config().clone();
        next.orbit_speed = 0.0;
        next.auto_elevation = false;
        engine.apply_config(next);

        for _ in 0..10 {
            engine.tick(0.016, &mut NullSink);
        }
        engine.reset_motion();
        let mut sink = CapturingSink::default();
        engine.tick(0.016, &mut sink);

        assert_eq!(engine.clock().rotation(), 0.0);
        assert_eq!(sink.elevation, 0.0);
        assert!(engine.is_playing());
    }

    #[test]
    fn rotation_continues_across_radius_edits() {
        let mut engine = playing_engine();
        for _ in 0..30 {
            engine.tick(0.016, &mut NullSink);
        }
        let before = engine.clock().rotation();

        let mut next = engine.config().clone();
        next.radius = 7.5;
        engine.apply_config(next);
        assert_eq!(engine.clock().rotation(), before);
    }

    #[test]
    fn shutdown_releases_everything_immediately() {
        let mut engine = playing_engine();
        engine.shutdown();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(
            engine
                .graph()
                .count(|op| matches!(op, GraphOp::StopSource { .. })),
            3
        );
    }
}
