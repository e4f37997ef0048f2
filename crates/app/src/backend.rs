//! cpal-backed implementation of the core audio-node interface.
//!
//! The engine wires node handles together; this module owns the real node
//! graph behind a mutex shared with the cpal output callback. Parameter
//! changes (gain ramps, positions) are picked up by the callback at its own
//! buffer granularity. Chains are short (source → gain → panner → master),
//! so the callback resolves each started source's downstream path per buffer
//! and mixes into an interleaved stereo frame.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_4, TAU};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use glam::Vec3;
use tracing::{debug, warn};

use audio_shapes_core::{
    AudioGraph, NodeId, PannerSettings, Result, SampleBuffer, ShapeAudioError, Waveform,
};

/// Gain ramp in progress, linear in output frames.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: f32,
    to: f32,
    start_frame: u64,
    end_frame: u64,
}

#[derive(Debug)]
enum NodeKind {
    Oscillator {
        waveform: Waveform,
        frequency: f32,
        phase: f32,
        running: bool,
    },
    BufferSource {
        buffer: Arc<SampleBuffer>,
        looped: bool,
        playback_rate: f32,
        cursor: f64,
        running: bool,
    },
    Gain {
        level: f32,
        ramp: Option<Ramp>,
    },
    Panner {
        settings: PannerSettings,
        position: Vec3,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connection {
    Node(NodeId),
    Output,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    output: Option<Connection>,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<NodeId, Node>,
    next_id: NodeId,
    /// Output frames rendered so far; the backend clock.
    frames: u64,
    sample_rate: u32,
}

impl GraphState {
    fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(id, Node { kind, output: None });
        id
    }

    fn gain_value(&self, id: NodeId, frame: u64) -> f32 {
        match self.nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::Gain { level, ramp }) => match ramp {
                Some(r) if frame < r.end_frame => {
                    if frame <= r.start_frame {
                        r.from
                    } else {
                        let span = (r.end_frame - r.start_frame) as f32;
                        let t = (frame - r.start_frame) as f32 / span;
                        r.from + (r.to - r.from) * t
                    }
                }
                Some(r) => r.to,
                None => *level,
            },
            _ => 1.0,
        }
    }
}

/// The downstream path of one started source, resolved once per buffer.
struct ResolvedVoice {
    source: NodeId,
    gains: Vec<NodeId>,
    panner: Option<(Vec3, PannerSettings)>,
}

/// Renders one buffer of interleaved output frames.
fn render(state: &mut GraphState, data: &mut [f32], channels: usize) {
    let voices = resolve_voices(state);
    let n_frames = data.len() / channels;

    for frame_idx in 0..n_frames {
        let frame = state.frames + frame_idx as u64;
        let mut left = 0.0f32;
        let mut right = 0.0f32;

        for voice in &voices {
            let sample = next_source_sample(state, voice.source);
            let mut level = sample;
            for gain in &voice.gains {
                level *= state.gain_value(*gain, frame);
            }
            let (l, r) = match &voice.panner {
                Some((position, settings)) => spatialize(level, *position, settings),
                None => (level, level),
            };
            left += l;
            right += r;
        }

        let base = frame_idx * channels;
        match channels {
            1 => data[base] = 0.5 * (left + right),
            _ => {
                data[base] = left;
                data[base + 1] = right;
                for ch in 2..channels {
                    data[base + ch] = 0.0;
                }
            }
        }
    }

    state.frames += n_frames as u64;
    finish_ramps(state);
}

fn resolve_voices(state: &GraphState) -> Vec<ResolvedVoice> {
    let mut voices = Vec::new();
    for (&id, node) in &state.nodes {
        let running = match &node.kind {
            NodeKind::Oscillator { running, .. } => *running,
            NodeKind::BufferSource { running, .. } => *running,
            _ => false,
        };
        if !running {
            continue;
        }

        let mut gains = Vec::new();
        let mut panner = None;
        let mut hop = node.output;
        let mut reaches_output = false;
        // Cycles cannot form through `connect`, but cap the walk anyway.
        for _ in 0..8 {
            match hop {
                Some(Connection::Output) => {
                    reaches_output = true;
                    break;
                }
                Some(Connection::Node(next)) => match state.nodes.get(&next) {
                    Some(next_node) => {
                        match &next_node.kind {
                            NodeKind::Gain { .. } => gains.push(next),
                            NodeKind::Panner { settings, position } => {
                                panner = Some((*position, *settings));
                            }
                            _ => {}
                        }
                        hop = next_node.output;
                    }
                    None => break,
                },
                None => break,
            }
        }
        if reaches_output {
            voices.push(ResolvedVoice {
                source: id,
                gains,
                panner,
            });
        }
    }
    // Deterministic mixing order.
    voices.sort_by_key(|v| v.source);
    voices
}

fn next_source_sample(state: &mut GraphState, id: NodeId) -> f32 {
    let sample_rate = state.sample_rate.max(1) as f32;
    let Some(node) = state.nodes.get_mut(&id) else {
        return 0.0;
    };
    match &mut node.kind {
        NodeKind::Oscillator {
            waveform,
            frequency,
            phase,
            ..
        } => {
            let value = waveform_sample(*waveform, *phase);
            *phase = (*phase + *frequency / sample_rate).fract();
            value
        }
        NodeKind::BufferSource {
            buffer,
            looped,
            playback_rate,
            cursor,
            running,
        } => {
            let len = buffer.samples.len();
            if len == 0 {
                return 0.0;
            }
            if *cursor >= len as f64 {
                if *looped {
                    *cursor %= len as f64;
                } else {
                    *running = false;
                    return 0.0;
                }
            }
            let i = *cursor as usize;
            let frac = (*cursor - i as f64) as f32;
            let a = buffer.samples[i];
            let b = buffer.samples[(i + 1) % len];
            let value = a + (b - a) * frac;
            *cursor += *playback_rate as f64 * buffer.sample_rate as f64 / sample_rate as f64;
            value
        }
        _ => 0.0,
    }
}

fn waveform_sample(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (phase * TAU).sin(),
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
    }
}

/// Inverse-distance attenuation plus equal-power stereo panning, listener at
/// the origin.
fn spatialize(sample: f32, position: Vec3, settings: &PannerSettings) -> (f32, f32) {
    let distance = position
        .length()
        .clamp(settings.ref_distance, settings.max_distance);
    let attenuation = settings.ref_distance
        / (settings.ref_distance + settings.rolloff * (distance - settings.ref_distance));

    let lateral = (position.x * position.x + position.z * position.z).sqrt();
    let pan = if lateral > f32::EPSILON {
        (position.x / lateral).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let angle = (pan + 1.0) * FRAC_PI_4;
    let value = sample * attenuation;
    (value * angle.cos(), value * angle.sin())
}

fn finish_ramps(state: &mut GraphState) {
    let frame = state.frames;
    for node in state.nodes.values_mut() {
        if let NodeKind::Gain { level, ramp } = &mut node.kind {
            if let Some(r) = ramp {
                if frame >= r.end_frame {
                    *level = r.to;
                    *ramp = None;
                }
            }
        }
    }
}

/// Real-time audio backend speaking the [`AudioGraph`] interface over a cpal
/// output stream. The stream is opened lazily on the first `resume`, which
/// doubles as the suspended-output recovery path.
pub struct CpalBackend {
    state: Arc<Mutex<GraphState>>,
    stream: Option<cpal::Stream>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GraphState {
                sample_rate: 48_000,
                ..GraphState::default()
            })),
            stream: None,
        }
    }

    fn open_stream(&mut self) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(ShapeAudioError::AudioBlocked)?;
        let supported = device
            .default_output_config()
            .map_err(|_| ShapeAudioError::AudioBlocked)?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        if let Ok(mut state) = self.state.lock() {
            state.sample_rate = sample_rate;
        }

        let shared = Arc::clone(&self.state);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    match shared.lock() {
                        Ok(mut state) => render(&mut state, data, channels),
                        Err(_) => data.fill(0.0),
                    }
                },
                |err| warn!(%err, "output stream error"),
                None,
            )
            .map_err(|_| ShapeAudioError::AudioBlocked)?;
        stream.play().map_err(|_| ShapeAudioError::AudioBlocked)?;

        debug!(sample_rate, channels, "output stream opened");
        self.stream = Some(stream);
        Ok(())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut GraphState) -> R) -> Option<R> {
        self.state.lock().ok().map(|mut state| f(&mut state))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioGraph for CpalBackend {
    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        self.with_state(|s| {
            s.insert(NodeKind::Oscillator {
                waveform,
                frequency,
                phase: 0.0,
                running: false,
            })
        })
        .unwrap_or(0)
    }

    fn create_buffer_source(
        &mut self,
        buffer: Arc<SampleBuffer>,
        looped: bool,
        playback_rate: f32,
    ) -> NodeId {
        self.with_state(|s| {
            s.insert(NodeKind::BufferSource {
                buffer,
                looped,
                playback_rate,
                cursor: 0.0,
                running: false,
            })
        })
        .unwrap_or(0)
    }

    fn create_gain(&mut self, level: f32) -> NodeId {
        self.with_state(|s| s.insert(NodeKind::Gain { level, ramp: None }))
            .unwrap_or(0)
    }

    fn create_panner(&mut self, settings: PannerSettings) -> NodeId {
        self.with_state(|s| {
            s.insert(NodeKind::Panner {
                settings,
                position: Vec3::ZERO,
            })
        })
        .unwrap_or(0)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        self.with_state(|s| {
            if let Some(node) = s.nodes.get_mut(&from) {
                node.output = Some(Connection::Node(to));
            }
        });
    }

    fn connect_to_output(&mut self, from: NodeId) {
        self.with_state(|s| {
            if let Some(node) = s.nodes.get_mut(&from) {
                node.output = Some(Connection::Output);
            }
        });
    }

    fn disconnect(&mut self, node: NodeId) {
        self.with_state(|s| {
            s.nodes.remove(&node);
        });
    }

    fn start_source(&mut self, node: NodeId) {
        self.with_state(|s| {
            if let Some(n) = s.nodes.get_mut(&node) {
                match &mut n.kind {
                    NodeKind::Oscillator { running, .. } => *running = true,
                    NodeKind::BufferSource { running, .. } => *running = true,
                    _ => {}
                }
            }
        });
    }

    fn stop_source(&mut self, node: NodeId) {
        self.with_state(|s| {
            if let Some(n) = s.nodes.get_mut(&node) {
                match &mut n.kind {
                    NodeKind::Oscillator { running, .. } => *running = false,
                    NodeKind::BufferSource { running, .. } => *running = false,
                    _ => {}
                }
            }
        });
    }

    fn set_gain(&mut self, node: NodeId, new_level: f32) {
        self.with_state(|s| {
            if let Some(n) = s.nodes.get_mut(&node) {
                if let NodeKind::Gain { level, ramp } = &mut n.kind {
                    *level = new_level;
                    *ramp = None;
                }
            }
        });
    }

    fn ramp_gain(&mut self, node: NodeId, target: f32, seconds: f32) {
        self.with_state(|s| {
            let frame = s.frames;
            let from = s.gain_value(node, frame);
            let span = (seconds.max(0.0) * s.sample_rate as f32) as u64;
            if let Some(n) = s.nodes.get_mut(&node) {
                if let NodeKind::Gain { ramp, .. } = &mut n.kind {
                    *ramp = Some(Ramp {
                        from,
                        to: target,
                        start_frame: frame,
                        end_frame: frame + span.max(1),
                    });
                }
            }
        });
    }

    fn has_position_params(&self) -> bool {
        true
    }

    fn set_position(&mut self, node: NodeId, new_position: Vec3) {
        self.with_state(|s| {
            if let Some(n) = s.nodes.get_mut(&node) {
                if let NodeKind::Panner { position, .. } = &mut n.kind {
                    *position = new_position;
                }
            }
        });
    }

    fn set_position_legacy(&mut self, node: NodeId, position: Vec3) {
        self.set_position(node, position);
    }

    fn resume(&mut self) -> Result<()> {
        match &self.stream {
            Some(stream) => stream.play().map_err(|_| ShapeAudioError::AudioBlocked),
            None => self.open_stream(),
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<SampleBuffer> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| ShapeAudioError::Decode(e.to_string()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| ShapeAudioError::Decode(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| ShapeAudioError::Decode(e.to_string()))?
            }
        };
        if interleaved.is_empty() {
            return Err(ShapeAudioError::Decode("no audio frames".to_string()));
        }

        // Mixdown to mono; the panners do the spatial work.
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Ok(SampleBuffer {
            sample_rate: spec.sample_rate,
            samples,
        })
    }

    fn now(&self) -> f64 {
        self.with_state(|s| s.frames as f64 / s.sample_rate.max(1) as f64)
            .unwrap_or(0.0)
    }
}
