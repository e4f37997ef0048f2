//! Core library for the Audio Shapes application.
//!
//! The crate implements the geometry-to-audio synchronization engine: a
//! procedural vertex generator, an audio-voice lifecycle manager and the
//! per-frame coupling loop that keeps rendered positions and audio-source
//! positions identical. Rendering and the low-level audio nodes stay outside
//! this crate, behind the [`render::FrameSink`] and [`graph::AudioGraph`]
//! seams.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod render;
pub mod voice;

pub use catalog::{ShapeDefinition, ShapeKind, Topology};
pub use clock::AnimationClock;
pub use config::{ConfigSnapshot, SampleBuffer, SourceType, Waveform};
pub use engine::{Engine, PlaybackState};
pub use error::{Result, ShapeAudioError};
pub use graph::{AudioGraph, MockGraph, NodeId, PannerSettings};
pub use render::{FrameSink, NullSink};
pub use voice::VoiceManager;
