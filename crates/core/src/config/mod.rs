use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::ShapeKind;
use crate::{Result, ShapeAudioError};

/// Oscillator waveform for synth voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

impl Waveform {
    pub fn from_key(key: &str) -> Result<Self> {
        match key {
            "sine" => Ok(Self::Sine),
            "sawtooth" => Ok(Self::Sawtooth),
            "square" => Ok(Self::Square),
            "triangle" => Ok(Self::Triangle),
            other => Err(ShapeAudioError::msg(format!("unknown waveform `{other}`"))),
        }
    }
}

/// How each voice generates its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Oscillator at `base_frequency · interval`.
    Synth,
    /// Looping decoded sample with the interval as playback rate.
    Sample,
}

/// Decoded PCM audio, as produced by the backend's decoder. Mono: spatial
/// positioning happens in the panner, not in the source material.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Immutable-per-frame bundle of every user-tunable parameter.
///
/// The UI layer replaces the whole snapshot on edit; the engine reads one
/// consistent snapshot per tick and never observes a partial update. The
/// decoded sample buffer is runtime state and is excluded from presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default = "defaults::shape")]
    pub shape: ShapeKind,
    #[serde(default = "defaults::radius")]
    pub radius: f32,
    #[serde(default = "defaults::orbit_speed")]
    pub orbit_speed: f32,
    #[serde(default = "defaults::auto_elevation")]
    pub auto_elevation: bool,
    #[serde(default = "defaults::elev_speed")]
    pub elev_speed: f32,
    #[serde(default = "defaults::elev_range")]
    pub elev_range: f32,
    #[serde(default = "defaults::master_volume")]
    pub master_volume: f32,
    #[serde(default = "defaults::source_type")]
    pub source_type: SourceType,
    #[serde(default = "defaults::waveform")]
    pub waveform: Waveform,
    #[serde(default = "defaults::base_frequency")]
    pub base_frequency: f32,
    #[serde(skip)]
    pub sample: Option<Arc<SampleBuffer>>,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            shape: defaults::shape(),
            radius: defaults::radius(),
            orbit_speed: defaults::orbit_speed(),
            auto_elevation: defaults::auto_elevation(),
            elev_speed: defaults::elev_speed(),
            elev_range: defaults::elev_range(),
            master_volume: defaults::master_volume(),
            source_type: defaults::source_type(),
            waveform: defaults::waveform(),
            base_frequency: defaults::base_frequency(),
            sample: None,
        }
    }
}

impl ConfigSnapshot {
    /// True when switching from `previous` to `self` invalidates the current
    /// voice topology. The structural fields are enumerated explicitly:
    /// everything else is absorbed by per-frame position and volume updates
    /// and must never trigger a rebuild.
    pub fn is_structural_change(&self, previous: &ConfigSnapshot) -> bool {
        self.shape != previous.shape
            || self.source_type != previous.source_type
            || self.waveform != previous.waveform
            || self.base_frequency != previous.base_frequency
            || !same_sample(&self.sample, &previous.sample)
    }
}

/// Sample identity, not content: a newly decoded buffer is a new source even
/// if its payload happens to match.
fn same_sample(a: &Option<Arc<SampleBuffer>>, b: &Option<Arc<SampleBuffer>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

mod defaults {
    use super::{ShapeKind, SourceType, Waveform};

    pub fn shape() -> ShapeKind {
        ShapeKind::Triangle
    }
    pub fn radius() -> f32 {
        3.0
    }
    pub fn orbit_speed() -> f32 {
        0.3
    }
    pub fn auto_elevation() -> bool {
        true
    }
    pub fn elev_speed() -> f32 {
        0.4
    }
    pub fn elev_range() -> f32 {
        2.0
    }
    pub fn master_volume() -> f32 {
        0.5
    }
    pub fn source_type() -> SourceType {
        SourceType::Synth
    }
    pub fn waveform() -> Waveform {
        Waveform::Sine
    }
    pub fn base_frequency() -> f32 {
        220.0
    }
}
