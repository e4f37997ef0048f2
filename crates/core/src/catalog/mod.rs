use serde::{Deserialize, Serialize};

use crate::{Result, ShapeAudioError};

/// The fixed set of shapes the engine knows how to voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Circle,
    Triangle,
    Square,
    Pyramid,
}

impl ShapeKind {
    /// Every shape in catalog order.
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Circle,
        ShapeKind::Triangle,
        ShapeKind::Square,
        ShapeKind::Pyramid,
    ];

    /// Looks up a shape by its string key, as received from presets or the
    /// command line. Fails with [`ShapeAudioError::UnknownShapeKind`] for
    /// keys outside the catalog.
    pub fn from_key(key: &str) -> Result<Self> {
        match key {
            "circle" => Ok(Self::Circle),
            "triangle" => Ok(Self::Triangle),
            "square" => Ok(Self::Square),
            "pyramid" => Ok(Self::Pyramid),
            other => Err(ShapeAudioError::UnknownShapeKind(other.to_string())),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Triangle => "triangle",
            Self::Square => "square",
            Self::Pyramid => "pyramid",
        }
    }

    /// Returns the immutable definition for this shape.
    pub fn definition(&self) -> &'static ShapeDefinition {
        match self {
            Self::Circle => &CIRCLE,
            Self::Triangle => &TRIANGLE,
            Self::Square => &SQUARE,
            Self::Pyramid => &PYRAMID,
        }
    }
}

/// How a shape's vertices are laid out and wired together. Each variant
/// carries its own topology-generation strategy, so adding a shape means
/// adding a variant rather than scattering conditionals through geometry
/// and audio code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// A planar ring of `sides` vertices connected cyclically.
    Ring { sides: usize },
    /// A ring of `base_sides` vertices plus one apex above the centre,
    /// connected as base ring edges plus one edge per base vertex to the apex.
    Pyramid { base_sides: usize },
}

impl Topology {
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Ring { sides } => *sides,
            Self::Pyramid { base_sides } => base_sides + 1,
        }
    }
}

/// Immutable definition of one shape: its topology and the frequency ratio
/// assigned to each vertex. Ratios are just intervals, so the voices of a
/// shape sound as a chord over the configured base frequency.
#[derive(Debug, Clone, Copy)]
pub struct ShapeDefinition {
    pub kind: ShapeKind,
    pub topology: Topology,
    pub intervals: &'static [f32],
}

impl ShapeDefinition {
    pub fn vertex_count(&self) -> usize {
        self.topology.vertex_count()
    }

    /// The frequency (or playback rate) ratio bound to vertex `index`.
    pub fn interval(&self, index: usize) -> f32 {
        self.intervals[index]
    }
}

/// Major scale over one octave.
static CIRCLE: ShapeDefinition = ShapeDefinition {
    kind: ShapeKind::Circle,
    topology: Topology::Ring { sides: 8 },
    intervals: &[
        1.0,
        9.0 / 8.0,
        5.0 / 4.0,
        4.0 / 3.0,
        3.0 / 2.0,
        5.0 / 3.0,
        15.0 / 8.0,
        2.0,
    ],
};

/// Major triad.
static TRIANGLE: ShapeDefinition = ShapeDefinition {
    kind: ShapeKind::Triangle,
    topology: Topology::Ring { sides: 3 },
    intervals: &[1.0, 5.0 / 4.0, 3.0 / 2.0],
};

/// Major seventh chord.
static SQUARE: ShapeDefinition = ShapeDefinition {
    kind: ShapeKind::Square,
    topology: Topology::Ring { sides: 4 },
    intervals: &[1.0, 5.0 / 4.0, 3.0 / 2.0, 15.0 / 8.0],
};

/// Pentad: four base voices plus the apex a major sixth up.
static PYRAMID: ShapeDefinition = ShapeDefinition {
    kind: ShapeKind::Pyramid,
    topology: Topology::Pyramid { base_sides: 4 },
    intervals: &[1.0, 9.0 / 8.0, 5.0 / 4.0, 3.0 / 2.0, 5.0 / 3.0],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_count_matches_vertex_count() {
        for kind in ShapeKind::ALL {
            let def = kind.definition();
            assert_eq!(def.intervals.len(), def.vertex_count(), "{:?}", kind);
        }
    }

    #[test]
    fn keys_round_trip() {
        for kind in ShapeKind::ALL {
            assert_eq!(ShapeKind::from_key(kind.key()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ShapeKind::from_key("dodecahedron").unwrap_err();
        assert!(format!("{err}").contains("dodecahedron"));
    }

    #[test]
    fn pyramid_has_fixed_base_plus_apex() {
        let def = ShapeKind::Pyramid.definition();
        assert_eq!(def.topology, Topology::Pyramid { base_sides: 4 });
        assert_eq!(def.vertex_count(), 5);
    }

    #[test]
    fn intervals_are_positive_and_ascending_from_unison() {
        for kind in ShapeKind::ALL {
            let def = kind.definition();
            assert_eq!(def.interval(0), 1.0);
            for ratio in def.intervals {
                assert!(*ratio > 0.0);
            }
        }
    }
}
