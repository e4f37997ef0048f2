//! Procedural vertex and edge generation.
//!
//! Pure functions: the same shape, radius, rotation and elevation always
//! produce the same vertex set, so the renderer and the audio voices can be
//! fed from one computation per frame.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::catalog::{ShapeDefinition, Topology};

/// Height of the pyramid apex above the base ring, as a multiple of the
/// ring radius.
const APEX_HEIGHT_FACTOR: f32 = 1.2;

/// Computes the ordered vertex positions for one frame.
///
/// Ring vertices sit on a circle of `radius` in the x/z plane at the shared
/// `elevation`; vertex `i` is at angle `rotation + i·2π/n`. The pyramid apex
/// is offset from the ring elevation, so apex bobbing stays coupled to base
/// bobbing.
pub fn vertex_positions(
    def: &ShapeDefinition,
    radius: f32,
    rotation: f32,
    elevation: f32,
) -> Vec<Vec3> {
    match def.topology {
        Topology::Ring { sides } => ring_positions(sides, radius, rotation, elevation).collect(),
        Topology::Pyramid { base_sides } => {
            let mut verts: Vec<Vec3> =
                ring_positions(base_sides, radius, rotation, elevation).collect();
            verts.push(Vec3::new(0.0, elevation + radius * APEX_HEIGHT_FACTOR, 0.0));
            verts
        }
    }
}

fn ring_positions(
    sides: usize,
    radius: f32,
    rotation: f32,
    elevation: f32,
) -> impl Iterator<Item = Vec3> {
    (0..sides).map(move |i| {
        let angle = rotation + (i as f32) * TAU / (sides as f32);
        Vec3::new(radius * angle.sin(), elevation, -radius * angle.cos())
    })
}

/// Computes the ordered edge-index list for a shape. Constant for the
/// lifetime of a given shape: ring shapes connect consecutive vertices
/// cyclically, pyramids additionally connect each base vertex to the apex.
pub fn edge_list(def: &ShapeDefinition) -> Vec<(usize, usize)> {
    match def.topology {
        Topology::Ring { sides } => (0..sides).map(|i| (i, (i + 1) % sides)).collect(),
        Topology::Pyramid { base_sides } => {
            let apex = base_sides;
            let mut edges: Vec<(usize, usize)> =
                (0..base_sides).map(|i| (i, (i + 1) % base_sides)).collect();
            edges.extend((0..base_sides).map(|i| (i, apex)));
            edges
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ShapeKind;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn vertex_count_matches_definition_for_every_shape() {
        for kind in ShapeKind::ALL {
            let def = kind.definition();
            let verts = vertex_positions(def, 3.0, 0.7, 1.3);
            assert_eq!(verts.len(), def.vertex_count());
        }
    }

    #[test]
    fn edge_indices_stay_in_range_for_every_shape() {
        for kind in ShapeKind::ALL {
            let def = kind.definition();
            let n = def.vertex_count();
            for (a, b) in edge_list(def) {
                assert!(a < n && b < n, "{:?}: edge ({a}, {b})", kind);
            }
        }
    }

    #[test]
    fn pyramid_base_and_apex_reference_positions() {
        let def = ShapeKind::Pyramid.definition();
        let verts = vertex_positions(def, 3.0, 0.0, 0.0);
        let base0 = verts[0];
        assert!(close(base0.x, 0.0) && close(base0.y, 0.0) && close(base0.z, -3.0));
        let apex = verts[4];
        assert!(close(apex.x, 0.0) && close(apex.y, 3.6) && close(apex.z, 0.0));
    }

    #[test]
    fn apex_elevation_follows_ring_elevation() {
        let def = ShapeKind::Pyramid.definition();
        let low = vertex_positions(def, 2.0, 0.0, -1.0);
        let high = vertex_positions(def, 2.0, 0.0, 1.0);
        assert!(close(low[4].y, -1.0 + 2.4));
        assert!(close(high[4].y, 1.0 + 2.4));
    }

    #[test]
    fn circle_vertices_lie_on_the_ring_with_even_spacing() {
        let def = ShapeKind::Circle.definition();
        let radius = 4.0;
        let verts = vertex_positions(def, radius, 0.0, 0.0);
        for (i, v) in verts.iter().enumerate() {
            let planar = (v.x * v.x + v.z * v.z).sqrt();
            assert!(close(planar, radius), "vertex {i} off the ring");
            assert!(close(v.y, 0.0));
            let angle = (i as f32) * TAU / 8.0;
            assert!(close(v.x, radius * angle.sin()));
            assert!(close(v.z, -radius * angle.cos()));
        }
    }

    #[test]
    fn rotation_shifts_every_ring_vertex_by_the_same_angle() {
        let def = ShapeKind::Triangle.definition();
        let quarter = TAU / 4.0;
        let rotated = vertex_positions(def, 3.0, quarter, 0.0);
        let still = vertex_positions(def, 3.0, 0.0, 0.0);
        for (r, s) in rotated.iter().zip(&still) {
            // A quarter turn maps (x, z) to (-z, x) in this orientation.
            assert!(close(r.x, -s.z));
            assert!(close(r.z, s.x));
        }
    }

    #[test]
    fn pyramid_edges_are_base_ring_plus_apex_fan() {
        let def = ShapeKind::Pyramid.definition();
        let edges = edge_list(def);
        assert_eq!(edges.len(), 8);
        assert_eq!(&edges[..4], &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        assert_eq!(&edges[4..], &[(0, 4), (1, 4), (2, 4), (3, 4)]);
    }
}
