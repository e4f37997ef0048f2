//! Renderer stand-in for headless runs.

use glam::Vec3;
use tracing::debug;

use audio_shapes_core::FrameSink;

/// Logs the published geometry at a low rate instead of drawing it. A real
/// renderer would place meshes at these positions; the engine does not care
/// which consumer is attached.
#[derive(Debug)]
pub struct TraceSink {
    every: usize,
    frame: usize,
}

impl TraceSink {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            frame: 0,
        }
    }
}

impl FrameSink for TraceSink {
    fn publish(&mut self, vertices: &[Vec3], edges: &[(usize, usize)], elevation: f32) {
        if self.frame % self.every == 0 {
            debug!(
                frame = self.frame,
                vertices = vertices.len(),
                edges = edges.len(),
                elevation,
                first = ?vertices.first().map(|v| (v.x, v.y, v.z)),
                "frame published"
            );
        }
        self.frame += 1;
    }
}
