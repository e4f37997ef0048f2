use glam::Vec3;

/// Renderer seam. The engine publishes the per-frame vertex set once; mesh
/// placement, scaling and camera projection are the consumer's concern.
pub trait FrameSink {
    /// Receives the ordered vertex positions, the edge-index list and the
    /// current elevation for one frame. The vertex list is the same one the
    /// audio panners were positioned from.
    fn publish(&mut self, vertices: &[Vec3], edges: &[(usize, usize)], elevation: f32);
}

/// Sink that discards every frame. Useful for headless runs and tests that
/// only care about the audio side.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn publish(&mut self, _vertices: &[Vec3], _edges: &[(usize, usize)], _elevation: f32) {}
}

/// Sink that retains the most recent frame, letting tests assert that the
/// published geometry matches what the voices were positioned from.
#[derive(Debug, Default)]
pub struct CapturingSink {
    pub vertices: Vec<Vec3>,
    pub edges: Vec<(usize, usize)>,
    pub elevation: f32,
    pub frames: usize,
}

impl FrameSink for CapturingSink {
    fn publish(&mut self, vertices: &[Vec3], edges: &[(usize, usize)], elevation: f32) {
        self.vertices = vertices.to_vec();
        self.edges = edges.to_vec();
        self.elevation = elevation;
        self.frames += 1;
    }
}
