use std::f32::consts::TAU;

/// Largest delta-time, in seconds, a single tick may advance the animation.
/// Absorbs frame hitches such as a suspended window regaining focus.
const MAX_FRAME_DT: f32 = 0.1;

/// Advances the rotation angle and the elevation-oscillation phase once per
/// frame. Camera interaction never touches this state; only
/// [`AnimationClock::reset`] returns the motion to its origin.
#[derive(Debug, Default, Clone)]
pub struct AnimationClock {
    rotation: f32,
    elevation_phase: f32,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances both phases by `dt` seconds at the given orbit rate
    /// (radians per second). `dt` is clamped to [`MAX_FRAME_DT`].
    pub fn advance(&mut self, dt: f32, orbit_speed: f32) {
        let dt = dt.clamp(0.0, MAX_FRAME_DT);
        self.rotation = (self.rotation + orbit_speed * dt).rem_euclid(TAU);
        self.elevation_phase += dt;
    }

    /// Current rotation angle in radians, in `[0, 2π)`.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Seconds of elevation phase accumulated since the last reset.
    pub fn elevation_phase(&self) -> f32 {
        self.elevation_phase
    }

    /// The elevation for the current frame: a sine oscillation within
    /// `[-range, range]` when auto mode is on, otherwise zero.
    pub fn elevation(&self, auto: bool, speed: f32, range: f32) -> f32 {
        if auto {
            (self.elevation_phase * speed).sin() * range
        } else {
            0.0
        }
    }

    /// Zeroes both phases. Does not stop or restart audio.
    pub fn reset(&mut self) {
        self.rotation = 0.0;
        self.elevation_phase = 0.0;
    }
}
