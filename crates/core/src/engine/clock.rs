/// Accumulated simulation time.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameClock {
    pub time_seconds: f64,
    pub frame: u64,
}

impl FrameClock {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advances by `delta` clamped to `[0, max_delta]`; non-finite deltas
    /// count as zero. Returns the delta actually applied.
    pub fn advance(&mut self, delta: f32, max_delta: f32) -> f32 {
        let delta = if delta.is_finite() {
            delta.clamp(0.0, max_delta)
        } else {
            0.0
        };
        self.time_seconds += f64::from(delta);
        self.frame += 1;
        delta
    }
}
