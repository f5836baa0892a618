use brigade_common::LatLng;

/// Number of frames a marker takes to glide to a new position.
pub const DEFAULT_STEPS: u32 = 15;

/// Linear interpolation between two positions, latitude and longitude
/// independently. `t` is clamped to `[0, 1]`.
pub fn lerp(from: LatLng, to: LatLng, t: f64) -> LatLng {
    let t = t.clamp(0.0, 1.0);
    LatLng::new(
        from.lat + (to.lat - from.lat) * t,
        from.lng + (to.lng - from.lng) * t,
    )
}

/// Fixed-step glide from one position to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animation {
    from: LatLng,
    to: LatLng,
    step: u32,
    steps: u32,
}

impl Animation {
    pub fn new(from: LatLng, to: LatLng, steps: u32) -> Self {
        Self {
            from,
            to,
            step: 0,
            steps: steps.max(1),
        }
    }

    /// Advance one frame and return the position to render.
    ///
    /// The last step lands exactly on the destination.
    pub fn advance(&mut self) -> LatLng {
        if self.step < self.steps {
            self.step += 1;
        }
        self.position()
    }

    pub fn position(&self) -> LatLng {
        if self.step >= self.steps {
            return self.to;
        }
        lerp(self.from, self.to, f64::from(self.step) / f64::from(self.steps))
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }
}
