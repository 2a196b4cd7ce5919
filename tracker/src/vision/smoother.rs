/// One per-frame measurement of the tracked object.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    pub pos_x: f64,
    pub pos_y: f64,
    pub diameter: f64,
    pub angle_x: f64,
    pub angle_y: f64,
}

/// Exponential moving average over every [`Observation`] channel.
///
/// `avg = avg * (N - 1) / N + sample / N`, starting from zero. With `N = 1`
/// the latest sample replaces the average outright.
pub struct TemporalSmoother {
    strength: f64,
    state: Observation,
}

impl TemporalSmoother {
    /// `strength` below 1 is treated as 1.
    pub fn new(strength: u32) -> Self {
        Self {
            strength: f64::from(strength.max(1)),
            state: Observation::default(),
        }
    }

    pub fn update(&mut self, sample: &Observation) -> Observation {
        let n = self.strength;
        let blend = |avg: f64, new: f64| avg * (n - 1.0) / n + new / n;
        self.state = Observation {
            pos_x: blend(self.state.pos_x, sample.pos_x),
            pos_y: blend(self.state.pos_y, sample.pos_y),
            diameter: blend(self.state.diameter, sample.diameter),
            angle_x: blend(self.state.angle_x, sample.angle_x),
            angle_y: blend(self.state.angle_y, sample.angle_y),
        };
        self.state
    }

    /// Latest average; unchanged by frames without an observation.
    pub fn current(&self) -> Observation {
        self.state
    }
}
