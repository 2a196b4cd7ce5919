/// Lower end of the nominal pan/tilt angle domain, in degrees.
pub const ANGLE_MIN: f64 = -90.0;
/// Upper end of the nominal pan/tilt angle domain, in degrees.
pub const ANGLE_MAX: f64 = 90.0;

/// Whether an angle is held inside [`ANGLE_MIN`, `ANGLE_MAX`].
///
/// Live capture leaves the tilt angle unclamped so a miscalibrated diameter
/// range stays visible in the recording; playback may clamp it instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClampPolicy {
    #[default]
    Unclamped,
    Clamped,
}

impl ClampPolicy {
    pub fn apply(self, angle: f64) -> f64 {
        match self {
            ClampPolicy::Unclamped => angle,
            ClampPolicy::Clamped => angle.clamp(ANGLE_MIN, ANGLE_MAX),
        }
    }
}
