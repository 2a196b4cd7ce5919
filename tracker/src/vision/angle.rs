use servo_track_common::angle::{ClampPolicy, ANGLE_MAX, ANGLE_MIN};

use super::blob::TrackedBlob;

/// Maps a tracked blob to a (pan, tilt) pair in degrees.
///
/// Pan comes from the bearing of the blob centroid seen from the fixed point;
/// tilt from the blob diameter normalised against the configured bounds.
#[derive(Debug, Clone)]
pub struct AngleMapper {
    fixed_point: (i32, i32),
    diameter_bounds: (f64, f64),
    tilt_policy: ClampPolicy,
}

impl AngleMapper {
    pub fn new(fixed_point: (i32, i32), diameter_bounds: (f64, f64), tilt_policy: ClampPolicy) -> Self {
        Self {
            fixed_point,
            diameter_bounds,
            tilt_policy,
        }
    }

    pub fn fixed_point(&self) -> (i32, i32) {
        self.fixed_point
    }

    pub fn set_fixed_point(&mut self, point: (i32, i32)) {
        self.fixed_point = point;
    }

    pub fn map(&self, blob: &TrackedBlob) -> (f64, f64) {
        (
            pan_angle(self.fixed_point, blob.center),
            self.tilt_policy
                .apply(tilt_angle(blob.diameter, self.diameter_bounds)),
        )
    }
}

/// Bearing from `origin` to `target` in image coordinates (y grows downward),
/// folded onto the actuator's pan range.
///
/// The raw bearing `a` is measured counter-clockwise from +x. Then:
/// `a < -90` gives -90, `-90 <= a < 0` gives +90, otherwise `90 - a`.
/// Straight up is 0, right is +90, left is -90 and straight down is +90.
pub fn pan_angle(origin: (i32, i32), target: (i32, i32)) -> f64 {
    let dx = f64::from(target.0 - origin.0);
    let dy = f64::from(target.1 - origin.1);
    let bearing = (-dy).atan2(dx).to_degrees();

    if bearing < ANGLE_MIN {
        ANGLE_MIN
    } else if bearing < 0.0 {
        ANGLE_MAX
    } else {
        ANGLE_MAX - bearing
    }
}

/// Linear map of `diameter` from `bounds` onto [-90, 90]. Not clamped.
pub fn tilt_angle(diameter: f64, bounds: (f64, f64)) -> f64 {
    let (min, max) = bounds;
    (diameter - min) / (max - min) * (ANGLE_MAX - ANGLE_MIN) + ANGLE_MIN
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: (i32, i32) = (320, 400);

    #[test]
    fn straight_up_is_zero() {
        assert_eq!(pan_angle(ORIGIN, (320, 350)), 0.0);
        assert!(pan_angle(ORIGIN, (320, 350)).is_sign_positive());
    }

    #[test]
    fn straight_down_wraps_to_plus_ninety() {
        assert_eq!(pan_angle(ORIGIN, (320, 450)), 90.0);
    }

    #[test]
    fn right_and_left() {
        assert_eq!(pan_angle(ORIGIN, (420, 400)), 90.0);
        assert_eq!(pan_angle(ORIGIN, (220, 400)), -90.0);
    }

    #[test]
    fn upper_diagonals() {
        assert!((pan_angle(ORIGIN, (370, 350)) - 45.0).abs() < 1e-9);
        assert!((pan_angle(ORIGIN, (270, 350)) + 45.0).abs() < 1e-9);
    }

    #[test]
    fn lower_quadrants() {
        // Below-left falls under -90 and clamps; below-right lands in the wrap branch.
        assert_eq!(pan_angle(ORIGIN, (270, 450)), -90.0);
        assert_eq!(pan_angle(ORIGIN, (370, 450)), 90.0);
    }

    #[test]
    fn tilt_endpoints_and_monotonic() {
        let bounds = (20.0, 200.0);
        assert_eq!(tilt_angle(20.0, bounds), -90.0);
        assert_eq!(tilt_angle(200.0, bounds), 90.0);
        assert_eq!(tilt_angle(110.0, bounds), 0.0);

        let mut previous = f64::NEG_INFINITY;
        for d in 20..=200 {
            let angle = tilt_angle(f64::from(d), bounds);
            assert!(angle > previous);
            previous = angle;
        }
    }

    #[test]
    fn tilt_unclamped_outside_bounds() {
        let mapper = AngleMapper::new(ORIGIN, (20.0, 200.0), ClampPolicy::Unclamped);
        let blob = TrackedBlob {
            center: (320, 350),
            diameter: 290.0,
            area: 1,
        };
        assert_eq!(mapper.map(&blob).1, 180.0);

        let clamped = AngleMapper::new(ORIGIN, (20.0, 200.0), ClampPolicy::Clamped);
        assert_eq!(clamped.map(&blob).1, 90.0);
    }

    #[test]
    fn blob_above_at_min_diameter() {
        let mapper = AngleMapper::new(ORIGIN, (20.0, 200.0), ClampPolicy::Unclamped);
        let blob = TrackedBlob {
            center: (ORIGIN.0, ORIGIN.1 - 50),
            diameter: 20.0,
            area: 1,
        };
        assert_eq!(mapper.map(&blob), (0.0, -90.0));
    }
}
