use servo_track_common::angle::{ANGLE_MAX, ANGLE_MIN};
use servo_track_common::config::{AxisConfig, CurveShape};

/// Added to inputs of the logarithmic curve so [-90, 90] stays in ln's domain.
pub const LOG_SHIFT: f64 = 91.0;

const EPS: f64 = 1e-12;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CurveError {
    #[error("a curve needs at least two distinct reference inputs, got {0}")]
    TooFewInputs(usize),
    #[error("reference pair ({0}, {1}) is not finite")]
    NotFinite(f64, f64),
    #[error("exponential curve needs positive reference outputs, got {0}")]
    NonPositiveOutput(f64),
    #[error("logarithmic curve input {0} is at or below -91")]
    OutsideLogDomain(f64),
}

/// A two-parameter response curve fitted by least squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseCurve {
    shape: CurveShape,
    a: f64,
    b: f64,
}

impl ResponseCurve {
    /// Fit `shape` against `(input, output)` reference pairs.
    ///
    /// - linear: `y = a + b*x`
    /// - logarithmic: `y = a + b*ln(x + 91)`
    /// - exponential: `y = a*e^(b*x)`, fitted as a line through `ln y`
    pub fn fit(shape: CurveShape, pairs: &[(f64, f64)]) -> Result<Self, CurveError> {
        if let Some(&(x, y)) = pairs.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(CurveError::NotFinite(x, y));
        }
        let distinct = distinct_inputs(pairs);
        if distinct < 2 {
            return Err(CurveError::TooFewInputs(distinct));
        }

        let (a, b) = match shape {
            CurveShape::Linear => least_squares(pairs.iter().copied()),
            CurveShape::Logarithmic => {
                if let Some(&(x, _)) = pairs.iter().find(|(x, _)| x + LOG_SHIFT <= 0.0) {
                    return Err(CurveError::OutsideLogDomain(x));
                }
                least_squares(pairs.iter().map(|&(x, y)| ((x + LOG_SHIFT).ln(), y)))
            }
            CurveShape::Exponential => {
                if let Some(&(_, y)) = pairs.iter().find(|(_, y)| *y <= 0.0) {
                    return Err(CurveError::NonPositiveOutput(y));
                }
                let (ln_a, b) = least_squares(pairs.iter().map(|&(x, y)| (x, y.ln())));
                (ln_a.exp(), b)
            }
        };
        Ok(Self { shape, a, b })
    }

    pub fn eval(&self, x: f64) -> f64 {
        match self.shape {
            CurveShape::Linear => self.a + self.b * x,
            // Inputs at or below -91 pin to the curve's far end instead of NaN.
            CurveShape::Logarithmic => self.a + self.b * (x + LOG_SHIFT).max(EPS).ln(),
            CurveShape::Exponential => self.a * (self.b * x).exp(),
        }
    }
}

fn distinct_inputs(pairs: &[(f64, f64)]) -> usize {
    let mut xs: Vec<f64> = pairs.iter().map(|&(x, _)| x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    xs.len()
}

/// Ordinary least squares line `v = intercept + slope*u`.
fn least_squares(points: impl Iterator<Item = (f64, f64)> + Clone) -> (f64, f64) {
    let n = points.clone().count() as f64;
    let (sum_u, sum_v) = points
        .clone()
        .fold((0.0, 0.0), |(su, sv), (u, v)| (su + u, sv + v));
    let (mean_u, mean_v) = (sum_u / n, sum_v / n);
    let (sxx, sxy) = points.fold((0.0, 0.0), |(sxx, sxy), (u, v)| {
        let du = u - mean_u;
        (sxx + du * du, sxy + du * (v - mean_v))
    });
    let slope = if sxx.abs() < EPS { 0.0 } else { sxy / sxx };
    (mean_v - slope * mean_u, slope)
}

/// Maps recorded angles on one axis to actuator units.
#[derive(Debug, Clone, Copy)]
pub struct AxisMapper {
    curve: ResponseCurve,
    min: f64,
    max: f64,
}

impl AxisMapper {
    pub fn new(curve: ResponseCurve, range: [f64; 2]) -> Self {
        let [min, max] = range;
        Self { curve, min, max }
    }

    /// Fit the configured curve. Without reference pairs the range endpoints
    /// are placed at -90 and +90 degrees.
    pub fn from_config(axis: &AxisConfig) -> Result<Self, CurveError> {
        let [min, max] = axis.range;
        let pairs: Vec<(f64, f64)> = if axis.reference.is_empty() {
            vec![(ANGLE_MIN, min), (ANGLE_MAX, max)]
        } else {
            axis.reference.iter().map(|&[x, y]| (x, y)).collect()
        };
        Ok(Self::new(ResponseCurve::fit(axis.curve, &pairs)?, axis.range))
    }

    /// Curve output clamped into the configured range.
    pub fn map(&self, angle: f64) -> f64 {
        let value = self.curve.eval(angle);
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}
