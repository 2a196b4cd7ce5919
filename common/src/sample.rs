/// Header row written at the top of every recording file.
pub const HEADER: &str = "Time,Pos X,Pos Y,Diameter,Angle_X,Angle_Y";

const FIELD_COUNT: usize = 6;
const COLUMNS: [&str; FIELD_COUNT] = ["Time", "Pos X", "Pos Y", "Diameter", "Angle_X", "Angle_Y"];

/// One row of a recording.
///
/// Row format (comma separated, no quoting):
///
///   Time      seconds since the recording started
///   Pos X     blob centroid x in pixels
///   Pos Y     blob centroid y in pixels
///   Diameter  enclosing-circle diameter in pixels
///   Angle_X   pan angle in degrees
///   Angle_Y   tilt angle in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSample {
    pub time: f64,
    pub pos_x: f64,
    pub pos_y: f64,
    pub diameter: f64,
    pub angle_x: f64,
    pub angle_y: f64,
}

impl AngleSample {
    /// Format as a recording row, without the trailing newline.
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.time, self.pos_x, self.pos_y, self.diameter, self.angle_x, self.angle_y
        )
    }

    /// Parse a recording row. Surrounding whitespace (including `\r`) is ignored.
    pub fn parse_row(line: &str) -> Result<Self, SampleError> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() < FIELD_COUNT {
            return Err(SampleError::TooShort {
                got: fields.len(),
                expected: FIELD_COUNT,
            });
        }

        let mut values = [0.0f64; FIELD_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            let raw = fields[i].trim();
            *value = raw.parse().map_err(|_| SampleError::BadNumber {
                column: COLUMNS[i],
                value: raw.to_string(),
            })?;
            if !value.is_finite() {
                return Err(SampleError::NotFinite {
                    column: COLUMNS[i],
                    value: raw.to_string(),
                });
            }
        }

        Ok(Self {
            time: values[0],
            pos_x: values[1],
            pos_y: values[2],
            diameter: values[3],
            angle_x: values[4],
            angle_y: values[5],
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("row too short: got {got} fields, expected at least {expected}")]
    TooShort { got: usize, expected: usize },
    #[error("column {column}: {value:?} is not a number")]
    BadNumber { column: &'static str, value: String },
    #[error("column {column}: {value:?} is not finite")]
    NotFinite { column: &'static str, value: String },
}
