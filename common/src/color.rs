use std::path::Path;

use crate::config::ConfigError;

/// Inclusive HSV bounds in OpenCV's 8-bit scale (H 0..=179, S and V 0..=255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// True when every channel of `hsv` lies within its bounds.
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }

    /// Parse the two-line `h,s,v` format (lower bound first).
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let lower = lines
            .next()
            .ok_or_else(|| ConfigError::Invalid("color range is missing the lower bound".into()))
            .and_then(parse_triple)?;
        let upper = lines
            .next()
            .ok_or_else(|| ConfigError::Invalid("color range is missing the upper bound".into()))
            .and_then(parse_triple)?;
        Ok(Self { lower, upper })
    }

    pub fn to_text(&self) -> String {
        let fmt = |t: [u8; 3]| format!("{},{},{}", t[0], t[1], t[2]);
        format!("{}\n{}\n", fmt(self.lower), fmt(self.upper))
    }

    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }
}

fn parse_triple(line: &str) -> Result<[u8; 3], ConfigError> {
    let values: Vec<&str> = line.split(',').map(str::trim).collect();
    if values.len() != 3 {
        return Err(ConfigError::Invalid(format!(
            "expected three comma-separated values, got {line:?}"
        )));
    }
    let mut out = [0u8; 3];
    for (slot, raw) in out.iter_mut().zip(values) {
        *slot = raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{raw:?} is not a value in 0..=255")))?;
    }
    Ok(out)
}
