use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::config::ConfigError;

/// Operator-edited state persisted between sessions: the angle origin and the
/// exclusion polygon. The file is always rewritten in full.
///
/// ```toml
/// fixed_point = [320, 400]
/// exclusion_zone = [10, 10, 120, 10, 120, 80]   # x0, y0, x1, y1, ...
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalConfig {
    #[serde(default)]
    pub fixed_point: [i32; 2],
    #[serde(default)]
    pub exclusion_zone: Vec<i32>,
}

impl InternalConfig {
    /// Load from `path`. A missing file yields the defaults so a fresh install
    /// can start without one.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "internal config not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::ReadFile(path.display().to_string(), e)),
        };
        let config: InternalConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.exclusion_zone.len() % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "exclusion_zone must hold x/y pairs, got {} values",
                config.exclusion_zone.len()
            )));
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| ConfigError::WriteFile(path.display().to_string(), e))?;
        info!(
            path = %path.display(),
            fixed_point = ?self.fixed_point,
            exclusion_points = self.exclusion_zone.len() / 2,
            "internal config saved"
        );
        Ok(())
    }

    pub fn fixed_point(&self) -> (i32, i32) {
        (self.fixed_point[0], self.fixed_point[1])
    }

    pub fn set_fixed_point(&mut self, point: (i32, i32)) {
        self.fixed_point = [point.0, point.1];
    }

    /// The exclusion polygon in insertion order. A trailing unpaired value is ignored.
    pub fn exclusion_points(&self) -> Vec<(i32, i32)> {
        self.exclusion_zone
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }

    pub fn set_exclusion_points(&mut self, points: &[(i32, i32)]) {
        self.exclusion_zone = points.iter().flat_map(|&(x, y)| [x, y]).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("internal-{}.toml", uuid::Uuid::new_v4()))
    }

    #[test]
    fn exclusion_polygon_roundtrips_in_order() {
        let path = temp_path();
        let points = vec![(120, 40), (10, 10), (300, 5), (250, 90)];

        let mut config = InternalConfig::default();
        config.set_fixed_point((320, 400));
        config.set_exclusion_points(&points);
        config.save(&path).unwrap();

        let loaded = InternalConfig::load(&path).unwrap();
        assert_eq!(loaded.exclusion_points(), points);
        assert_eq!(loaded.fixed_point(), (320, 400));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let loaded = InternalConfig::load(&temp_path()).unwrap();
        assert_eq!(loaded, InternalConfig::default());
        assert!(loaded.exclusion_points().is_empty());
    }

    #[test]
    fn odd_coordinate_count_rejected() {
        let path = temp_path();
        std::fs::write(&path, "fixed_point = [1, 2]\nexclusion_zone = [1, 2, 3]\n").unwrap();
        assert!(matches!(
            InternalConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn flat_list_layout() {
        let mut config = InternalConfig::default();
        config.set_exclusion_points(&[(1, 2), (3, 4)]);
        assert_eq!(config.exclusion_zone, vec![1, 2, 3, 4]);
    }
}
