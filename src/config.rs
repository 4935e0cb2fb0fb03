use crate::types::Config;
use anyhow::Result;
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistanceUnits;
    use std::io::Write;

    const MINIMAL: &str = r#"
analysis: {}
calibration:
  file: configs/street_cam.yaml
input:
  detections_dir: ./detections
  output_dir: ./output
logging: {}
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.analysis.safe_distance_threshold, 2.0);
        assert_eq!(config.analysis.units, DistanceUnits::Meters);
        assert!(config.analysis.draw_warped);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let yaml = r#"
analysis:
  safe_distance_threshold: 1.5
  units: pixels
  draw_warped: false
calibration:
  file: configs/other.yaml
input:
  detections_dir: ./in
  output_dir: ./out
logging:
  level: debug
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.analysis.safe_distance_threshold, 1.5);
        assert_eq!(config.analysis.units, DistanceUnits::Pixels);
        assert!(!config.analysis.draw_warped);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.calibration.file, "configs/street_cam.yaml");
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(Config::load("does/not/exist.yaml").is_err());
    }
}
