use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub calibration: CalibrationConfig,
    pub input: InputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum allowed separation; distances at or below it are violations.
    #[serde(default = "default_safe_distance")]
    pub safe_distance_threshold: f64,

    /// Units the threshold is compared in.
    #[serde(default = "default_units")]
    pub units: DistanceUnits,

    /// Include warped-view parameters in frame results for the radar renderer.
    #[serde(default = "default_draw_warped")]
    pub draw_warped: bool,
}

fn default_safe_distance() -> f64 {
    2.0
}

fn default_units() -> DistanceUnits {
    DistanceUnits::Meters
}

fn default_draw_warped() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            safe_distance_threshold: default_safe_distance(),
            units: default_units(),
            draw_warped: default_draw_warped(),
        }
    }
}

/// Whether pairwise distances are compared in physical meters (scaled by the
/// calibration's per-axis meters-per-pixel) or in raw warped-plane pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnits {
    Meters,
    Pixels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Calibration file to load (see configs/ for the expected schema).
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub detections_dir: String,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Per-frame metadata handed to the analyzer. The pixel payload stays with
/// the video collaborator; the engine only needs dimensions for calibration
/// compatibility and the renderer hand-off.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
}

/// One raw detector output: an object class, a confidence, and a normalized
/// bounding box in [0,1]×[0,1] relative to the source frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub class: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: NormalizedBox,
}

/// Detector-side box encoding; both variants are normalized to the source
/// frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedBox {
    MinMax { min: [f64; 2], max: [f64; 2] },
    CenterSize { center: [f64; 2], size: [f64; 2] },
}

impl NormalizedBox {
    pub fn center(&self) -> [f64; 2] {
        match *self {
            Self::MinMax { min, max } => [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0],
            Self::CenterSize { center, .. } => center,
        }
    }

    /// Ground-contact point: bottom-center of the box.
    pub fn base(&self) -> [f64; 2] {
        match *self {
            Self::MinMax { min, max } => [(min[0] + max[0]) / 2.0, max[1]],
            Self::CenterSize { center, size } => [center[0], center[1] + size[1] / 2.0],
        }
    }

    /// A box is usable when every coordinate is finite, the extent stays
    /// inside [0,1], and min/max corners are ordered.
    pub fn is_valid(&self) -> bool {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        match *self {
            Self::MinMax { min, max } => {
                min.iter().chain(max.iter()).all(|&v| in_unit(v))
                    && min[0] <= max[0]
                    && min[1] <= max[1]
            }
            Self::CenterSize { center, size } => {
                center.iter().chain(size.iter()).all(|&v| v.is_finite())
                    && size[0] >= 0.0
                    && size[1] >= 0.0
                    && in_unit(center[0] - size[0] / 2.0)
                    && in_unit(center[0] + size[0] / 2.0)
                    && in_unit(center[1] - size[1] / 2.0)
                    && in_unit(center[1] + size[1] / 2.0)
            }
        }
    }
}

/// A detection enriched with calibrated ground-plane coordinates. Built
/// fresh each frame; `id` is only unique within its frame.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub id: usize,
    pub class: String,
    pub confidence: f32,
    /// Box center, normalized to the source frame.
    pub box_center_norm: [f64; 2],
    /// Ground-contact point, normalized to the source frame.
    pub box_base_norm: [f64; 2],
    /// Ground-contact point in source pixels (truncated).
    pub box_base_src: [u32; 2],
    /// Ground-contact point projected into the warped plane.
    pub box_base_warped: [f64; 2],
    /// Warped point normalized to the warped canvas, for resolution-independent rendering.
    pub box_base_warped_norm: [f64; 2],
    pub is_safe: bool,
    pub violating_neighbors: BTreeSet<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f64; 2], b: [f64; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-12 && (a[1] - b[1]).abs() < 1e-12
    }

    #[test]
    fn test_minmax_center_and_base() {
        let b = NormalizedBox::MinMax {
            min: [0.2, 0.1],
            max: [0.4, 0.5],
        };
        assert!(close(b.center(), [0.3, 0.3]));
        assert!(close(b.base(), [0.3, 0.5]));
        assert!(b.is_valid());
    }

    #[test]
    fn test_center_size_base_is_bottom_center() {
        let b = NormalizedBox::CenterSize {
            center: [0.5, 0.4],
            size: [0.2, 0.4],
        };
        assert!(close(b.base(), [0.5, 0.6]));
        assert!(b.is_valid());
    }

    #[test]
    fn test_out_of_range_box_is_invalid() {
        let b = NormalizedBox::MinMax {
            min: [-0.1, 0.0],
            max: [0.5, 0.5],
        };
        assert!(!b.is_valid());

        let b = NormalizedBox::CenterSize {
            center: [0.95, 0.5],
            size: [0.2, 0.2],
        };
        assert!(!b.is_valid());
    }

    #[test]
    fn test_inverted_corners_are_invalid() {
        let b = NormalizedBox::MinMax {
            min: [0.6, 0.6],
            max: [0.4, 0.8],
        };
        assert!(!b.is_valid());
    }

    #[test]
    fn test_non_finite_box_is_invalid() {
        let b = NormalizedBox::CenterSize {
            center: [f64::NAN, 0.5],
            size: [0.1, 0.1],
        };
        assert!(!b.is_valid());
    }

    #[test]
    fn test_box_deserializes_both_encodings() {
        let raw: RawDetection = serde_json::from_str(
            r#"{"class":"person","confidence":0.9,"box":{"min":[0.1,0.2],"max":[0.3,0.6]}}"#,
        )
        .unwrap();
        assert!(matches!(raw.bbox, NormalizedBox::MinMax { .. }));

        let raw: RawDetection = serde_json::from_str(
            r#"{"class":"person","confidence":0.9,"box":{"center":[0.2,0.4],"size":[0.2,0.4]}}"#,
        )
        .unwrap();
        assert!(matches!(raw.bbox, NormalizedBox::CenterSize { .. }));
    }
}
