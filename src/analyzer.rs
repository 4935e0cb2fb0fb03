// src/analyzer.rs

use crate::calibration::CalibrationModel;
use crate::projector::project_detection;
use crate::proximity::mark_violations;
use crate::types::{AnalysisConfig, Detection, Frame, RawDetection};
use serde::Serialize;
use tracing::debug;

/// Per-frame spatial risk analysis: projects every raw detection into the
/// calibrated ground plane, then classifies pairwise safety.
///
/// Stateless across frames; each `analyze` call returns a fresh result and
/// leaves nothing behind.
pub struct DistanceAnalyzer {
    config: AnalysisConfig,
    calibration: Option<CalibrationModel>,
}

/// Warped-plane canvas parameters the radar renderer draws against.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WarpedView {
    pub width: u32,
    pub height: u32,
}

/// Everything one frame's analysis produced. The violation adjacency lives
/// on the detections themselves; `violation_edges` materializes it for
/// reporting.
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    pub detections: Vec<Detection>,
    pub warped_view: Option<WarpedView>,
}

impl FrameResult {
    pub fn empty() -> Self {
        Self {
            detections: Vec::new(),
            warped_view: None,
        }
    }

    /// Detections currently below the safe distance to someone.
    pub fn violation_count(&self) -> usize {
        self.detections.iter().filter(|d| !d.is_safe).count()
    }

    /// Each violating unordered pair exactly once, as (lower id, higher id).
    pub fn violation_edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for det in &self.detections {
            for &other in det.violating_neighbors.range(det.id + 1..) {
                edges.push((det.id, other));
            }
        }
        edges
    }
}

impl DistanceAnalyzer {
    pub fn new(config: AnalysisConfig, calibration: Option<CalibrationModel>) -> Self {
        Self {
            config,
            calibration,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn calibration(&self) -> Option<&CalibrationModel> {
        self.calibration.as_ref()
    }

    /// Analyze one frame's detections.
    ///
    /// Without a calibration or a frame there is nothing to measure against
    /// and the result is empty; that is a valid state, not an error.
    pub fn analyze(&self, frame: Option<&Frame>, raw: &[RawDetection]) -> FrameResult {
        let calibration = match (&self.calibration, frame) {
            (Some(calibration), Some(_)) => calibration,
            _ => {
                debug!("Analysis skipped: calibration or frame not available");
                return FrameResult::empty();
            }
        };

        let mut detections: Vec<Detection> = raw
            .iter()
            .enumerate()
            .filter_map(|(id, r)| project_detection(id, r, calibration))
            .collect();

        mark_violations(
            &mut detections,
            calibration,
            self.config.safe_distance_threshold,
            self.config.units,
        );

        let warped_view = self.config.draw_warped.then(|| WarpedView {
            width: calibration.warped_size.0,
            height: calibration.warped_size.1,
        });

        FrameResult {
            detections,
            warped_view,
        }
    }
}
