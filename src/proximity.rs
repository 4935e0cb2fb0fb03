// src/proximity.rs

use crate::calibration::CalibrationModel;
use crate::types::{Detection, DistanceUnits};
use tracing::debug;

/// Scan all unordered pairs of the frame's detections and record
/// minimum-distance violations.
///
/// A pair violates when its warped-plane separation is at or below
/// `threshold` (inclusive boundary). Violations are symmetric: both
/// detections are marked unsafe and each records the other's id. Detections
/// compare by `id`, never by position, since two people can share a pixel.
pub fn mark_violations(
    detections: &mut [Detection],
    calibration: &CalibrationModel,
    threshold: f64,
    units: DistanceUnits,
) {
    let (scale_x, scale_y) = match units {
        DistanceUnits::Meters => (
            calibration.meters_per_pixel_x.unwrap_or(1.0),
            calibration.meters_per_pixel_y.unwrap_or(1.0),
        ),
        DistanceUnits::Pixels => (1.0, 1.0),
    };

    let mut violations = 0usize;
    for i in 0..detections.len() {
        for j in (i + 1)..detections.len() {
            if detections[i].id == detections[j].id {
                continue;
            }

            let d = separation(
                detections[i].box_base_warped,
                detections[j].box_base_warped,
                scale_x,
                scale_y,
            );
            if d <= threshold {
                let (a, b) = (detections[i].id, detections[j].id);
                detections[i].is_safe = false;
                detections[i].violating_neighbors.insert(b);
                detections[j].is_safe = false;
                detections[j].violating_neighbors.insert(a);
                violations += 1;
            }
        }
    }

    if violations > 0 {
        debug!(
            "{} violating pair(s) among {} detections",
            violations,
            detections.len()
        );
    }
}

/// Euclidean separation of two warped-plane points with per-axis scaling.
fn separation(a: [f64; 2], b: [f64; 2], scale_x: f64, scale_y: f64) -> f64 {
    let dx = (a[0] - b[0]).abs() * scale_x;
    let dy = (a[1] - b[1]).abs() * scale_y;
    (dx * dx + dy * dy).sqrt()
}
