// src/projector.rs

use crate::calibration::CalibrationModel;
use crate::types::{Detection, RawDetection};
use std::collections::BTreeSet;
use tracing::warn;

/// Enrich one raw detection with calibrated ground-plane coordinates.
///
/// Pure function of (raw detection, calibration): derives the normalized
/// center and ground-contact point, denormalizes the contact point to source
/// pixels (truncating, to match integer drawing downstream), projects it
/// into the warped plane and normalizes against the warped canvas.
///
/// Returns `None` for detections that cannot take part in the frame's
/// analysis: a malformed box, or a contact point that lands on the
/// transform's vanishing line. The rest of the frame is unaffected.
pub fn project_detection(
    id: usize,
    raw: &RawDetection,
    calibration: &CalibrationModel,
) -> Option<Detection> {
    if !raw.bbox.is_valid() {
        warn!(
            "Dropping malformed detection {} ({}): box out of range",
            id, raw.class
        );
        return None;
    }

    let box_center_norm = raw.bbox.center();
    let box_base_norm = raw.bbox.base();

    let (src_w, src_h) = calibration.source_size;
    let box_base_src = [
        (box_base_norm[0] * src_w as f64).floor() as u32,
        (box_base_norm[1] * src_h as f64).floor() as u32,
    ];

    let box_base_warped = calibration.project_to_warped(box_base_src);
    if !box_base_warped[0].is_finite() || !box_base_warped[1].is_finite() {
        warn!(
            "Dropping detection {} ({}): ground point has no warped image",
            id, raw.class
        );
        return None;
    }

    let box_base_warped_norm = calibration.warped_norm(box_base_warped);

    Some(Detection {
        id,
        class: raw.class.clone(),
        confidence: raw.confidence,
        box_center_norm,
        box_base_norm,
        box_base_src,
        box_base_warped,
        box_base_warped_norm,
        is_safe: true,
        violating_neighbors: BTreeSet::new(),
    })
}
