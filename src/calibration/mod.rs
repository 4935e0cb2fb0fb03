//! Ground-plane calibration: the image→warped-plane homography, canvas
//! sizes, and optional metric scale, loaded from a named YAML file.
//!
//! A `CalibrationModel` only exists once a load has succeeded; callers hold
//! `Option<CalibrationModel>` and treat `None` as "analysis disabled".

pub mod homography;

use homography::HomographyError;
use nalgebra::Matrix3;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::types::DistanceUnits;

#[derive(Debug)]
pub enum CalibrationLoadError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    /// Neither a direct homography nor correspondences were given, or both were.
    MissingTransform,
    /// A direct homography was given but not as 9 row-major values.
    MalformedHomography(usize),
    ZeroWarpedSize,
    Fit(HomographyError),
    NonFinite,
    /// Configured for metric distances but the file carries no meters-per-pixel.
    MissingScale,
}

impl std::fmt::Display for CalibrationLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read calibration file: {}", e),
            Self::Parse(e) => write!(f, "malformed calibration file: {}", e),
            Self::MissingTransform => write!(
                f,
                "calibration must carry exactly one of `homography` or `correspondences`"
            ),
            Self::MalformedHomography(n) => {
                write!(f, "homography must be 9 row-major values, got {}", n)
            }
            Self::ZeroWarpedSize => write!(f, "warped canvas has a zero dimension"),
            Self::Fit(e) => write!(f, "homography fit failed: {}", e),
            Self::NonFinite => write!(f, "homography has non-finite entries"),
            Self::MissingScale => write!(
                f,
                "distance units are meters but the calibration has no meters_per_pixel"
            ),
        }
    }
}

impl std::error::Error for CalibrationLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Fit(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CalibrationLoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for CalibrationLoadError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<HomographyError> for CalibrationLoadError {
    fn from(e: HomographyError) -> Self {
        Self::Fit(e)
    }
}

/// On-disk calibration schema.
#[derive(Debug, Deserialize)]
struct CalibrationFile {
    source_size: [u32; 2],
    warped_size: [u32; 2],
    /// Row-major 3×3, mutually exclusive with `correspondences`.
    homography: Option<Vec<f64>>,
    correspondences: Option<Vec<Correspondence>>,
    meters_per_pixel: Option<MetersPerPixel>,
}

#[derive(Debug, Deserialize)]
struct Correspondence {
    src: [f64; 2],
    dst: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct MetersPerPixel {
    x: f64,
    y: f64,
}

/// Image→ground-plane calibration. Read-only during analysis; replaced as a
/// whole when a different calibration is selected.
#[derive(Debug, Clone)]
pub struct CalibrationModel {
    homography: Matrix3<f64>,
    pub source_size: (u32, u32),
    pub warped_size: (u32, u32),
    pub meters_per_pixel_x: Option<f64>,
    pub meters_per_pixel_y: Option<f64>,
}

impl CalibrationModel {
    /// Load a calibration from YAML, deriving the homography from point
    /// correspondences when no direct matrix is given.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationLoadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let file: CalibrationFile = serde_yaml::from_str(&contents)?;

        let homography = match (&file.homography, &file.correspondences) {
            (Some(values), None) => {
                if values.len() != 9 {
                    return Err(CalibrationLoadError::MalformedHomography(values.len()));
                }
                Matrix3::from_fn(|r, c| values[3 * r + c])
            }
            (None, Some(pairs)) => {
                let src: Vec<[f64; 2]> = pairs.iter().map(|p| p.src).collect();
                let dst: Vec<[f64; 2]> = pairs.iter().map(|p| p.dst).collect();
                homography::fit_homography(&src, &dst)?
            }
            _ => return Err(CalibrationLoadError::MissingTransform),
        };

        let model = Self::from_parts(
            homography,
            (file.source_size[0], file.source_size[1]),
            (file.warped_size[0], file.warped_size[1]),
            file.meters_per_pixel.as_ref().map(|m| m.x),
            file.meters_per_pixel.as_ref().map(|m| m.y),
        )?;

        info!(
            "Calibration loaded from {}: source {}x{}, warped {}x{}, scale {}",
            path.display(),
            model.source_size.0,
            model.source_size.1,
            model.warped_size.0,
            model.warped_size.1,
            match (model.meters_per_pixel_x, model.meters_per_pixel_y) {
                (Some(x), Some(y)) => format!("{:.4}/{:.4} m/px", x, y),
                _ => "none (pixel units)".to_string(),
            }
        );
        Ok(model)
    }

    /// Assemble a model from already-derived pieces, enforcing the load-time
    /// invariants (finite transform, nonzero warped canvas).
    pub fn from_parts(
        homography: Matrix3<f64>,
        source_size: (u32, u32),
        warped_size: (u32, u32),
        meters_per_pixel_x: Option<f64>,
        meters_per_pixel_y: Option<f64>,
    ) -> Result<Self, CalibrationLoadError> {
        if homography.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationLoadError::NonFinite);
        }
        if warped_size.0 == 0 || warped_size.1 == 0 {
            return Err(CalibrationLoadError::ZeroWarpedSize);
        }
        Ok(Self {
            homography,
            source_size,
            warped_size,
            meters_per_pixel_x,
            meters_per_pixel_y,
        })
    }

    /// Verify the model can serve distances in the configured units.
    pub fn check_units(&self, units: DistanceUnits) -> Result<(), CalibrationLoadError> {
        match units {
            DistanceUnits::Meters
                if self.meters_per_pixel_x.is_none() || self.meters_per_pixel_y.is_none() =>
            {
                Err(CalibrationLoadError::MissingScale)
            }
            _ => Ok(()),
        }
    }

    /// Project a source-pixel point into the warped top-down plane.
    pub fn project_to_warped(&self, pt: [u32; 2]) -> [f64; 2] {
        homography::project(&self.homography, pt[0] as f64, pt[1] as f64)
    }

    /// Normalize a warped-plane point against the warped canvas size.
    pub fn warped_norm(&self, pt: [f64; 2]) -> [f64; 2] {
        [
            pt[0] / self.warped_size.0 as f64,
            pt[1] / self.warped_size.1 as f64,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn load_str(yaml: &str) -> Result<CalibrationModel, CalibrationLoadError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        CalibrationModel::load(file.path())
    }

    fn identity_model(
        source: (u32, u32),
        warped: (u32, u32),
        ppm: Option<(f64, f64)>,
    ) -> CalibrationModel {
        CalibrationModel::from_parts(
            Matrix3::identity(),
            source,
            warped,
            ppm.map(|p| p.0),
            ppm.map(|p| p.1),
        )
        .unwrap()
    }

    #[test]
    fn test_load_direct_homography() {
        let model = load_str(
            r#"
source_size: [1280, 720]
warped_size: [400, 600]
homography: [0.3, 0.0, -50.0, 0.0, 0.8, -180.0, 0.0, 0.0, 1.0]
meters_per_pixel:
  x: 0.05
  y: 0.05
"#,
        )
        .unwrap();

        assert_eq!(model.source_size, (1280, 720));
        assert_eq!(model.warped_size, (400, 600));
        let p = model.project_to_warped([500, 400]);
        assert_relative_eq!(p[0], 0.3 * 500.0 - 50.0, epsilon = 1e-9);
        assert_relative_eq!(p[1], 0.8 * 400.0 - 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_load_fits_correspondences() {
        // Road quadrilateral in the image maps onto a 100x100 warped square.
        let model = load_str(
            r#"
source_size: [1000, 1000]
warped_size: [100, 100]
correspondences:
  - { src: [200.0, 300.0], dst: [0.0, 0.0] }
  - { src: [800.0, 300.0], dst: [100.0, 0.0] }
  - { src: [900.0, 900.0], dst: [100.0, 100.0] }
  - { src: [100.0, 900.0], dst: [0.0, 100.0] }
"#,
        )
        .unwrap();

        let p = model.project_to_warped([200, 300]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-6);
        let p = model.project_to_warped([900, 900]);
        assert_relative_eq!(p[0], 100.0, epsilon = 1e-6);
        assert_relative_eq!(p[1], 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CalibrationModel::load("configs/nope.yaml").unwrap_err();
        assert!(matches!(err, CalibrationLoadError::Io(_)));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = load_str("warped_size: [not a number").unwrap_err();
        assert!(matches!(err, CalibrationLoadError::Parse(_)));
    }

    #[test]
    fn test_no_transform_rejected() {
        let err = load_str(
            r#"
source_size: [640, 480]
warped_size: [300, 300]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationLoadError::MissingTransform));
    }

    #[test]
    fn test_both_transforms_rejected() {
        let err = load_str(
            r#"
source_size: [640, 480]
warped_size: [300, 300]
homography: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
correspondences:
  - { src: [0.0, 0.0], dst: [0.0, 0.0] }
  - { src: [1.0, 0.0], dst: [1.0, 0.0] }
  - { src: [1.0, 1.0], dst: [1.0, 1.0] }
  - { src: [0.0, 1.0], dst: [0.0, 1.0] }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationLoadError::MissingTransform));
    }

    #[test]
    fn test_too_few_correspondences() {
        let err = load_str(
            r#"
source_size: [640, 480]
warped_size: [300, 300]
correspondences:
  - { src: [0.0, 0.0], dst: [0.0, 0.0] }
  - { src: [1.0, 0.0], dst: [1.0, 0.0] }
  - { src: [1.0, 1.0], dst: [1.0, 1.0] }
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CalibrationLoadError::Fit(HomographyError::TooFewPoints { .. })
        ));
    }

    #[test]
    fn test_wrong_length_homography_rejected() {
        let err = load_str(
            r#"
source_size: [640, 480]
warped_size: [300, 300]
homography: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationLoadError::MalformedHomography(6)));
    }

    #[test]
    fn test_zero_warped_dimension_rejected() {
        let err = load_str(
            r#"
source_size: [640, 480]
warped_size: [300, 0]
homography: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationLoadError::ZeroWarpedSize));
    }

    #[test]
    fn test_check_units() {
        let with_scale = identity_model((100, 100), (100, 100), Some((0.1, 0.1)));
        assert!(with_scale.check_units(DistanceUnits::Meters).is_ok());
        assert!(with_scale.check_units(DistanceUnits::Pixels).is_ok());

        let without_scale = identity_model((100, 100), (100, 100), None);
        assert!(matches!(
            without_scale.check_units(DistanceUnits::Meters),
            Err(CalibrationLoadError::MissingScale)
        ));
        assert!(without_scale.check_units(DistanceUnits::Pixels).is_ok());
    }

    #[test]
    fn test_warped_norm() {
        let model = identity_model((100, 100), (400, 200), None);
        let n = model.warped_norm([100.0, 100.0]);
        assert_relative_eq!(n[0], 0.25);
        assert_relative_eq!(n[1], 0.5);
    }
}
