//! 3×3 projective transforms: application and least-squares estimation from
//! point correspondences (normalized DLT).

use nalgebra::{DMatrix, Matrix3, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    TooFewPoints { needed: usize, got: usize },
    Degenerate(String),
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "need at least {} correspondences, got {}", needed, got)
            }
            Self::Degenerate(msg) => write!(f, "degenerate correspondences: {}", msg),
        }
    }
}

impl std::error::Error for HomographyError {}

/// Apply H to a 2D point: H * [x, y, 1]^T, then perspective divide.
///
/// A point on the transform's vanishing line has homogeneous w ≈ 0; the
/// result is then non-finite and the caller is expected to filter it.
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-12 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Similarity transform that centers `pts` on the origin with mean distance
/// sqrt(2), and the transformed points. Conditioning step for the DLT solve.
fn conditioning_transform(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let conditioned = pts.iter().map(|p| [s * (p[0] - cx), s * (p[1] - cy)]).collect();
    (t, conditioned)
}

/// Estimate the homography mapping `src` points onto `dst` points from ≥4
/// correspondences, least-squares over all of them.
///
/// Both point sets are conditioned first, the 2n×9 DLT system is solved as
/// the smallest eigenvector of AᵀA, and the result is denormalized and
/// scaled so that h33 = 1.
pub fn fit_homography(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>, HomographyError> {
    let n = src.len();
    if n < 4 || dst.len() < 4 {
        return Err(HomographyError::TooFewPoints {
            needed: 4,
            got: n.min(dst.len()),
        });
    }
    if n != dst.len() {
        return Err(HomographyError::Degenerate(format!(
            "{} source points vs {} destination points",
            n,
            dst.len()
        )));
    }

    let (t_src, src_c) = conditioning_transform(src);
    let (t_dst, dst_c) = conditioning_transform(dst);

    // Two rows per correspondence:
    //   [ -x -y -1   0  0  0   ux uy u ]
    //   [  0  0  0  -x -y -1   vx vy v ]
    let mut a = DMatrix::zeros(2 * n, 9);
    for (i, (s, d)) in src_c.iter().zip(dst_c.iter()).enumerate() {
        let (x, y) = (s[0], s[1]);
        let (u, v) = (d[0], d[1]);

        a[(2 * i, 0)] = -x;
        a[(2 * i, 1)] = -y;
        a[(2 * i, 2)] = -1.0;
        a[(2 * i, 6)] = u * x;
        a[(2 * i, 7)] = u * y;
        a[(2 * i, 8)] = u;

        a[(2 * i + 1, 3)] = -x;
        a[(2 * i + 1, 4)] = -y;
        a[(2 * i + 1, 5)] = -1.0;
        a[(2 * i + 1, 6)] = v * x;
        a[(2 * i + 1, 7)] = v * y;
        a[(2 * i + 1, 8)] = v;
    }

    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);

    let mut min_idx = 0;
    for i in 1..9 {
        if eig.eigenvalues[i].abs() < eig.eigenvalues[min_idx].abs() {
            min_idx = i;
        }
    }
    let h_c = Matrix3::from_fn(|r, c| eig.eigenvectors[(3 * r + c, min_idx)]);

    let t_dst_inv = t_dst.try_inverse().ok_or_else(|| {
        HomographyError::Degenerate("destination conditioning transform not invertible".into())
    })?;
    let h = t_dst_inv * h_c * t_src;

    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return Err(HomographyError::Degenerate("h33 vanishes".into()));
    }
    let h = h / scale;

    if h.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::Degenerate("non-finite solution".into()));
    }
    Ok(h)
}
