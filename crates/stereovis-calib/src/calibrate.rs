//! Camera calibration from planar chessboard observations.
//!
//! The solve runs in two stages: a closed-form bootstrap (plane homographies
//! per view, Zhang's intrinsic constraints, extrinsics from `K^-1 H`)
//! followed by a joint Levenberg-Marquardt refinement of intrinsics,
//! distortion, and every per-view pose against the reprojection error.

use log::debug;
use serde::{Deserialize, Serialize};
use stereovis_core::linalg::{
    cross3, mat3_inverse, mat3_vec3, norm3, scale3, solve_dense, Mat3, Vec3,
};
use stereovis_core::rotation::{rodrigues, rotation_to_axis_angle};
use stereovis_core::svd::{mat_from_rows, nearest_rotation, smallest_right_singular_vector};

use crate::homography::homography_dlt;
use crate::pattern::CornerObservation;
use crate::CalibError;

/// Minimum number of valid pattern observations a calibration run requires.
pub const MIN_OBSERVATIONS: usize = 15;

/// Length of the distortion coefficient vector: `[k1, k2, p1, p2, k3]`.
pub const DISTORTION_LEN: usize = 5;

/// Intrinsic camera parameters: 3x3 camera matrix plus the fixed-length
/// distortion vector. Skew is always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// The 3x3 camera matrix (fx, fy on the diagonal, principal point in the
    /// last column).
    pub matrix: Mat3,
    /// Lens distortion coefficients `[k1, k2, p1, p2, k3]`.
    pub distortion: [f64; DISTORTION_LEN],
}

impl CameraIntrinsics {
    /// Camera matrix from explicit parameters, zero distortion.
    pub fn from_params(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            matrix: [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]],
            distortion: [0.0; DISTORTION_LEN],
        }
    }
}

/// Pose of the calibration target relative to the camera for one view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraExtrinsics {
    /// Axis-angle rotation vector.
    pub rvec: Vec3,
    /// Translation vector.
    pub tvec: Vec3,
}

impl CameraExtrinsics {
    /// Rotation matrix form of `rvec`.
    pub fn rotation(&self) -> Mat3 {
        rodrigues(&self.rvec)
    }
}

/// Result of a calibration run.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    /// Estimated intrinsic parameters.
    pub intrinsics: CameraIntrinsics,
    /// One pose per accepted observation, same order as the input.
    pub extrinsics: Vec<CameraExtrinsics>,
    /// Root-mean-square reprojection error in pixels over all corners.
    pub rms_error: f64,
}

/// Project a 3D object point through pose, distortion, and intrinsics.
///
/// The distortion model is the 5-coefficient radial/tangential polynomial
/// applied in normalized camera coordinates.
pub fn project_point(
    intrinsics: &CameraIntrinsics,
    rotation: &Mat3,
    tvec: &Vec3,
    object_point: &Vec3,
) -> [f64; 2] {
    let pc = [
        stereovis_core::linalg::dot3(&rotation[0], object_point) + tvec[0],
        stereovis_core::linalg::dot3(&rotation[1], object_point) + tvec[1],
        stereovis_core::linalg::dot3(&rotation[2], object_point) + tvec[2],
    ];
    let x = pc[0] / pc[2];
    let y = pc[1] / pc[2];

    let [k1, k2, p1, p2, k3] = intrinsics.distortion;
    let r2 = x * x + y * y;
    let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
    let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

    let m = &intrinsics.matrix;
    [m[0][0] * xd + m[0][2], m[1][1] * yd + m[1][2]]
}

/// Calibrate the camera from a set of corner observations.
///
/// Requires at least [`MIN_OBSERVATIONS`] views. Returns the refined
/// intrinsics, one extrinsic pose per view, and the final RMS reprojection
/// error as a convergence signal. Pure function: the observations are not
/// consumed or mutated.
pub fn calibrate(observations: &[CornerObservation]) -> Result<CalibrationOutcome, CalibError> {
    if observations.len() < MIN_OBSERVATIONS {
        return Err(CalibError::InsufficientObservations {
            required: MIN_OBSERVATIONS,
            actual: observations.len(),
        });
    }

    // Stage 1: closed-form bootstrap.
    let mut homographies = Vec::with_capacity(observations.len());
    for obs in observations {
        let planar: Vec<[f64; 2]> = obs.object_points.iter().map(|p| [p[0], p[1]]).collect();
        homographies.push(homography_dlt(&planar, &obs.image_points)?);
    }
    let k0 = zhang_intrinsics(&homographies)?;
    let k0_inv = mat3_inverse(&k0).ok_or_else(|| {
        CalibError::NumericalInstability("bootstrap camera matrix is singular".into())
    })?;

    let mut extrinsics = Vec::with_capacity(observations.len());
    for h in &homographies {
        extrinsics.push(extrinsics_from_homography(&k0_inv, h));
    }

    // Stage 2: joint LM refinement.
    let (params, rms) = refine_all(&k0, &extrinsics, observations)?;
    let (intrinsics, extrinsics) = unpack_params(&params, observations.len());
    debug!(
        "calibration converged over {} views, rms {:.6} px",
        observations.len(),
        rms
    );

    Ok(CalibrationOutcome {
        intrinsics,
        extrinsics,
        rms_error: rms,
    })
}

/// Zhang's closed-form intrinsics from a set of plane homographies, with the
/// skew constrained to zero.
fn zhang_intrinsics(homographies: &[Mat3]) -> Result<Mat3, CalibError> {
    let m = homographies.len();
    let mut rows = Vec::with_capacity(2 * m * 6);
    for h in homographies {
        let v12 = v_ij(h, 0, 1);
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        rows.extend_from_slice(&v12);
        for i in 0..6 {
            rows.push(v11[i] - v22[i]);
        }
    }
    let a = mat_from_rows(2 * m, 6, &rows);
    let mut b = smallest_right_singular_vector(&a);
    if b[0] < 0.0 {
        for v in b.iter_mut() {
            *v = -*v;
        }
    }
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    if b11.abs() < 1e-15 || denom.abs() < 1e-15 * (b11 * b11 + b22 * b22).max(1e-300) {
        return Err(CalibError::NumericalInstability(
            "degenerate view configuration in intrinsic bootstrap".into(),
        ));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let alpha2 = lambda / b11;
    let beta2 = lambda * b11 / denom;
    if alpha2 <= 0.0 || beta2 <= 0.0 {
        return Err(CalibError::NumericalInstability(
            "intrinsic bootstrap produced a non-positive focal term".into(),
        ));
    }
    let alpha = alpha2.sqrt();
    let beta = beta2.sqrt();
    let u0 = -b13 * alpha2 / lambda;

    Ok([[alpha, 0.0, u0], [0.0, beta, v0], [0.0, 0.0, 1.0]])
}

/// The Zhang constraint 6-vector built from homography columns `i` and `j`.
fn v_ij(h: &Mat3, i: usize, j: usize) -> [f64; 6] {
    let hi = [h[0][i], h[1][i], h[2][i]];
    let hj = [h[0][j], h[1][j], h[2][j]];
    [
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ]
}

/// Board pose for one view from its homography: `H ~ K [r1 r2 t]`.
fn extrinsics_from_homography(k_inv: &Mat3, h: &Mat3) -> CameraExtrinsics {
    let h1 = [h[0][0], h[1][0], h[2][0]];
    let h2 = [h[0][1], h[1][1], h[2][1]];
    let h3 = [h[0][2], h[1][2], h[2][2]];

    let kh1 = mat3_vec3(k_inv, &h1);
    let kh2 = mat3_vec3(k_inv, &h2);
    let kh3 = mat3_vec3(k_inv, &h3);

    let lam = 1.0 / norm3(&kh1).max(1e-300);
    let mut r1 = scale3(&kh1, lam);
    let mut r2 = scale3(&kh2, lam);
    let mut t = scale3(&kh3, lam);
    if t[2] < 0.0 {
        // The board must sit in front of the camera.
        r1 = scale3(&r1, -1.0);
        r2 = scale3(&r2, -1.0);
        t = scale3(&t, -1.0);
    }
    let r3 = cross3(&r1, &r2);

    let r_approx = [
        [r1[0], r2[0], r3[0]],
        [r1[1], r2[1], r3[1]],
        [r1[2], r2[2], r3[2]],
    ];
    let r = nearest_rotation(&r_approx);
    CameraExtrinsics {
        rvec: rotation_to_axis_angle(&r),
        tvec: t,
    }
}

// Parameter vector layout: [fx, fy, cx, cy, k1, k2, p1, p2, k3] then
// [rvec, tvec] per view.
const INTRINSIC_PARAMS: usize = 4 + DISTORTION_LEN;

fn pack_params(k: &Mat3, extrinsics: &[CameraExtrinsics]) -> Vec<f64> {
    let mut params = vec![k[0][0], k[1][1], k[0][2], k[1][2], 0.0, 0.0, 0.0, 0.0, 0.0];
    for e in extrinsics {
        params.extend_from_slice(&e.rvec);
        params.extend_from_slice(&e.tvec);
    }
    params
}

fn unpack_params(params: &[f64], views: usize) -> (CameraIntrinsics, Vec<CameraExtrinsics>) {
    let mut intrinsics = CameraIntrinsics::from_params(params[0], params[1], params[2], params[3]);
    intrinsics
        .distortion
        .copy_from_slice(&params[4..INTRINSIC_PARAMS]);

    let mut extrinsics = Vec::with_capacity(views);
    for v in 0..views {
        let base = INTRINSIC_PARAMS + 6 * v;
        extrinsics.push(CameraExtrinsics {
            rvec: [params[base], params[base + 1], params[base + 2]],
            tvec: [params[base + 3], params[base + 4], params[base + 5]],
        });
    }
    (intrinsics, extrinsics)
}

/// Stack every view's reprojection residuals; returns the squared sum.
fn residuals(params: &[f64], observations: &[CornerObservation], out: &mut [f64]) -> f64 {
    let (intrinsics, extrinsics) = unpack_params(params, observations.len());
    let mut sum_sq = 0.0;
    let mut idx = 0;
    for (obs, extr) in observations.iter().zip(extrinsics.iter()) {
        let rotation = extr.rotation();
        for (object, image) in obs.object_points.iter().zip(obs.image_points.iter()) {
            let p = project_point(&intrinsics, &rotation, &extr.tvec, object);
            let du = p[0] - image[0];
            let dv = p[1] - image[1];
            out[idx] = du;
            out[idx + 1] = dv;
            idx += 2;
            sum_sq += du * du + dv * dv;
        }
    }
    sum_sq
}

/// Joint Levenberg-Marquardt over intrinsics, distortion, and all poses.
///
/// Numeric central-difference Jacobian, multiplicative damping, bounded by a
/// fixed iteration cap so the solve always terminates.
fn refine_all(
    k0: &Mat3,
    extrinsics0: &[CameraExtrinsics],
    observations: &[CornerObservation],
) -> Result<(Vec<f64>, f64), CalibError> {
    const MAX_ITERS: usize = 30;
    const LAMBDA_INIT: f64 = 1e-3;
    const LAMBDA_MUL: f64 = 10.0;
    const MAX_REJECTS: usize = 5;

    let mut x = pack_params(k0, extrinsics0);
    let n_params = x.len();
    let total_points: usize = observations.iter().map(|o| o.object_points.len()).sum();
    let m = 2 * total_points;

    let mut res = vec![0.0; m];
    let mut res_p = vec![0.0; m];
    let mut res_m = vec![0.0; m];
    let mut jac = vec![0.0; m * n_params];
    let mut a = vec![0.0; n_params * n_params];
    let mut g = vec![0.0; n_params];

    let mut err_base = residuals(&x, observations, &mut res);
    let mut lambda = LAMBDA_INIT;
    let mut rejects = 0usize;

    for iter in 0..MAX_ITERS {
        jac.fill(0.0);
        a.fill(0.0);
        g.fill(0.0);

        for p in 0..n_params {
            let h = 1e-6 * x[p].abs().max(1.0);
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[p] += h;
            xm[p] -= h;
            residuals(&xp, observations, &mut res_p);
            residuals(&xm, observations, &mut res_m);
            for r in 0..m {
                jac[r * n_params + p] = (res_p[r] - res_m[r]) / (2.0 * h);
            }
        }

        // Normal equations (J^T J + lambda I) delta = -J^T r
        for r in 0..m {
            let rv = res[r];
            let row = &jac[r * n_params..(r + 1) * n_params];
            for c in 0..n_params {
                let jrc = row[c];
                g[c] += jrc * rv;
                for d in c..n_params {
                    a[c * n_params + d] += jrc * row[d];
                }
            }
        }
        for c in 0..n_params {
            for d in 0..c {
                a[c * n_params + d] = a[d * n_params + c];
            }
        }
        for d in 0..n_params {
            a[d * n_params + d] += lambda;
        }

        let mut a_work = a.clone();
        let mut rhs: Vec<f64> = g.iter().map(|v| -v).collect();
        let delta = match solve_dense(&mut a_work, &mut rhs, n_params) {
            Some(d) => d,
            None => {
                lambda *= LAMBDA_MUL;
                rejects += 1;
                if rejects >= MAX_REJECTS {
                    break;
                }
                continue;
            }
        };

        let mut x_new = x.clone();
        for (xi, di) in x_new.iter_mut().zip(delta.iter()) {
            *xi += di;
        }
        let err_new = residuals(&x_new, observations, &mut res_p);
        if err_new < err_base {
            let improvement = err_base - err_new;
            x = x_new;
            res.copy_from_slice(&res_p);
            err_base = err_new;
            lambda = (lambda / LAMBDA_MUL).max(1e-12);
            rejects = 0;
            debug!("lm iter {iter}: error {err_base:.3e}, lambda {lambda:.1e}");
            if improvement <= 1e-12 * (err_base + 1e-12) {
                break;
            }
        } else {
            lambda *= LAMBDA_MUL;
            rejects += 1;
            if rejects >= MAX_REJECTS {
                break;
            }
        }
    }

    let rms = (err_base / total_points as f64).sqrt();
    if !rms.is_finite() {
        return Err(CalibError::NumericalInstability(
            "refinement diverged to a non-finite error".into(),
        ));
    }
    Ok((x, rms))
}
