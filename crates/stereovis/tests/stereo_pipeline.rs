//! End-to-end checks over the whole geometry pipeline: synthetic
//! calibration through projection matrices, rectification, and feature
//! matching with epipolar verification.

use approx::assert_relative_eq;
use stereovis::calib::calibrate::project_point;
use stereovis::calib::pattern::{CalibrationPattern, CornerObservation};
use stereovis::calib::{
    build_projection, calibrate, CameraExtrinsics, CameraIntrinsics, ProjectionMatrix,
};
use stereovis::core::image::{GrayImage, ImageSize};
use stereovis::core::linalg::Mat34;
use stereovis::features::{epipolar_lines, fundamental_8point, match_images, MatcherConfig};
use stereovis::rectify::{rectify, transform_points};

fn observations_for(
    k: &CameraIntrinsics,
    poses: &[CameraExtrinsics],
) -> Vec<CornerObservation> {
    let pattern = CalibrationPattern {
        rows: 6,
        cols: 9,
        square_size: 0.0245,
    };
    let object_points = pattern.object_points();
    poses
        .iter()
        .map(|pose| {
            let rotation = pose.rotation();
            let image_points = object_points
                .iter()
                .map(|p| project_point(k, &rotation, &pose.tvec, p))
                .collect();
            CornerObservation {
                image_points,
                object_points: object_points.clone(),
            }
        })
        .collect()
}

fn board_poses(n: usize, x_offset: f64) -> Vec<CameraExtrinsics> {
    (0..n)
        .map(|i| {
            let fi = i as f64;
            CameraExtrinsics {
                rvec: [
                    0.24 * (fi * 0.8).sin() + 0.07,
                    0.20 * (fi * 0.6).cos() - 0.05,
                    0.09 * (fi * 1.1).sin(),
                ],
                tvec: [
                    x_offset - 0.09 + 0.011 * fi,
                    -0.07 + 0.007 * fi,
                    0.6 + 0.04 * (i % 5) as f64,
                ],
            }
        })
        .collect()
}

fn project_scene(p: &Mat34, x: &[f64; 3]) -> [f64; 2] {
    let h = [
        p[0][0] * x[0] + p[0][1] * x[1] + p[0][2] * x[2] + p[0][3],
        p[1][0] * x[0] + p[1][1] * x[1] + p[1][2] * x[2] + p[1][3],
        p[2][0] * x[0] + p[2][1] * x[1] + p[2][2] * x[2] + p[2][3],
    ];
    [h[0] / h[2], h[1] / h[2]]
}

#[test]
fn calibrated_stereo_pair_rectifies_to_aligned_rows() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Calibrate each camera of the rig on its own synthetic board sweep.
    let k_true = CameraIntrinsics::from_params(780.0, 795.0, 315.0, 245.0);
    let left = calibrate(&observations_for(&k_true, &board_poses(15, 0.0))).unwrap();
    let right = calibrate(&observations_for(&k_true, &board_poses(15, -0.08))).unwrap();
    assert!(left.rms_error < 1e-6);
    assert!(right.rms_error < 1e-6);

    // Two rig poses sharing the world frame, baseline mostly along x.
    let pose1 = CameraExtrinsics {
        rvec: [0.01, -0.03, 0.005],
        tvec: [0.04, 0.002, 0.01],
    };
    let pose2 = CameraExtrinsics {
        rvec: [-0.015, 0.02, 0.0],
        tvec: [-0.04, -0.003, 0.0],
    };
    let p1: ProjectionMatrix = build_projection(&left.intrinsics, &pose1);
    let p2: ProjectionMatrix = build_projection(&right.intrinsics, &pose2);

    let rt = rectify(&p1, &p2).unwrap();

    let scene = [
        [0.1, 0.05, 1.2],
        [-0.2, 0.1, 1.8],
        [0.25, -0.15, 2.4],
        [0.0, 0.0, 1.5],
    ];
    for x in &scene {
        let q1 = transform_points(&[project_scene(&p1, x)], &rt.t1)[0];
        let q2 = transform_points(&[project_scene(&p2, x)], &rt.t2)[0];
        assert_relative_eq!(q1[1], q2[1], epsilon = 1e-4);
    }
}

#[test]
fn matched_features_obey_estimated_epipolar_geometry() {
    let _ = env_logger::builder().is_test(true).try_init();

    let texture = |x: u64, y: u64| {
        let cell = (x / 9 + 13 * (y / 9)).wrapping_mul(2654435761);
        ((cell >> 7) % 256) as u8
    };
    let img1 = GrayImage::from_fn(
        ImageSize {
            width: 200,
            height: 170,
        },
        |x, y| texture(x as u64 + 30, y as u64),
    );
    let img2 = GrayImage::from_fn(
        ImageSize {
            width: 260,
            height: 170,
        },
        |x, y| texture(x as u64, y as u64),
    );

    let correspondences = match_images(&img1, &img2, &MatcherConfig::default()).unwrap();
    assert!(correspondences.len() >= 8);

    let x1: Vec<[f64; 2]> = correspondences.iter().map(|c| c.point1).collect();
    let x2: Vec<[f64; 2]> = correspondences.iter().map(|c| c.point2).collect();
    let f = fundamental_8point(&x1, &x2).unwrap();

    // Each matched point lies on the epipolar line of its counterpart.
    for (line, p2) in epipolar_lines(&x1, &f).iter().zip(x2.iter()) {
        let dist = line[0] * p2[0] + line[1] * p2[1] + line[2];
        assert!(dist.abs() < 1.0, "epipolar distance {dist}");
    }
}
