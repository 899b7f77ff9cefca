//! Line-oriented persistence of calibration results.
//!
//! The on-disk layout is the historical text format: a row-count line, a
//! column-count line, `rows * cols` lines of flattened row-major values,
//! then a blank separator line and a second block with the same layout.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use stereovis_core::linalg::Mat3;

use crate::calibrate::{CameraIntrinsics, DISTORTION_LEN};
use crate::projection::ProjectionMatrix;
use crate::CalibError;

/// Persist a camera matrix and its distortion coefficients.
pub fn save_camera_calibration<P: AsRef<Path>>(
    path: P,
    intrinsics: &CameraIntrinsics,
) -> Result<(), CalibError> {
    let mut out = BufWriter::new(File::create(path)?);
    write_block(&mut out, 3, 3, intrinsics.matrix.iter().flatten().copied())?;
    writeln!(out)?;
    write_block(
        &mut out,
        DISTORTION_LEN,
        1,
        intrinsics.distortion.iter().copied(),
    )?;
    Ok(())
}

/// Load a camera matrix and distortion coefficients saved by
/// [`save_camera_calibration`].
pub fn load_camera_calibration<P: AsRef<Path>>(path: P) -> Result<CameraIntrinsics, CalibError> {
    let mut lines = BufReader::new(File::open(path)?).lines();

    let (rows, cols, values) = read_block(&mut lines)?;
    if (rows, cols) != (3, 3) {
        return Err(CalibError::Parse(format!(
            "expected a 3x3 camera matrix block, got {rows}x{cols}"
        )));
    }
    let mut matrix: Mat3 = [[0.0; 3]; 3];
    for (i, v) in values.into_iter().enumerate() {
        matrix[i / 3][i % 3] = v;
    }

    skip_separator(&mut lines)?;

    let (rows, cols, values) = read_block(&mut lines)?;
    if rows * cols != DISTORTION_LEN {
        return Err(CalibError::Parse(format!(
            "expected {DISTORTION_LEN} distortion coefficients, got {rows}x{cols}"
        )));
    }
    let mut distortion = [0.0; DISTORTION_LEN];
    distortion.copy_from_slice(&values);

    Ok(CameraIntrinsics { matrix, distortion })
}

/// Persist a pair of 3x4 projection matrices, first camera then second.
pub fn save_projection_pair<P: AsRef<Path>>(
    path: P,
    p1: &ProjectionMatrix,
    p2: &ProjectionMatrix,
) -> Result<(), CalibError> {
    let mut out = BufWriter::new(File::create(path)?);
    write_block(&mut out, 3, 4, p1.iter().flatten().copied())?;
    writeln!(out)?;
    write_block(&mut out, 3, 4, p2.iter().flatten().copied())?;
    Ok(())
}

/// Load a projection matrix pair saved by [`save_projection_pair`].
pub fn load_projection_pair<P: AsRef<Path>>(
    path: P,
) -> Result<(ProjectionMatrix, ProjectionMatrix), CalibError> {
    let mut lines = BufReader::new(File::open(path)?).lines();
    let p1 = read_projection_block(&mut lines)?;
    skip_separator(&mut lines)?;
    let p2 = read_projection_block(&mut lines)?;
    Ok((p1, p2))
}

fn write_block<W: Write>(
    out: &mut W,
    rows: usize,
    cols: usize,
    values: impl Iterator<Item = f64>,
) -> Result<(), CalibError> {
    writeln!(out, "{rows}")?;
    writeln!(out, "{cols}")?;
    let mut written = 0;
    for v in values {
        writeln!(out, "{v}")?;
        written += 1;
    }
    debug_assert_eq!(written, rows * cols);
    Ok(())
}

fn read_block<B: BufRead>(
    lines: &mut Lines<B>,
) -> Result<(usize, usize, Vec<f64>), CalibError> {
    let rows = read_count(lines)?;
    let cols = read_count(lines)?;
    let mut values = Vec::with_capacity(rows * cols);
    for _ in 0..rows * cols {
        let line = next_line(lines)?;
        let v: f64 = line
            .trim()
            .parse()
            .map_err(|_| CalibError::Parse(format!("invalid float value `{line}`")))?;
        values.push(v);
    }
    Ok((rows, cols, values))
}

fn read_projection_block<B: BufRead>(lines: &mut Lines<B>) -> Result<ProjectionMatrix, CalibError> {
    let (rows, cols, values) = read_block(lines)?;
    if (rows, cols) != (3, 4) {
        return Err(CalibError::Parse(format!(
            "expected a 3x4 projection matrix block, got {rows}x{cols}"
        )));
    }
    let mut p: ProjectionMatrix = [[0.0; 4]; 3];
    for (i, v) in values.into_iter().enumerate() {
        p[i / 4][i % 4] = v;
    }
    Ok(p)
}

fn read_count<B: BufRead>(lines: &mut Lines<B>) -> Result<usize, CalibError> {
    let line = next_line(lines)?;
    line.trim()
        .parse()
        .map_err(|_| CalibError::Parse(format!("invalid dimension line `{line}`")))
}

fn skip_separator<B: BufRead>(lines: &mut Lines<B>) -> Result<(), CalibError> {
    let line = next_line(lines)?;
    if !line.trim().is_empty() {
        return Err(CalibError::Parse(format!(
            "expected a blank separator line, got `{line}`"
        )));
    }
    Ok(())
}

fn next_line<B: BufRead>(lines: &mut Lines<B>) -> Result<String, CalibError> {
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(CalibError::Parse("unexpected end of file".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_calibration_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameraParams");

        let mut intrinsics = CameraIntrinsics::from_params(812.341, 815.77, 319.5, 239.25);
        intrinsics.distortion = [0.12, -0.25, 1.5e-3, -7.0e-4, 0.09];

        save_camera_calibration(&path, &intrinsics).unwrap();
        let loaded = load_camera_calibration(&path).unwrap();
        assert_eq!(loaded, intrinsics);
    }

    #[test]
    fn test_projection_pair_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projectionMatrices");

        let p1: ProjectionMatrix = [
            [800.0, 0.0, 320.0, 1.5],
            [0.0, 800.0, 240.0, -2.25],
            [0.0, 0.0, 1.0, 0.125],
        ];
        let mut p2 = p1;
        p2[0][3] = -40.0;

        save_projection_pair(&path, &p1, &p2).unwrap();
        let (q1, q2) = load_projection_pair(&path).unwrap();
        assert_eq!(q1, p1);
        assert_eq!(q2, p2);
    }

    #[test]
    fn test_rejects_wrong_block_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad");
        std::fs::write(&path, "2\n2\n1\n2\n3\n4\n\n5\n1\n0\n0\n0\n0\n0\n").unwrap();
        assert!(matches!(
            load_camera_calibration(&path),
            Err(CalibError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_camera_calibration("/nonexistent/cameraParams"),
            Err(CalibError::Io(_))
        ));
    }
}
