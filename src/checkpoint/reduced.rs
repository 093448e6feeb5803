//! Checkpoints for the outer refinement loop.
//!
//! Between solves the outer loop grows the active constraint-point set and
//! re-solves in a reduced variable space, so its resume state is not the
//! block-partitioned `x, X, y, Y` snapshot but the reduced point together
//! with the transform that defines the space: `yp`, `yp_to_y`, the reduced
//! dual objective, the active point set, the current threshold and the
//! primal scale.  The format is partition-independent and written by one
//! process; it is not interchangeable with the full per-process format.

use super::CheckpointError;
use crate::algebra::{Matrix, Scalar};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Resume state for one generation of the outer refinement loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedCheckpoint<T> {
    /// current point in the reduced variable space
    pub yp: Vec<T>,
    /// transform from the reduced space to the dual-objective space
    pub yp_to_y: Matrix<T>,
    /// reduced dual objective vector `b*`
    pub dual_objective_b: Vec<T>,
    /// active sample points per function block
    pub points: Vec<Vec<T>>,
    /// duality gap threshold the outer loop had reached
    pub threshold: T,
    /// normalization scale applied to the primal objective
    pub primal_c_scale: T,
}

fn generation_file(directory: &Path, generation: i64) -> PathBuf {
    directory.join(format!("checkpoint_{}.reduced", generation))
}

/// Write the next generation of the reduced checkpoint, keeping the
/// previous generation as a backup and removing anything older.
pub fn save_reduced_checkpoint<T: Scalar>(
    directory: &Path,
    state: &ReducedCheckpoint<T>,
    current_generation: &mut i64,
    backup_generation: &mut Option<i64>,
) -> Result<(), CheckpointError> {
    let next = *current_generation + 1;
    let path = generation_file(directory, next);
    let io_err = |source| CheckpointError::Io {
        path: path.clone(),
        rank: 0,
        source,
    };

    fs::create_dir_all(directory).map_err(io_err)?;
    let tmp = directory.join("checkpoint.reduced.tmp");
    {
        let mut out = std::io::BufWriter::new(fs::File::create(&tmp).map_err(io_err)?);
        write_scalars(&mut out, &state.yp).map_err(io_err)?;
        write_i64(&mut out, state.yp_to_y.m as i64).map_err(io_err)?;
        write_i64(&mut out, state.yp_to_y.n as i64).map_err(io_err)?;
        for row in 0..state.yp_to_y.m {
            for col in 0..state.yp_to_y.n {
                write_scalar(&mut out, &state.yp_to_y[(row, col)]).map_err(io_err)?;
            }
        }
        write_scalars(&mut out, &state.dual_objective_b).map_err(io_err)?;
        write_i64(&mut out, state.points.len() as i64).map_err(io_err)?;
        for block_points in &state.points {
            write_scalars(&mut out, block_points).map_err(io_err)?;
        }
        write_scalar(&mut out, &state.threshold).map_err(io_err)?;
        write_scalar(&mut out, &state.primal_c_scale).map_err(io_err)?;
        out.flush().map_err(io_err)?;
    }
    fs::rename(&tmp, &path).map_err(io_err)?;

    if let Some(old_backup) = backup_generation.take() {
        let _ = fs::remove_file(generation_file(directory, old_backup));
    }
    *backup_generation = Some(*current_generation);
    *current_generation = next;
    Ok(())
}

/// Load the newest readable generation, if any.
pub fn load_reduced_checkpoint<T: Scalar>(
    directory: &Path,
) -> Result<Option<(ReducedCheckpoint<T>, i64)>, CheckpointError> {
    let mut generations = Vec::new();
    if let Ok(entries) = fs::read_dir(directory) {
        for entry in entries.flatten() {
            if let Some(generation) = parse_generation(&entry.file_name().to_string_lossy()) {
                generations.push(generation);
            }
        }
    }
    generations.sort_unstable();
    let Some(&generation) = generations.last() else {
        return Ok(None);
    };

    let path = generation_file(directory, generation);
    let mut reader =
        std::io::BufReader::new(fs::File::open(&path).map_err(|source| CheckpointError::Io {
            path: path.clone(),
            rank: 0,
            source,
        })?);

    let yp = read_scalars(&mut reader, &path)?;
    let rows = read_i64(&mut reader, &path)? as usize;
    let cols = read_i64(&mut reader, &path)? as usize;
    let mut yp_to_y = Matrix::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            yp_to_y[(row, col)] = read_scalar(&mut reader, &path)?;
        }
    }
    let dual_objective_b = read_scalars(&mut reader, &path)?;
    let num_blocks = read_i64(&mut reader, &path)? as usize;
    let mut points = Vec::with_capacity(num_blocks);
    for _ in 0..num_blocks {
        points.push(read_scalars(&mut reader, &path)?);
    }
    let threshold = read_scalar(&mut reader, &path)?;
    let primal_c_scale = read_scalar(&mut reader, &path)?;

    Ok(Some((
        ReducedCheckpoint {
            yp,
            yp_to_y,
            dual_objective_b,
            points,
            threshold,
            primal_c_scale,
        },
        generation,
    )))
}

fn parse_generation(name: &str) -> Option<i64> {
    name.strip_prefix("checkpoint_")?
        .strip_suffix(".reduced")?
        .parse()
        .ok()
}

fn write_i64(out: &mut impl Write, v: i64) -> std::io::Result<()> {
    out.write_all(&v.to_le_bytes())
}

fn write_scalar<T: Scalar>(out: &mut impl Write, v: &T) -> std::io::Result<()> {
    let mut buf = vec![0u8; T::serialized_size()];
    v.write_bytes(&mut buf);
    out.write_all(&buf)
}

fn write_scalars<T: Scalar>(out: &mut impl Write, values: &[T]) -> std::io::Result<()> {
    write_i64(out, values.len() as i64)?;
    for v in values {
        write_scalar(out, v)?;
    }
    Ok(())
}

fn read_i64(reader: &mut impl Read, path: &Path) -> Result<i64, CheckpointError> {
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf)
        .map_err(|_| CheckpointError::Truncated {
            path: path.to_path_buf(),
            rank: 0,
        })?;
    Ok(i64::from_le_bytes(buf))
}

fn read_scalar<T: Scalar>(reader: &mut impl Read, path: &Path) -> Result<T, CheckpointError> {
    let mut buf = vec![0u8; T::serialized_size()];
    reader
        .read_exact(&mut buf)
        .map_err(|_| CheckpointError::Truncated {
            path: path.to_path_buf(),
            rank: 0,
        })?;
    Ok(T::from_bytes(&buf))
}

fn read_scalars<T: Scalar>(reader: &mut impl Read, path: &Path) -> Result<Vec<T>, CheckpointError> {
    let count = read_i64(reader, path)? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(read_scalar(reader, path)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReducedCheckpoint<f64> {
        ReducedCheckpoint {
            yp: vec![0.5, -1.5],
            yp_to_y: Matrix::from_rows(&[&[1.0, 0.0], &[0.5, 2.0], &[0.0, 1.0]]),
            dual_objective_b: vec![1.0, 2.0],
            points: vec![vec![0.0, 1.0, f64::MAX], vec![0.25]],
            threshold: 1e-4,
            primal_c_scale: 3.0,
        }
    }

    #[test]
    fn test_generation_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut generation = 0;
        let mut backup = None;

        let first = sample();
        save_reduced_checkpoint(dir.path(), &first, &mut generation, &mut backup).unwrap();
        assert_eq!(generation, 1);

        let mut second = sample();
        second.threshold = 1e-6;
        save_reduced_checkpoint(dir.path(), &second, &mut generation, &mut backup).unwrap();
        assert_eq!(generation, 2);
        assert_eq!(backup, Some(1));

        let (loaded, loaded_generation) =
            load_reduced_checkpoint::<f64>(dir.path()).unwrap().unwrap();
        assert_eq!(loaded_generation, 2);
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_empty_directory_is_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_reduced_checkpoint::<f64>(dir.path())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_backup_pruned_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut generation = 0;
        let mut backup = None;
        for _ in 0..4 {
            save_reduced_checkpoint(dir.path(), &sample(), &mut generation, &mut backup).unwrap();
        }
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| parse_generation(&e.unwrap().file_name().to_string_lossy()))
            .collect();
        assert_eq!(files.len(), 2);
    }
}
