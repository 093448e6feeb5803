//! Per-process binary solver checkpoints.
//!
//! Each process writes its own file `checkpoint.<rank>` holding, for each
//! of `x, X, y, Y` in fixed order, every owned block as
//! `i64 local_height, i64 local_width` (little-endian) followed by the
//! block values row-major in the scalar type's fixed-size encoding.  A
//! checkpoint is valid only for the exact partition that produced it:
//! loading verifies every stored extent against the current partition and
//! fails without applying any state on the first mismatch.
//!
//! The reduced format used by the outer refinement loop lives in
//! [`reduced`]; the two formats are tied to their solve modes and are not
//! interchangeable.

#![allow(non_snake_case)]

pub mod reduced;

use crate::algebra::{BlockDiagonalMatrix, Matrix, Scalar};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or saving checkpoint files.  All of these abort the
/// run: resuming from partial or mismatched state is never meaningful.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error(
        "Incompatible checkpoint file {path} (rank {rank}): expected dimensions \
         ({expected_height},{expected_width}), but found ({found_height},{found_width})"
    )]
    DimensionMismatch {
        path: PathBuf,
        rank: usize,
        expected_height: i64,
        expected_width: i64,
        found_height: i64,
        found_width: i64,
    },
    #[error("Truncated checkpoint file {path} (rank {rank})")]
    Truncated { path: PathBuf, rank: usize },
    #[error("Checkpoint io error on {path} (rank {rank}): {source}")]
    Io {
        path: PathBuf,
        rank: usize,
        source: std::io::Error,
    },
}

fn checkpoint_file(directory: &Path, rank: usize) -> PathBuf {
    directory.join(format!("checkpoint.{}", rank))
}

/// Whether a checkpoint for this rank exists under `directory`.
pub fn exists(directory: &Path, rank: usize) -> bool {
    checkpoint_file(directory, rank).is_file()
}

/// Write this process's solver state.
///
/// The file is written to a temporary name and renamed into place so a
/// crash mid-write cannot corrupt an existing checkpoint.
#[allow(non_snake_case)]
pub fn save_checkpoint<T: Scalar>(
    directory: &Path,
    rank: usize,
    x: &[Vec<T>],
    X: &BlockDiagonalMatrix<T>,
    y: &[T],
    Y: &BlockDiagonalMatrix<T>,
) -> Result<(), CheckpointError> {
    let path = checkpoint_file(directory, rank);
    let io_err = |source| CheckpointError::Io {
        path: path.clone(),
        rank,
        source,
    };

    fs::create_dir_all(directory).map_err(io_err)?;
    let tmp_path = directory.join(format!("checkpoint.{}.tmp", rank));
    {
        let mut out = std::io::BufWriter::new(fs::File::create(&tmp_path).map_err(io_err)?);
        for block in x {
            write_vector_block(&mut out, block).map_err(io_err)?;
        }
        for block in &X.blocks {
            write_matrix_block(&mut out, block).map_err(io_err)?;
        }
        write_vector_block(&mut out, y).map_err(io_err)?;
        for block in &Y.blocks {
            write_matrix_block(&mut out, block).map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
    }
    fs::rename(&tmp_path, &path).map_err(io_err)?;
    Ok(())
}

/// Load this process's solver state, replacing `x, X, y, Y` only if the
/// whole file matches the current partition.
///
/// Returns `Ok(false)` if no checkpoint exists for this rank.
#[allow(non_snake_case)]
pub fn load_checkpoint<T: Scalar>(
    directory: &Path,
    rank: usize,
    x: &mut [Vec<T>],
    X: &mut BlockDiagonalMatrix<T>,
    y: &mut [T],
    Y: &mut BlockDiagonalMatrix<T>,
) -> Result<bool, CheckpointError> {
    let path = checkpoint_file(directory, rank);
    if !path.is_file() {
        return Ok(false);
    }
    let mut reader = std::io::BufReader::new(fs::File::open(&path).map_err(|source| {
        CheckpointError::Io {
            path: path.clone(),
            rank,
            source,
        }
    })?);

    // Stage everything first so a mismatch deep in the file leaves the
    // current state untouched.
    let mut staged_x: Vec<Vec<T>> = Vec::with_capacity(x.len());
    for block in x.iter() {
        staged_x.push(read_vector_block(&mut reader, block.len(), &path, rank)?);
    }
    let mut staged_X: Vec<Matrix<T>> = Vec::with_capacity(X.blocks.len());
    for block in &X.blocks {
        staged_X.push(read_matrix_block(&mut reader, block.m, block.n, &path, rank)?);
    }
    let staged_y = read_vector_block(&mut reader, y.len(), &path, rank)?;
    let mut staged_Y: Vec<Matrix<T>> = Vec::with_capacity(Y.blocks.len());
    for block in &Y.blocks {
        staged_Y.push(read_matrix_block(&mut reader, block.m, block.n, &path, rank)?);
    }

    for (dst, src) in x.iter_mut().zip(staged_x) {
        *dst = src;
    }
    X.blocks = staged_X;
    y.copy_from_slice(&staged_y);
    Y.blocks = staged_Y;
    Ok(true)
}

fn write_vector_block<T: Scalar>(out: &mut impl Write, v: &[T]) -> std::io::Result<()> {
    out.write_all(&(v.len() as i64).to_le_bytes())?;
    out.write_all(&1i64.to_le_bytes())?;
    let mut buf = vec![0u8; T::serialized_size()];
    for value in v {
        value.write_bytes(&mut buf);
        out.write_all(&buf)?;
    }
    Ok(())
}

fn write_matrix_block<T: Scalar>(out: &mut impl Write, m: &Matrix<T>) -> std::io::Result<()> {
    out.write_all(&(m.m as i64).to_le_bytes())?;
    out.write_all(&(m.n as i64).to_le_bytes())?;
    let mut buf = vec![0u8; T::serialized_size()];
    for row in 0..m.m {
        for col in 0..m.n {
            m[(row, col)].write_bytes(&mut buf);
            out.write_all(&buf)?;
        }
    }
    Ok(())
}

fn read_extents(
    reader: &mut impl Read,
    expected_height: i64,
    expected_width: i64,
    path: &Path,
    rank: usize,
) -> Result<(), CheckpointError> {
    let mut buf = [0u8; 8];
    let mut next = |buf: &mut [u8; 8]| -> Result<i64, CheckpointError> {
        reader
            .read_exact(buf)
            .map_err(|_| CheckpointError::Truncated {
                path: path.to_path_buf(),
                rank,
            })?;
        Ok(i64::from_le_bytes(*buf))
    };
    let found_height = next(&mut buf)?;
    let found_width = next(&mut buf)?;
    if found_height != expected_height || found_width != expected_width {
        return Err(CheckpointError::DimensionMismatch {
            path: path.to_path_buf(),
            rank,
            expected_height,
            expected_width,
            found_height,
            found_width,
        });
    }
    Ok(())
}

fn read_values<T: Scalar>(
    reader: &mut impl Read,
    count: usize,
    path: &Path,
    rank: usize,
) -> Result<Vec<T>, CheckpointError> {
    let mut buf = vec![0u8; T::serialized_size()];
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        reader
            .read_exact(&mut buf)
            .map_err(|_| CheckpointError::Truncated {
                path: path.to_path_buf(),
                rank,
            })?;
        values.push(T::from_bytes(&buf));
    }
    Ok(values)
}

fn read_vector_block<T: Scalar>(
    reader: &mut impl Read,
    expected_len: usize,
    path: &Path,
    rank: usize,
) -> Result<Vec<T>, CheckpointError> {
    read_extents(reader, expected_len as i64, 1, path, rank)?;
    read_values(reader, expected_len, path, rank)
}

fn read_matrix_block<T: Scalar>(
    reader: &mut impl Read,
    height: usize,
    width: usize,
    path: &Path,
    rank: usize,
) -> Result<Matrix<T>, CheckpointError> {
    read_extents(reader, height as i64, width as i64, path, rank)?;
    let values = read_values::<T>(reader, height * width, path, rank)?;
    let mut m = Matrix::zeros((height, width));
    let mut at = 0;
    for row in 0..height {
        for col in 0..width {
            m[(row, col)] = values[at];
            at += 1;
        }
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> (Vec<Vec<f64>>, BlockDiagonalMatrix<f64>, Vec<f64>, BlockDiagonalMatrix<f64>) {
        let x = vec![vec![1.0, 2.0], vec![3.0]];
        let mut X = BlockDiagonalMatrix::<f64>::zeros(&[2, 1]);
        X.blocks[0] = Matrix::from_rows(&[&[1.0, 0.25], &[0.25, 2.0]]);
        X.blocks[1] = Matrix::from_rows(&[&[5.0]]);
        let y = vec![-0.5, 0.125];
        let mut Y = BlockDiagonalMatrix::<f64>::zeros(&[2, 1]);
        Y.blocks[0] = Matrix::from_rows(&[&[3.0, -1.0], &[-1.0, 4.0]]);
        Y.blocks[1] = Matrix::from_rows(&[&[0.875]]);
        (x, X, y, Y)
    }

    #[test]
    fn test_roundtrip_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let (x, X, y, Y) = sample_state();
        save_checkpoint(dir.path(), 0, &x, &X, &y, &Y).unwrap();
        assert!(exists(dir.path(), 0));

        let (mut x2, mut X2, mut y2, mut Y2) = sample_state();
        x2[0][0] = 99.0;
        X2.blocks[0][(0, 0)] = 99.0;
        y2[1] = 99.0;
        Y2.blocks[1][(0, 0)] = 99.0;
        assert!(load_checkpoint(dir.path(), 0, &mut x2, &mut X2, &mut y2, &mut Y2).unwrap());

        assert_eq!(x, x2);
        assert_eq!(y, y2);
        for (a, b) in X.blocks.iter().zip(X2.blocks.iter()) {
            assert_eq!(a.data(), b.data());
        }
        for (a, b) in Y.blocks.iter().zip(Y2.blocks.iter()) {
            assert_eq!(a.data(), b.data());
        }
    }

    #[test]
    fn test_missing_checkpoint_reports_absent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut x, mut X, mut y, mut Y) = sample_state();
        assert!(!load_checkpoint(dir.path(), 3, &mut x, &mut X, &mut y, &mut Y).unwrap());
    }

    #[test]
    fn test_mismatched_partition_rejected_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let (x, X, y, Y) = sample_state();
        save_checkpoint(dir.path(), 0, &x, &X, &y, &Y).unwrap();

        // same blocks but one local height off by one
        let mut x2 = vec![vec![1.0, 2.0, 3.0], vec![3.0]];
        let (_, mut X2, mut y2, mut Y2) = sample_state();
        let before = x2.clone();
        let err = load_checkpoint(dir.path(), 0, &mut x2, &mut X2, &mut y2, &mut Y2).unwrap_err();
        match err {
            CheckpointError::DimensionMismatch {
                rank,
                expected_height,
                found_height,
                ..
            } => {
                assert_eq!(rank, 0);
                assert_eq!(expected_height, 3);
                assert_eq!(found_height, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        // nothing applied
        assert_eq!(x2, before);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (x, X, y, Y) = sample_state();
        save_checkpoint(dir.path(), 0, &x, &X, &y, &Y).unwrap();

        let path = dir.path().join("checkpoint.0");
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        let (mut x2, mut X2, mut y2, mut Y2) = sample_state();
        let err = load_checkpoint(dir.path(), 0, &mut x2, &mut X2, &mut y2, &mut Y2).unwrap_err();
        assert!(matches!(err, CheckpointError::Truncated { .. }));
    }
}
