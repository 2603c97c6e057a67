//! Test system generator for the LDLT accelerator.
//!
//! Builds linear systems with a known solution so every run can check the
//! accelerator's answer: the identity system from the bring-up harness and
//! random symmetric positive definite systems for wider coverage.

use crate::buffer::AlignedBuf;
use anyhow::Result;
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of the generated matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SystemKind {
    /// Identity matrix with right-hand side `[1, 2, ..., n]`.
    Identity,
    /// `M * M^T + n * I` for a random `M`, with a random solution.
    Spd,
}

/// A linear system `matrix * solution = rhs` in aligned storage.
pub struct System {
    /// Dimension: `matrix` is `n x n`, `rhs` and `solution` hold `n`.
    pub n: usize,
    pub matrix: AlignedBuf,
    pub rhs: AlignedBuf,
    pub solution: Vec<f64>,
}

impl System {
    /// Generates an `n x n` system of the given kind.
    pub fn generate(kind: SystemKind, n: usize, seed: u64) -> Result<Self> {
        match kind {
            SystemKind::Identity => Self::identity(n),
            SystemKind::Spd => Self::random_spd(n, seed),
        }
    }

    pub fn identity(n: usize) -> Result<Self> {
        let mut matrix = AlignedBuf::zeroed(n * n)?;
        for i in 0..n {
            matrix[i * n + i] = 1.0;
        }
        let solution: Vec<f64> = (1..=n).map(|v| v as f64).collect();
        let rhs = AlignedBuf::from_slice(&solution)?;
        Ok(Self {
            n,
            matrix,
            rhs,
            solution,
        })
    }

    pub fn random_spd(n: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let m: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut matrix = AlignedBuf::zeroed(n * n)?;
        for i in 0..n {
            for j in 0..n {
                let dot: f64 = (0..n).map(|k| m[i * n + k] * m[j * n + k]).sum();
                matrix[i * n + j] = if i == j { dot + n as f64 } else { dot };
            }
        }

        let solution: Vec<f64> = (0..n).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let mut rhs = AlignedBuf::zeroed(n)?;
        for i in 0..n {
            rhs[i] = (0..n).map(|j| matrix[i * n + j] * solution[j]).sum();
        }

        Ok(Self {
            n,
            matrix,
            rhs,
            solution,
        })
    }

    /// Largest absolute difference between `rhs` and the known solution.
    ///
    /// Meaningful once the accelerator has overwritten `rhs` in place.
    pub fn max_error(&self) -> f64 {
        self.rhs
            .iter()
            .zip(&self.solution)
            .map(|(x, e)| (x - e).abs())
            .fold(0.0, f64::max)
    }
}
