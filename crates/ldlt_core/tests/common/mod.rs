//! Shared helpers for the integration tests.

#![allow(dead_code)]

use rand::Rng;

/// Largest system the helpers build.
pub const MAX_N: usize = 8;

/// Fills `a` with a random symmetric positive definite `n x n` matrix,
/// `x` with a random solution, and `b` with `a * x`.
pub fn random_spd_system<R: Rng>(rng: &mut R, n: usize, a: &mut [f64], x: &mut [f64], b: &mut [f64]) {
    let mut m = [0.0f64; MAX_N * MAX_N];
    for v in m.iter_mut().take(n * n) {
        *v = rng.gen_range(-1.0..1.0);
    }
    for i in 0..n {
        for j in 0..n {
            let mut s = 0.0;
            for k in 0..n {
                s += m[i * n + k] * m[j * n + k];
            }
            a[i * n + j] = if i == j { s + n as f64 } else { s };
        }
    }
    for v in x.iter_mut().take(n) {
        *v = rng.gen_range(-10.0..10.0);
    }
    for i in 0..n {
        b[i] = (0..n).map(|j| a[i * n + j] * x[j]).sum();
    }
}

pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= tol, "{actual:?} != {expected:?}");
    }
}
