//! In-place LDLT factorization and solve.
//!
//! Factors a symmetric row-major matrix as `A = L * D * L^T`, reading only
//! the lower triangle and overwriting it with the unit-lower factor `L`
//! (below the diagonal) and `D` (on the diagonal). The upper triangle is
//! left untouched. Indefinite matrices are fine as long as no pivot is zero.

/// Failure modes of the reference kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The matrix is not square.
    NotSquare { rows: usize, cols: usize },

    /// A diagonal pivot is zero or not finite.
    ZeroPivot { column: usize },
}

/// Factors the leading `n x n` block of `a` in place.
pub fn factor_in_place(a: &mut [f64], n: usize) -> Result<(), KernelError> {
    for j in 0..n {
        let mut d = a[j * n + j];
        for k in 0..j {
            let l = a[j * n + k];
            d -= l * l * a[k * n + k];
        }
        if d == 0.0 || !d.is_finite() {
            return Err(KernelError::ZeroPivot { column: j });
        }
        a[j * n + j] = d;

        for i in j + 1..n {
            let mut v = a[i * n + j];
            for k in 0..j {
                v -= a[i * n + k] * a[j * n + k] * a[k * n + k];
            }
            a[i * n + j] = v / d;
        }
    }
    Ok(())
}

/// Solves `L * D * L^T * x = b` in place using factors from
/// `factor_in_place`.
pub fn solve_factored(a: &[f64], b: &mut [f64], n: usize) {
    for i in 0..n {
        let mut v = b[i];
        for k in 0..i {
            v -= a[i * n + k] * b[k];
        }
        b[i] = v;
    }
    for i in 0..n {
        b[i] /= a[i * n + i];
    }
    for i in (0..n).rev() {
        let mut v = b[i];
        for k in i + 1..n {
            v -= a[k * n + i] * b[k];
        }
        b[i] = v;
    }
}

/// Factors `a` and overwrites `b` with the solution of `a * x = b`.
pub fn solve_in_place(
    a: &mut [f64],
    b: &mut [f64],
    rows: usize,
    cols: usize,
) -> Result<(), KernelError> {
    if rows != cols {
        return Err(KernelError::NotSquare { rows, cols });
    }
    factor_in_place(a, rows)?;
    solve_factored(a, b, rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn identity_leaves_vector_unchanged() {
        let mut a = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let mut b = [5.0, -1.0, 2.5];
        solve_in_place(&mut a, &mut b, 3, 3).unwrap();
        assert_eq!(b, [5.0, -1.0, 2.5]);
    }

    #[test]
    fn positive_definite_two_by_two() {
        let mut a = [4.0, 2.0, 2.0, 3.0];
        let mut b = [2.0, 1.0];
        solve_in_place(&mut a, &mut b, 2, 2).unwrap();
        assert_close(&b, &[0.5, 0.0]);
        // D on the diagonal, L below, upper triangle untouched.
        assert_close(&a, &[4.0, 2.0, 0.5, 2.0]);
    }

    #[test]
    fn indefinite_matrix_is_supported() {
        let mut a = [1.0, 2.0, 2.0, 1.0];
        let mut b = [3.0, 3.0];
        solve_in_place(&mut a, &mut b, 2, 2).unwrap();
        assert_close(&b, &[1.0, 1.0]);
        assert_close(&[a[3]], &[-3.0]);
    }

    #[test]
    fn three_by_three_matches_known_solution() {
        // A = [[4, 12, -16], [12, 37, -43], [-16, -43, 98]], x = [1, 2, 3]
        let mut a = [4.0, 12.0, -16.0, 12.0, 37.0, -43.0, -16.0, -43.0, 98.0];
        let mut b = [-20.0, -43.0, 192.0];
        solve_in_place(&mut a, &mut b, 3, 3).unwrap();
        assert_close(&b, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn zero_pivot_is_reported() {
        let mut a = [0.0, 1.0, 1.0, 0.0];
        let mut b = [1.0, 1.0];
        assert_eq!(
            solve_in_place(&mut a, &mut b, 2, 2),
            Err(KernelError::ZeroPivot { column: 0 })
        );
    }

    #[test]
    fn rectangular_matrix_is_rejected() {
        let mut a = [0.0; 6];
        let mut b = [0.0; 2];
        assert_eq!(
            solve_in_place(&mut a, &mut b, 2, 3),
            Err(KernelError::NotSquare { rows: 2, cols: 3 })
        );
    }
}
