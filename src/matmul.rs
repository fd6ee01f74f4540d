//! Small matrix-vector kernels used by the dense layer.
//!
//! - default: a simple, safe loop implementation
//! - optional: a faster backend via the `matrixmultiply` feature

/// `y = alpha * A x + beta * y` for a row-major `A` with shape `(m, n)`.
///
/// When `transpose` is set, computes `y = alpha * Aᵗ x + beta * y` instead
/// (`x` has length `m` and `y` has length `n`).
#[allow(clippy::too_many_arguments)]
#[inline]
pub(crate) fn gemv_f64(
    m: usize,
    n: usize,
    alpha: f64,
    a: &[f64],
    transpose: bool,
    x: &[f64],
    beta: f64,
    y: &mut [f64],
) {
    debug_assert_eq!(a.len(), m * n);
    let (rows, cols, rs, cs) = if transpose { (n, m, 1, n) } else { (m, n, n, 1) };
    debug_assert_eq!(x.len(), cols);
    debug_assert_eq!(y.len(), rows);

    if rows == 0 || cols == 0 {
        return;
    }

    #[cfg(feature = "matrixmultiply")]
    {
        // Treat `x` as a (cols, 1) matrix and `y` as a (rows, 1) matrix.
        unsafe {
            matrixmultiply::dgemm(
                rows,
                cols,
                1,
                alpha,
                a.as_ptr(),
                rs as isize,
                cs as isize,
                x.as_ptr(),
                1,
                1,
                beta,
                y.as_mut_ptr(),
                1,
                1,
            );
        }
    }

    #[cfg(not(feature = "matrixmultiply"))]
    for (i, yi) in y.iter_mut().enumerate() {
        let mut acc = 0.0_f64;
        for (p, &xp) in x.iter().enumerate() {
            acc = a[i * rs + p * cs].mul_add(xp, acc);
        }
        *yi = alpha * acc + beta * *yi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemv_plain_and_transposed() {
        // A = [[1, 2, 3], [4, 5, 6]]
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut y = [0.0; 2];
        gemv_f64(2, 3, 1.0, &a, false, &[1.0, 0.0, -1.0], 0.0, &mut y);
        assert_eq!(y, [-2.0, -2.0]);

        let mut yt = [1.0; 3];
        gemv_f64(2, 3, 1.0, &a, true, &[1.0, 1.0], 1.0, &mut yt);
        assert_eq!(yt, [6.0, 8.0, 10.0]);
    }
}
