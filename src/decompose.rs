//! Dense matrix to factorized parameter conversion.
//!
//! Both decompositions start from a thin SVD `W = U Σ Vᵗ` (computed with `nalgebra`)
//! and then reduce each orthonormal factor column by column until it becomes a
//! signed identity:
//!
//! - [`decompose_to_rotations`] zeroes sub-diagonal entries bottom-up with plane
//!   rotations and records one angle per eliminated entry.
//! - [`decompose_to_reflections`] maps each column onto a signed basis vector with
//!   a Householder reflection and records the unit reflection vector.
//!
//! The residual signs of the reduced factors are folded into `sigma`, so recomposing
//! the parameters reproduces `W` exactly up to rounding.
//!
//! Dense matrices are row-major with shape `(rows, cols)`. For a layer, `rows` is the
//! output size and `cols` is the input size plus one bias column (stored last).

use std::ops::Range;

use nalgebra::DMatrix;

use crate::reflection::ReflectionLayer;
use crate::rotation::RotationLayer;
use crate::vector::{normalize, plane_rotate, reflect};
use crate::{Error, Result};

/// Rotation parameterization of a dense `(rows, cols)` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationFactors {
    pub rows: usize,
    pub cols: usize,
    /// Angles of the output-side factor, in elimination order.
    pub alpha: Vec<f64>,
    pub sigma: Vec<f64>,
    /// Angles of the input-side factor, in elimination order.
    pub beta: Vec<f64>,
}

impl RotationFactors {
    /// Rebuild the dense row-major matrix described by these factors.
    pub fn recompose(&self) -> Result<Vec<f64>> {
        if self.cols == 0 {
            return Err(Error::InvalidShape(
                "rotation factors need a bias column".to_owned(),
            ));
        }
        let layer = RotationLayer::from_parts(
            self.cols - 1,
            self.rows,
            self.alpha.clone(),
            self.sigma.clone(),
            self.beta.clone(),
        )?;
        Ok(layer.to_dense())
    }
}

/// Number of plane rotations needed to reduce a `(size, k)` orthonormal factor.
#[inline]
pub fn rotation_count(size: usize, k: usize) -> usize {
    k * k.saturating_sub(1) / 2 + k * (size - k)
}

/// Row index of every rotation of a `(size, k)` factor, in elimination order.
///
/// Column `c` is reduced by rotations on rows `size - 1` down to `c + 1`.
pub fn rotation_rows(size: usize, k: usize) -> Vec<usize> {
    let mut rows = Vec::with_capacity(rotation_count(size, k));
    for c in 0..k {
        rows.extend(((c + 1)..size).rev());
    }
    rows
}

/// Total length of the flat reflection parameter buffer for a `(rows, cols)` matrix.
pub fn reflection_param_count(rows: usize, cols: usize) -> usize {
    let k = rows.min(cols);
    let side = |size: usize| (0..k).map(|c| size - c).sum::<usize>();
    side(rows) + k + side(cols)
}

/// Index ranges of the pieces of a flat reflection parameter buffer.
///
/// Layout: `[u_0, .., u_{k-1}, sigma, v_0, .., v_{k-1}]` where `u_c` has length
/// `rows - c` and `v_c` has length `cols - c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionLayout {
    pub u: Vec<Range<usize>>,
    pub sigma: Range<usize>,
    pub v: Vec<Range<usize>>,
}

impl ReflectionLayout {
    pub fn new(rows: usize, cols: usize) -> Self {
        let k = rows.min(cols);
        let mut offset = 0;
        let mut take = |len: usize| {
            let r = offset..offset + len;
            offset += len;
            r
        };
        let u = (0..k).map(|c| take(rows - c)).collect();
        let sigma = take(k);
        let v = (0..k).map(|c| take(cols - c)).collect();
        Self { u, sigma, v }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.v.last().map_or(self.sigma.end, |r| r.end)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decompose a dense row-major `(rows, cols)` matrix into rotation factors.
pub fn decompose_to_rotations(weights: &[f64], rows: usize, cols: usize) -> Result<RotationFactors> {
    let (u, s, v) = thin_svd(weights, rows, cols)?;

    let (alpha, sign_u) = reduce_with_rotations(u);
    let (beta, sign_v) = reduce_with_rotations(v);
    let sigma = fold_signs(&s, &sign_u, &sign_v);

    Ok(RotationFactors {
        rows,
        cols,
        alpha,
        sigma,
        beta,
    })
}

/// Decompose a dense row-major `(rows, cols)` matrix into a flat reflection buffer
/// laid out as described by [`ReflectionLayout`].
pub fn decompose_to_reflections(weights: &[f64], rows: usize, cols: usize) -> Result<Vec<f64>> {
    let (u, s, v) = thin_svd(weights, rows, cols)?;

    let (us, sign_u) = reduce_with_reflections(u);
    let (vs, sign_v) = reduce_with_reflections(v);
    let sigma = fold_signs(&s, &sign_u, &sign_v);

    let mut params = Vec::with_capacity(reflection_param_count(rows, cols));
    for c in us {
        params.extend(c);
    }
    params.extend(sigma);
    for c in vs {
        params.extend(c);
    }
    Ok(params)
}

/// Rebuild the dense row-major matrix from a flat reflection buffer.
pub fn recompose_reflections(params: &[f64], rows: usize, cols: usize) -> Result<Vec<f64>> {
    if cols == 0 {
        return Err(Error::InvalidShape(
            "reflection parameters need a bias column".to_owned(),
        ));
    }
    let layer = ReflectionLayer::from_parts(cols - 1, rows, params.to_vec())?;
    Ok(layer.to_dense())
}

fn validate_dense(weights: &[f64], rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidShape(format!(
            "matrix dims must be > 0, got rows={rows} cols={cols}"
        )));
    }
    let expected = rows
        .checked_mul(cols)
        .ok_or_else(|| Error::InvalidShape("matrix shape overflow".to_owned()))?;
    if weights.len() != expected {
        return Err(Error::InvalidShape(format!(
            "weights length {} does not match rows * cols ({rows} * {cols})",
            weights.len()
        )));
    }
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(Error::InvalidData(
            "weights must contain only finite values".to_owned(),
        ));
    }
    Ok(())
}

/// Thin SVD with a canonical sign per singular pair: the largest-magnitude entry of
/// every left singular vector is made positive.
///
/// Returns `(U, s, V)` with `U: (rows, k)`, `V: (cols, k)`, `k = min(rows, cols)`.
fn thin_svd(
    weights: &[f64],
    rows: usize,
    cols: usize,
) -> Result<(DMatrix<f64>, Vec<f64>, DMatrix<f64>)> {
    validate_dense(weights, rows, cols)?;

    let w = DMatrix::from_row_slice(rows, cols, weights);
    let svd = w.svd(true, true);
    let mut u = svd
        .u
        .ok_or_else(|| Error::InvalidData("svd did not produce U".to_owned()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::InvalidData("svd did not produce Vᵗ".to_owned()))?;
    let mut v = v_t.transpose();
    let s: Vec<f64> = svd.singular_values.iter().copied().collect();

    for i in 0..s.len() {
        let col = u.column(i);
        let pivot = col
            .iter()
            .copied()
            .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
        if pivot < 0.0 {
            u.column_mut(i).neg_mut();
            v.column_mut(i).neg_mut();
        }
    }

    Ok((u, s, v))
}

fn fold_signs(s: &[f64], sign_u: &[f64], sign_v: &[f64]) -> Vec<f64> {
    s.iter()
        .zip(sign_u)
        .zip(sign_v)
        .map(|((s, a), b)| s * a * b)
        .collect()
}

/// Reduce an orthonormal `(size, k)` factor to a signed identity with plane rotations.
///
/// Returns the angles in elimination order and the diagonal sign left on each column.
fn reduce_with_rotations(mut q: DMatrix<f64>) -> (Vec<f64>, Vec<f64>) {
    let (size, k) = q.shape();
    let mut angles = Vec::with_capacity(rotation_count(size, k));
    let mut signs = Vec::with_capacity(k);
    let mut pair = [0.0; 2];

    for c in 0..k {
        for row in ((c + 1)..size).rev() {
            let a = q[(row - 1, c)];
            let b = q[(row, c)];
            let theta = (-b).atan2(a);
            for j in c..k {
                pair[0] = q[(row - 1, j)];
                pair[1] = q[(row, j)];
                plane_rotate(theta, 1, &mut pair);
                q[(row - 1, j)] = pair[0];
                q[(row, j)] = pair[1];
            }
            angles.push(theta);
        }
        signs.push(if q[(c, c)] < 0.0 { -1.0 } else { 1.0 });
    }

    (angles, signs)
}

/// Reduce an orthonormal `(size, k)` factor to a signed identity with reflections.
///
/// Reflection `c` acts on rows `c..size` and maps column `c` onto `±e_c`.
fn reduce_with_reflections(mut q: DMatrix<f64>) -> (Vec<Vec<f64>>, Vec<f64>) {
    let (size, k) = q.shape();
    let mut vectors = Vec::with_capacity(k);
    let mut signs = Vec::with_capacity(k);
    let mut col = vec![0.0; size];

    for c in 0..k {
        let mut h: Vec<f64> = (c..size).map(|r| q[(r, c)]).collect();
        let sign = if h[0] >= 0.0 { -1.0 } else { 1.0 };
        h[0] -= sign;
        normalize(&mut h);

        for j in c..k {
            for r in 0..size {
                col[r] = q[(r, j)];
            }
            reflect(&h, &mut col, c);
            for r in c..size {
                q[(r, j)] = col[r];
            }
        }

        vectors.push(h);
        signs.push(sign);
    }

    (vectors, signs)
}
