//! Vector primitives shared by every layer kind.
//!
//! Everything here is a free function over slices. Allocating helpers return a
//! fresh `Vec<f64>`; the `*_assign` forms write into their first argument.
//!
//! The two orthogonal primitives are the building blocks of the factorized layers:
//!
//! - [`plane_rotate`] rotates the coordinate pair `(row - 1, row)` by an angle.
//! - [`reflect`] applies a Householder reflection `I - 2 c cᵗ` to a trailing window.

#[inline]
fn check_same_len(a: &[f64], b: &[f64]) {
    assert_eq!(
        a.len(),
        b.len(),
        "vector len {} does not match vector len {}",
        a.len(),
        b.len()
    );
}

/// Elementwise `a + b`.
pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    check_same_len(a, b);
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Elementwise `a - b`.
pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    check_same_len(a, b);
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Elementwise (Hadamard) product.
pub fn mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    check_same_len(a, b);
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

pub fn scale(a: &[f64], k: f64) -> Vec<f64> {
    a.iter().map(|x| x * k).collect()
}

pub fn add_assign(a: &mut [f64], b: &[f64]) {
    check_same_len(a, b);
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

pub fn sub_assign(a: &mut [f64], b: &[f64]) {
    check_same_len(a, b);
    for (x, y) in a.iter_mut().zip(b) {
        *x -= y;
    }
}

pub fn mul_assign(a: &mut [f64], b: &[f64]) {
    check_same_len(a, b);
    for (x, y) in a.iter_mut().zip(b) {
        *x *= y;
    }
}

pub fn scale_assign(a: &mut [f64], k: f64) {
    for x in a.iter_mut() {
        *x *= k;
    }
}

/// `a -= step * b`, the update used by every layer.
#[inline]
pub fn axpy_neg(a: &mut [f64], step: f64, b: &[f64]) {
    check_same_len(a, b);
    for (x, &g) in a.iter_mut().zip(b) {
        *x = (-step).mul_add(g, *x);
    }
}

/// Dot product over the common prefix of `a` and `b`.
///
/// Lengths are not checked: a shorter operand silently truncates the sum.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| x.mul_add(*y, acc))
}

#[inline]
pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Sum of squares, used for gradient norm traces.
#[inline]
pub fn squared_norm(a: &[f64]) -> f64 {
    dot(a, a)
}

/// Rescale `a` to unit L2 norm. A zero vector is left untouched.
pub fn normalize(a: &mut [f64]) {
    let n = norm(a);
    if n > 0.0 {
        scale_assign(a, 1.0 / n);
    }
}

/// Rotate the pair `(v[row - 1], v[row])` by `angle`.
///
/// With `a = v[row - 1]` and `b = v[row]` this writes
/// `(a cos θ - b sin θ, a sin θ + b cos θ)`.
#[inline]
pub fn plane_rotate(angle: f64, row: usize, v: &mut [f64]) {
    debug_assert!(
        row > 0 && row < v.len(),
        "rotation row {row} out of range for len {}",
        v.len()
    );
    let (sin, cos) = angle.sin_cos();
    let a = v[row - 1];
    let b = v[row];
    v[row - 1] = a * cos - b * sin;
    v[row] = a * sin + b * cos;
}

/// Inverse of [`plane_rotate`] for the same `angle` and `row`.
#[inline]
pub fn row_reverse_rotate(angle: f64, row: usize, v: &mut [f64]) {
    plane_rotate(-angle, row, v);
}

/// Apply the Householder reflection `I - 2 c cᵗ` to `v[offset..offset + c.len()]`.
///
/// `c` is expected to have unit norm; coordinates outside the window are untouched.
#[inline]
pub fn reflect(c: &[f64], v: &mut [f64], offset: usize) {
    debug_assert!(
        offset + c.len() <= v.len(),
        "reflection window {offset}..{} out of range for len {}",
        offset + c.len(),
        v.len()
    );
    let window = &mut v[offset..offset + c.len()];
    let d = 2.0 * dot(c, window);
    for (x, &ci) in window.iter_mut().zip(c) {
        *x = (-d).mul_add(ci, *x);
    }
}

/// Index of the largest coordinate (first one on ties).
///
/// Returns `None` for an empty slice.
pub fn argmax(a: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &x) in a.iter().enumerate() {
        match best {
            Some((_, b)) if x <= b => {}
            _ => best = Some((i, x)),
        }
    }
    best.map(|(i, _)| i)
}
