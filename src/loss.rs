//! Loss functions.
//!
//! A loss compares a network prediction with a target and provides the gradient
//! `dL/d(pred)` that seeds the backward pass.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Supported loss functions.
pub enum Loss {
    /// Squared Euclidean distance `‖pred - target‖²`.
    #[default]
    Euclid,
    /// Manhattan distance `Σ |pred - target|`.
    Manhattan,
}

impl Loss {
    /// Loss value for one sample.
    ///
    /// Shape contract: `pred.len() == target.len()`.
    #[inline]
    pub fn value(self, pred: &[f64], target: &[f64]) -> f64 {
        check_shapes(pred, target);
        match self {
            Loss::Euclid => pred
                .iter()
                .zip(target)
                .fold(0.0, |acc, (p, t)| (p - t).mul_add(p - t, acc)),
            Loss::Manhattan => pred.iter().zip(target).map(|(p, t)| (p - t).abs()).sum(),
        }
    }

    /// Gradient w.r.t. `pred`.
    ///
    /// The Manhattan subgradient is `+1` where `pred > target` and `-1` otherwise.
    #[inline]
    pub fn gradient(self, pred: &[f64], target: &[f64]) -> Vec<f64> {
        check_shapes(pred, target);
        match self {
            Loss::Euclid => pred.iter().zip(target).map(|(p, t)| 2.0 * (p - t)).collect(),
            Loss::Manhattan => pred
                .iter()
                .zip(target)
                .map(|(p, t)| if p > t { 1.0 } else { -1.0 })
                .collect(),
        }
    }
}

#[inline]
fn check_shapes(pred: &[f64], target: &[f64]) {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclid_value_and_gradient() {
        let p = [1.0, 2.0, 3.0];
        let t = [0.0, 2.0, 5.0];
        assert_eq!(Loss::Euclid.value(&p, &t), 5.0);
        assert_eq!(Loss::Euclid.gradient(&p, &t), vec![2.0, 0.0, -4.0]);
    }

    #[test]
    fn manhattan_value_and_gradient() {
        let p = [1.0, 2.0, 3.0];
        let t = [0.0, 2.0, 5.0];
        assert_eq!(Loss::Manhattan.value(&p, &t), 3.0);
        assert_eq!(Loss::Manhattan.gradient(&p, &t), vec![1.0, -1.0, -1.0]);
    }

    #[test]
    fn euclid_gradient_matches_finite_differences() {
        let p = [0.3, -1.2];
        let t = [1.0, 0.5];
        let g = Loss::Euclid.gradient(&p, &t);
        let eps = 1e-6;
        for i in 0..p.len() {
            let mut hi = p;
            hi[i] += eps;
            let mut lo = p;
            lo[i] -= eps;
            let numeric = (Loss::Euclid.value(&hi, &t) - Loss::Euclid.value(&lo, &t)) / (2.0 * eps);
            assert!((numeric - g[i]).abs() < 1e-6);
        }
    }

    #[test]
    #[should_panic]
    fn rejects_mismatched_shapes() {
        Loss::Euclid.value(&[1.0], &[1.0, 2.0]);
    }
}
