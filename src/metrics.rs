//! Evaluation summaries.
//!
//! Metrics do not take part in training; they only read predictions.

use std::fmt;

use crate::{Dataset, Loss, Network, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
/// Loss and argmax accuracy on a train/test split.
pub struct ClassificationReport {
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub test_loss: f64,
    pub test_accuracy: f64,
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "train loss:     {:.6}", self.train_loss)?;
        writeln!(f, "train accuracy: {:.4}", self.train_accuracy)?;
        writeln!(f, "test loss:      {:.6}", self.test_loss)?;
        write!(f, "test accuracy:  {:.4}", self.test_accuracy)
    }
}

impl Network {
    /// Evaluate `loss` and accuracy on both splits.
    pub fn classification_report(
        &self,
        train: &Dataset,
        test: &Dataset,
        loss: Loss,
    ) -> Result<ClassificationReport> {
        Ok(ClassificationReport {
            train_loss: self.loss(train, loss)?,
            train_accuracy: self.accuracy(train)?,
            test_loss: self.loss(test, loss)?,
            test_accuracy: self.accuracy(test)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, DenseLayer, Error};

    fn identity_net() -> Network {
        let layer = DenseLayer::new(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 2, 2).unwrap();
        Network::new(layer, Activation::Identity).unwrap()
    }

    #[test]
    fn report_covers_both_splits() {
        let net = identity_net();
        let train = Dataset::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();
        let test = Dataset::from_rows(&[vec![1.0, 0.0]], &[vec![0.0, 1.0]]).unwrap();

        let report = net.classification_report(&train, &test, Loss::Euclid).unwrap();
        assert_eq!(report.train_loss, 0.0);
        assert_eq!(report.train_accuracy, 1.0);
        assert_eq!(report.test_loss, 2.0);
        assert_eq!(report.test_accuracy, 0.0);

        let text = report.to_string();
        assert!(text.contains("train accuracy: 1.0000"));
        assert!(text.contains("test loss:      2.000000"));
    }

    #[test]
    fn report_fails_on_empty_split() {
        let net = identity_net();
        let train = Dataset::from_rows(&[vec![1.0, 0.0]], &[vec![1.0, 0.0]]).unwrap();
        let empty = Dataset::empty(2, 2).unwrap();
        assert!(matches!(
            net.classification_report(&train, &empty, Loss::Euclid),
            Err(Error::InvalidData(_))
        ));
    }
}
