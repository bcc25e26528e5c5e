//! Per-descriptor posterior estimates learned online.

use crate::feature_extractor::Descriptor;

/// Positive and negative hit counts for every descriptor value.
///
/// The posterior of a descriptor is refreshed whenever that descriptor is
/// trained, so prediction is a table lookup through `&self`.
#[derive(Debug, Clone)]
pub struct ObjectClassifier {
    positive: Vec<usize>,
    negative: Vec<usize>,
    posterior: Vec<f64>,
    max_positive: usize,
    mask: usize,
}

impl ObjectClassifier {
    /// Classifier over `2^descriptor_width` descriptor values.
    pub fn new(descriptor_width: usize) -> Self {
        let len = 1usize << descriptor_width;
        Self {
            positive: vec![0; len],
            negative: vec![0; len],
            posterior: vec![0.0; len],
            max_positive: 0,
            mask: len - 1,
        }
    }

    /// Number of descriptor values covered.
    pub fn len(&self) -> usize {
        self.positive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty()
    }

    /// `p / (p + n)`; 0 for descriptors never seen as positive.
    #[inline]
    pub fn predict(&self, descriptor: Descriptor) -> f64 {
        self.posterior[descriptor as usize & self.mask]
    }

    /// Returns the descriptor's new positive count.
    pub fn train_positive(&mut self, descriptor: Descriptor) -> usize {
        let i = descriptor as usize & self.mask;
        self.positive[i] += 1;
        self.max_positive = self.max_positive.max(self.positive[i]);
        self.refresh(i);
        self.positive[i]
    }

    /// Returns the descriptor's new negative count.
    pub fn train_negative(&mut self, descriptor: Descriptor) -> usize {
        let i = descriptor as usize & self.mask;
        self.negative[i] += 1;
        self.refresh(i);
        self.negative[i]
    }

    pub fn positive(&self, descriptor: Descriptor) -> usize {
        self.positive[descriptor as usize & self.mask]
    }

    pub fn negative(&self, descriptor: Descriptor) -> usize {
        self.negative[descriptor as usize & self.mask]
    }

    /// Largest positive count over all descriptors.
    pub fn max_positive(&self) -> usize {
        self.max_positive
    }

    pub fn reset(&mut self) {
        self.positive.fill(0);
        self.negative.fill(0);
        self.posterior.fill(0.0);
        self.max_positive = 0;
    }

    fn refresh(&mut self, i: usize) {
        let p = self.positive[i];
        let n = self.negative[i];
        self.posterior[i] = if p == 0 {
            0.0
        } else if n == 0 {
            1.0
        } else {
            p as f64 / (p + n) as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posterior_rules() {
        let mut c = ObjectClassifier::new(11);
        assert_eq!(c.len(), 2048);
        assert_eq!(c.predict(5), 0.0);
        c.train_negative(5);
        assert_eq!(c.predict(5), 0.0);
        c.train_positive(5);
        assert!((c.predict(5) - 0.5).abs() < 1e-12);
        assert_eq!(c.train_positive(7), 1);
        assert_eq!(c.predict(7), 1.0);
    }

    #[test]
    fn test_counts_and_max_positive() {
        let mut c = ObjectClassifier::new(4);
        c.train_positive(1);
        c.train_positive(1);
        c.train_positive(2);
        assert_eq!(c.positive(1), 2);
        assert_eq!(c.max_positive(), 2);
        assert_eq!(c.train_negative(1), 1);
        assert!((c.predict(1) - 2.0 / 3.0).abs() < 1e-12);
        c.reset();
        assert_eq!(c.max_positive(), 0);
        assert_eq!(c.predict(1), 0.0);
    }

    #[test]
    fn test_positive_training_never_decreases_posterior() {
        let mut c = ObjectClassifier::new(6);
        for _ in 0..3 {
            c.train_negative(9);
        }
        let mut last = c.predict(9);
        for _ in 0..20 {
            c.train_positive(9);
            let now = c.predict(9);
            assert!(now >= last);
            last = now;
        }
    }
}
