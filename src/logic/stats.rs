//! Statistics Helpers
//!
//! Population statistics and Shannon entropy used by the threat scorer.

use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of one feature.
///
/// `std_dev` is never zero: a degenerate population is clamped to 1 so that
/// every member gets a z-score of 0 instead of a division by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std_dev: f64,
    pub samples: usize,
}

impl Default for FeatureStats {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std_dev: 1.0,
            samples: 0,
        }
    }
}

impl FeatureStats {
    /// Compute stats over every finite value yielded by `values`.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let vals: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if vals.is_empty() {
            return Self::default();
        }

        let n = vals.len() as f64;
        let mean = vals.iter().sum::<f64>() / n;
        let variance = vals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        Self {
            mean,
            std_dev: if std_dev > 0.0 { std_dev } else { 1.0 },
            samples: vals.len(),
        }
    }

    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }
}

/// Shannon entropy (base 2) over the byte-frequency distribution of `text`.
pub fn shannon_entropy(text: &str) -> f64 {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }

    let len = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}
