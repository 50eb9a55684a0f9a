//! Quantile binning of dense feature matrices.
//!
//! Every feature gets at most `max_bin` bins. A bin is described by its
//! inclusive upper bound; the last bound is `+inf` so every finite value
//! lands somewhere. Bins are stored column-major as `u8`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    /// Per feature, ascending upper bounds; the last one is always infinite.
    pub(crate) upper_bounds: Vec<Vec<f32>>,
}

impl BinMapper {
    /// Choose bin boundaries from the distinct values of each column.
    pub fn fit(features: &[Vec<f32>], num_features: usize, max_bin: usize) -> Self {
        let max_bin = max_bin.clamp(2, 256);
        let mut upper_bounds = Vec::with_capacity(num_features);

        for f in 0..num_features {
            let mut values: Vec<f32> = features
                .iter()
                .map(|row| row[f])
                .filter(|v| v.is_finite())
                .collect();
            values.sort_by(f32::total_cmp);
            values.dedup();
            upper_bounds.push(bounds_for(&values, max_bin));
        }

        Self { upper_bounds }
    }

    pub fn num_features(&self) -> usize {
        self.upper_bounds.len()
    }

    pub fn num_bins(&self, feature: usize) -> usize {
        self.upper_bounds[feature].len()
    }

    /// Bin index of `value` for `feature`. NaN goes to the last bin.
    pub fn bin(&self, feature: usize, value: f32) -> u8 {
        let bounds = &self.upper_bounds[feature];
        if value.is_nan() {
            return (bounds.len() - 1) as u8;
        }
        bounds.partition_point(|&b| b < value).min(bounds.len() - 1) as u8
    }

    /// Raw threshold for a split that sends bins `<= bin` left.
    pub fn threshold(&self, feature: usize, bin: u8) -> f32 {
        self.upper_bounds[feature][bin as usize]
    }

    /// Bin a row-major matrix into column-major storage.
    pub fn transform(&self, features: &[Vec<f32>]) -> Vec<Vec<u8>> {
        (0..self.num_features())
            .map(|f| features.iter().map(|row| self.bin(f, row[f])).collect())
            .collect()
    }
}

/// Upper bounds splitting `sorted` (distinct, ascending) into at most `max_bin` bins.
fn bounds_for(sorted: &[f32], max_bin: usize) -> Vec<f32> {
    if sorted.len() <= 1 {
        return vec![f32::INFINITY];
    }

    let mut bounds = Vec::new();
    if sorted.len() <= max_bin {
        // One bin per distinct value; boundaries at midpoints.
        for pair in sorted.windows(2) {
            bounds.push(midpoint(pair[0], pair[1]));
        }
    } else {
        let n = sorted.len();
        for i in 1..max_bin {
            let idx = i * n / max_bin;
            let b = midpoint(sorted[idx - 1], sorted[idx]);
            if bounds.last().is_none_or(|&last| b > last) {
                bounds.push(b);
            }
        }
    }
    bounds.push(f32::INFINITY);
    bounds
}

fn midpoint(a: f32, b: f32) -> f32 {
    let m = a + (b - a) / 2.0;
    // Guard against rounding onto `b` for adjacent floats.
    if m >= b { a } else { m }
}
