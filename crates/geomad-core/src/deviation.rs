//! Spread of a pixel's observations around its geometric median.
//!
//! Each statistic maps every valid observation to a distance from the median
//! and then reduces those distances with an [`Aggregate`]:
//!
//! - **EMAD**: Euclidean distance.
//! - **SMAD**: cosine distance, `1 - cos(angle)`, insensitive to brightness.
//! - **BCMAD**: Bray-Curtis dissimilarity, `sum|x - m| / sum|x + m|`.
//!
//! Undefined per-observation distances (zero-length vectors, zero
//! denominators) are dropped before aggregation.

use serde::{Deserialize, Serialize};

use crate::geomedian::{distance, norm};
use crate::nodata::PixelSamples;

/// Distance notion used by a deviation statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Deviation {
    Euclidean,
    Cosine,
    BrayCurtis,
}

impl Deviation {
    /// All statistics, in output order.
    pub const ALL: [Deviation; 3] = [Self::Euclidean, Self::Cosine, Self::BrayCurtis];

    /// Distance between one observation and the median.
    #[inline]
    pub fn distance(&self, sample: &[f64], median: &[f64]) -> f64 {
        match self {
            Self::Euclidean => distance(sample, median),
            Self::Cosine => {
                let dot: f64 = sample.iter().zip(median).map(|(x, m)| x * m).sum();
                1.0 - dot / (norm(sample) * norm(median))
            }
            Self::BrayCurtis => {
                let mut diff = 0.0;
                let mut total = 0.0;
                for (x, m) in sample.iter().zip(median) {
                    diff += (x - m).abs();
                    total += (x + m).abs();
                }
                diff / total
            }
        }
    }
}

impl std::fmt::Display for Deviation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Euclidean => write!(f, "EMAD"),
            Self::Cosine => write!(f, "SMAD"),
            Self::BrayCurtis => write!(f, "BCMAD"),
        }
    }
}

/// How per-observation distances are reduced to one value per pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    #[default]
    Median,
    Mean,
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "Median"),
            Self::Mean => write!(f, "Mean"),
        }
    }
}

impl Aggregate {
    /// Reduce `values`, ignoring NaN. Returns NaN if nothing remains.
    ///
    /// The slice is reordered.
    pub fn reduce(&self, values: &mut [f64]) -> f64 {
        let n = partition_finite(values);
        if n == 0 {
            return f64::NAN;
        }
        let values = &mut values[..n];
        match self {
            Self::Median => compute_median(values),
            Self::Mean => values.iter().sum::<f64>() / n as f64,
        }
    }
}

/// Move non-NaN values to the front, returning how many there are.
fn partition_finite(values: &mut [f64]) -> usize {
    let mut n = 0;
    for i in 0..values.len() {
        if !values[i].is_nan() {
            values.swap(n, i);
            n += 1;
        }
    }
    n
}

fn compute_median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Aggregated deviation of `samples` from `median`.
///
/// NaN if there are no samples or any band of the median is NaN. `scratch`
/// holds the per-observation distances and is reused across calls.
pub fn deviation(
    kind: Deviation,
    samples: &PixelSamples,
    median: &[f64],
    aggregate: Aggregate,
    scratch: &mut Vec<f64>,
) -> f64 {
    if samples.is_empty() || median.iter().any(|m| m.is_nan()) {
        return f64::NAN;
    }

    scratch.clear();
    scratch.extend(samples.rows().map(|row| kind.distance(row, median)));
    aggregate.reduce(scratch)
}
