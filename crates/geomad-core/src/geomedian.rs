//! Multivariate geometric median (spatial L1 median).
//!
//! Weiszfeld iteration with the Vardi–Zhang correction: observations that
//! coincide with the current estimate are taken out of the inverse-distance
//! weights and instead pull the update back toward the estimate, so repeated
//! observations never cause a division by zero and the iteration still
//! converges to the true minimizer.
//!
//! Convergence is tested relative to the mean magnitude of the observations,
//! which keeps the result invariant under positive rescaling of the input.

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::GeomadConfig;
use crate::consts::{DEFAULT_EPSILON, DEFAULT_MAX_ITERS};
use crate::error::{GeomadError, Result};
use crate::nodata::PixelSamples;
use crate::sample::Sample;

/// Iteration controls for the solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    /// Maximum number of refinement iterations (default: 1000).
    pub max_iters: usize,
    /// Movement below which the estimate is converged, relative to the mean
    /// norm of the pixel's observations (default: 1e-7).
    pub epsilon: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iters: DEFAULT_MAX_ITERS,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl SolverParams {
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(GeomadError::InvalidConfig(format!(
                "solver epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// How a single pixel's solve ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveOutcome {
    /// No valid observations; the estimate is NaN in every band.
    Missing,
    /// Movement dropped below the tolerance after `iterations` steps.
    Converged { iterations: usize },
    /// The iteration cap was hit; the estimate is the last iterate.
    Unconverged { iterations: usize },
}

impl SolveOutcome {
    pub fn iterations(&self) -> usize {
        match *self {
            Self::Missing => 0,
            Self::Converged { iterations } | Self::Unconverged { iterations } => iterations,
        }
    }
}

/// Worker-local vectors reused across pixels.
#[derive(Clone, Debug, Default)]
pub struct SolverScratch {
    numer: Vec<f64>,
    next: Vec<f64>,
}

impl SolverScratch {
    pub fn new(bands: usize) -> Self {
        Self {
            numer: vec![0.0; bands],
            next: vec![0.0; bands],
        }
    }

    fn reset(&mut self, bands: usize) {
        self.numer.clear();
        self.numer.resize(bands, 0.0);
        self.next.clear();
        self.next.resize(bands, 0.0);
    }
}

#[inline]
pub(crate) fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[inline]
pub(crate) fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Coordinate-wise mean of the samples, written into `out`.
fn mean_into(samples: &PixelSamples, out: &mut [f64]) {
    out.iter_mut().for_each(|v| *v = 0.0);
    for row in samples.rows() {
        for (acc, &x) in out.iter_mut().zip(row) {
            *acc += x;
        }
    }
    let n = samples.len() as f64;
    out.iter_mut().for_each(|v| *v /= n);
}

/// Solve for the geometric median of `samples`, writing it into `estimate`.
///
/// `estimate` must have one slot per band.
pub fn solve(
    samples: &PixelSamples,
    params: &SolverParams,
    estimate: &mut [f64],
    scratch: &mut SolverScratch,
) -> SolveOutcome {
    let bands = estimate.len();
    debug_assert_eq!(bands, samples.bands());

    match samples.len() {
        0 => {
            estimate.fill(f64::NAN);
            return SolveOutcome::Missing;
        }
        1 => {
            estimate.copy_from_slice(samples.row(0));
            return SolveOutcome::Converged { iterations: 0 };
        }
        _ => {}
    }

    scratch.reset(bands);
    mean_into(samples, estimate);

    // Typical magnitude of the observations. Both tolerances scale with it,
    // so a median sitting at the origin still converges.
    let magnitude = samples.rows().map(norm).sum::<f64>() / samples.len() as f64;
    let coincident_radius = f64::EPSILON * magnitude;
    let tolerance = params.epsilon * magnitude;

    for iteration in 1..=params.max_iters {
        scratch.numer.fill(0.0);
        let mut inv_dist_sum = 0.0f64;
        let mut coincident = 0usize;

        for row in samples.rows() {
            let dist = distance(row, estimate);
            if dist <= coincident_radius {
                coincident += 1;
                continue;
            }
            let w = 1.0 / dist;
            inv_dist_sum += w;
            for (acc, &x) in scratch.numer.iter_mut().zip(row) {
                *acc += w * x;
            }
        }

        // Every observation sits on the estimate.
        if inv_dist_sum == 0.0 {
            return SolveOutcome::Converged { iterations: iteration };
        }

        if coincident == 0 {
            for (next, &num) in scratch.next.iter_mut().zip(&scratch.numer) {
                *next = num / inv_dist_sum;
            }
        } else {
            // R = sum w_i (x_i - y) = numer - y * sum w_i
            let r = scratch
                .numer
                .iter()
                .zip(estimate.iter())
                .map(|(&num, &y)| {
                    let d = num - y * inv_dist_sum;
                    d * d
                })
                .sum::<f64>()
                .sqrt();
            let eta = coincident as f64;
            if r <= eta {
                // The coincident observations outweigh the pull of the rest:
                // the estimate is the median.
                return SolveOutcome::Converged { iterations: iteration };
            }
            let gamma = eta / r;
            for ((next, &num), &y) in scratch
                .next
                .iter_mut()
                .zip(&scratch.numer)
                .zip(estimate.iter())
            {
                *next = (1.0 - gamma) * (num / inv_dist_sum) + gamma * y;
            }
        }

        let change = distance(&scratch.next, estimate);
        estimate.copy_from_slice(&scratch.next);

        if change <= tolerance {
            return SolveOutcome::Converged { iterations: iteration };
        }
    }

    SolveOutcome::Unconverged {
        iterations: params.max_iters,
    }
}

/// Geometric median of one pixel's observations, shape `[band, time]`.
///
/// Returns NaN in every band when no time sample is fully valid.
pub fn geometric_median_vector<T: Sample>(
    vectors: ArrayView2<T>,
    nodata: Option<T>,
    config: &GeomadConfig,
) -> Result<Array1<f64>> {
    config.validate()?;
    let (bands, time_steps) = vectors.dim();
    if bands == 0 {
        return Err(GeomadError::EmptyBands);
    }

    let mut samples = PixelSamples::with_capacity(bands, time_steps);
    samples.gather(vectors, nodata, &config.scaling);

    let mut estimate = vec![0.0; bands];
    let mut scratch = SolverScratch::new(bands);
    solve(&samples, &config.solver, &mut estimate, &mut scratch);

    Ok(Array1::from(estimate))
}
