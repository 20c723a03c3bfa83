//! Cube-level entry points: fan the per-pixel solver and reducers out over the
//! (row, column) grid.
//!
//! Outputs are allocated up front and split by image row; each row task owns
//! its output row and its own scratch buffers, so pixels never share mutable
//! state and the result does not depend on how rows are scheduled.

use std::ops::Add;

use ndarray::{
    s, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, ArrayView4, ArrayViewD, ArrayViewMut,
    Axis, Ix3, Ix4, RemoveAxis,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::GeomadConfig;
use crate::consts::{DEVIATION_COUNT, PARALLEL_PIXEL_THRESHOLD};
use crate::deviation::{deviation, Deviation};
use crate::error::{GeomadError, Result};
use crate::geomedian::{solve, SolveOutcome, SolverScratch};
use crate::nodata::{PixelSamples, Scaling};
use crate::sample::Sample;

/// Counts gathered while processing a cube.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolveSummary {
    /// Pixels visited.
    pub pixels: usize,
    /// Pixels whose outputs are missing (no valid samples, or no median).
    pub missing: usize,
    /// Pixels whose solve hit the iteration cap.
    pub unconverged: usize,
    /// Solver iterations summed over all pixels.
    pub iterations: usize,
}

impl SolveSummary {
    fn record(&mut self, outcome: SolveOutcome) {
        self.pixels += 1;
        self.iterations += outcome.iterations();
        match outcome {
            SolveOutcome::Missing => self.missing += 1,
            SolveOutcome::Unconverged { .. } => self.unconverged += 1,
            SolveOutcome::Converged { .. } => {}
        }
    }

    fn record_deviation(&mut self, value: f64) {
        self.pixels += 1;
        if value.is_nan() {
            self.missing += 1;
        }
    }
}

impl Add for SolveSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            pixels: self.pixels + other.pixels,
            missing: self.missing + other.missing,
            unconverged: self.unconverged + other.unconverged,
            iterations: self.iterations + other.iterations,
        }
    }
}

/// Geometric median composite together with its deviation planes.
#[derive(Clone, Debug)]
pub struct Geomad {
    /// Shape `(rows, cols, bands)`.
    pub median: Array3<f64>,
    /// Shape `(rows, cols)`.
    pub emad: Array2<f64>,
    pub smad: Array2<f64>,
    pub bcmad: Array2<f64>,
    pub summary: SolveSummary,
}

impl Geomad {
    pub fn deviation(&self, kind: Deviation) -> &Array2<f64> {
        match kind {
            Deviation::Euclidean => &self.emad,
            Deviation::Cosine => &self.smad,
            Deviation::BrayCurtis => &self.bcmad,
        }
    }
}

/// Scratch state owned by one row task.
struct PixelWorker<'a, T: Sample> {
    nodata: Option<T>,
    config: &'a GeomadConfig,
    samples: PixelSamples,
    solver: SolverScratch,
    estimate: Vec<f64>,
    distances: Vec<f64>,
}

impl<'a, T: Sample> PixelWorker<'a, T> {
    fn new(bands: usize, time_steps: usize, nodata: Option<T>, config: &'a GeomadConfig) -> Self {
        Self {
            nodata,
            config,
            samples: PixelSamples::with_capacity(bands, time_steps),
            solver: SolverScratch::new(bands),
            estimate: vec![0.0; bands],
            distances: Vec::with_capacity(time_steps),
        }
    }

    fn load(&mut self, pixel: ArrayView2<T>) {
        self.samples.gather(pixel, self.nodata, &self.config.scaling);
    }

    fn solve(&mut self) -> SolveOutcome {
        solve(
            &self.samples,
            &self.config.solver,
            &mut self.estimate,
            &mut self.solver,
        )
    }

    /// Use a caller-supplied median instead of solving for one.
    fn set_median(&mut self, median: ArrayView1<f64>) {
        for (dst, &m) in self.estimate.iter_mut().zip(median.iter()) {
            *dst = m;
        }
    }

    fn deviation(&mut self, kind: Deviation) -> f64 {
        deviation(
            kind,
            &self.samples,
            &self.estimate,
            self.config.aggregate,
            &mut self.distances,
        )
    }
}

/// Run `op` on a dedicated pool of `num_threads` workers, or on the global
/// pool when `None`.
fn run_in_pool<R, F>(num_threads: Option<usize>, op: F) -> Result<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match num_threads {
        None => Ok(op()),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            Ok(pool.install(op))
        }
    }
}

/// Call `process_row(row, output_row, cube_row)` for every image row.
///
/// Parallelizes at the row level for grids >= `PARALLEL_PIXEL_THRESHOLD`
/// pixels.
fn dispatch_rows<T, D, F>(
    mut output: ArrayViewMut<'_, f64, D>,
    cube: ArrayView4<'_, T>,
    num_threads: Option<usize>,
    process_row: F,
) -> Result<SolveSummary>
where
    T: Sample,
    D: RemoveAxis,
    F: Fn(usize, ArrayViewMut<'_, f64, D::Smaller>, ArrayView3<'_, T>) -> SolveSummary + Sync,
{
    let (rows, cols, _, _) = cube.dim();

    if rows * cols < PARALLEL_PIXEL_THRESHOLD {
        let summary = output
            .axis_iter_mut(Axis(0))
            .zip(cube.axis_iter(Axis(0)))
            .enumerate()
            .map(|(row, (out_row, cube_row))| process_row(row, out_row, cube_row))
            .fold(SolveSummary::default(), |a, b| a + b);
        return Ok(summary);
    }

    run_in_pool(num_threads, || {
        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(cube.axis_iter(Axis(0)))
            .enumerate()
            .map(|(row, (out_row, cube_row))| process_row(row, out_row, cube_row))
            .reduce(SolveSummary::default, |a, b| a + b)
    })
}

/// Returns `(rows, cols, bands, time_steps)`.
fn check_cube<T>(cube: &ArrayView4<T>) -> Result<(usize, usize, usize, usize)> {
    let dim = cube.dim();
    if dim.2 == 0 {
        return Err(GeomadError::EmptyBands);
    }
    Ok(dim)
}

fn check_median(median: &ArrayView3<f64>, rows: usize, cols: usize, bands: usize) -> Result<()> {
    if median.dim() != (rows, cols, bands) {
        return Err(GeomadError::ShapeMismatch {
            expected: vec![rows, cols, bands],
            actual: median.shape().to_vec(),
        });
    }
    Ok(())
}

fn log_summary(what: &str, summary: &SolveSummary, config: &GeomadConfig) {
    debug!(
        pixels = summary.pixels,
        missing = summary.missing,
        iterations = summary.iterations,
        "{what} complete"
    );
    if summary.unconverged > 0 {
        warn!(
            unconverged = summary.unconverged,
            max_iters = config.solver.max_iters,
            "Pixels reached the iteration cap, keeping their last estimates"
        );
    }
}

/// Geometric median of every pixel of a `(rows, cols, bands, time)` cube.
///
/// Returns shape `(rows, cols, bands)`; pixels without a single fully valid
/// time sample are NaN in every band.
pub fn geometric_median_cube<T: Sample>(
    cube: ArrayView4<T>,
    nodata: Option<T>,
    config: &GeomadConfig,
) -> Result<Array3<f64>> {
    config.validate()?;
    let (rows, cols, bands, time_steps) = check_cube(&cube)?;
    info!(
        rows,
        cols,
        bands,
        time_steps,
        dtype = T::NAME,
        threads = ?config.num_threads,
        "Computing geometric median"
    );

    let mut median = Array3::<f64>::zeros((rows, cols, bands));
    let summary = dispatch_rows(
        median.view_mut(),
        cube,
        config.num_threads,
        |_, mut out_row, cube_row| {
            let mut worker = PixelWorker::new(bands, time_steps, nodata, config);
            let mut summary = SolveSummary::default();
            for (mut out, pixel) in out_row.outer_iter_mut().zip(cube_row.outer_iter()) {
                worker.load(pixel);
                summary.record(worker.solve());
                out.assign(&ArrayView1::from(&worker.estimate[..]));
            }
            summary
        },
    )?;

    log_summary("Geometric median", &summary, config);
    Ok(median)
}

/// One deviation statistic for every pixel, against a precomputed median
/// plane of shape `(rows, cols, bands)`.
///
/// Returns shape `(rows, cols)`; NaN where the median is missing or the pixel
/// has no valid samples.
pub fn deviation_cube<T: Sample>(
    kind: Deviation,
    cube: ArrayView4<T>,
    median: ArrayView3<f64>,
    nodata: Option<T>,
    config: &GeomadConfig,
) -> Result<Array2<f64>> {
    config.validate()?;
    let (rows, cols, bands, time_steps) = check_cube(&cube)?;
    check_median(&median, rows, cols, bands)?;
    info!(
        rows,
        cols,
        bands,
        time_steps,
        dtype = T::NAME,
        statistic = %kind,
        aggregate = %config.aggregate,
        "Computing deviation"
    );

    let mut out = Array2::<f64>::zeros((rows, cols));
    let summary = dispatch_rows(
        out.view_mut(),
        cube,
        config.num_threads,
        |row, mut out_row, cube_row| {
            let mut worker = PixelWorker::new(bands, time_steps, nodata, config);
            let mut summary = SolveSummary::default();
            let median_row = median.index_axis(Axis(0), row);
            for ((out, pixel), gm) in out_row
                .iter_mut()
                .zip(cube_row.outer_iter())
                .zip(median_row.outer_iter())
            {
                worker.load(pixel);
                worker.set_median(gm);
                *out = worker.deviation(kind);
                summary.record_deviation(*out);
            }
            summary
        },
    )?;

    log_summary(&kind.to_string(), &summary, config);
    Ok(out)
}

/// Median Euclidean distance (EMAD) of each pixel's observations from `median`.
pub fn euclidean_deviation_cube<T: Sample>(
    cube: ArrayView4<T>,
    median: ArrayView3<f64>,
    nodata: Option<T>,
    config: &GeomadConfig,
) -> Result<Array2<f64>> {
    deviation_cube(Deviation::Euclidean, cube, median, nodata, config)
}

/// Median cosine distance (SMAD) of each pixel's observations from `median`.
pub fn cosine_deviation_cube<T: Sample>(
    cube: ArrayView4<T>,
    median: ArrayView3<f64>,
    nodata: Option<T>,
    config: &GeomadConfig,
) -> Result<Array2<f64>> {
    deviation_cube(Deviation::Cosine, cube, median, nodata, config)
}

/// Median Bray-Curtis dissimilarity (BCMAD) of each pixel's observations from
/// `median`.
pub fn bray_curtis_deviation_cube<T: Sample>(
    cube: ArrayView4<T>,
    median: ArrayView3<f64>,
    nodata: Option<T>,
    config: &GeomadConfig,
) -> Result<Array2<f64>> {
    deviation_cube(Deviation::BrayCurtis, cube, median, nodata, config)
}

/// Geometric median and all three deviation statistics in a single pass.
///
/// Each pixel is gathered once and its fresh median feeds the reducers.
pub fn geomad_cube<T: Sample>(
    cube: ArrayView4<T>,
    nodata: Option<T>,
    config: &GeomadConfig,
) -> Result<Geomad> {
    config.validate()?;
    let (rows, cols, bands, time_steps) = check_cube(&cube)?;
    info!(
        rows,
        cols,
        bands,
        time_steps,
        dtype = T::NAME,
        aggregate = %config.aggregate,
        threads = ?config.num_threads,
        "Computing geomedian and deviations"
    );

    // Median bands followed by EMAD, SMAD, BCMAD for each pixel.
    let mut packed = Array3::<f64>::zeros((rows, cols, bands + DEVIATION_COUNT));
    let summary = dispatch_rows(
        packed.view_mut(),
        cube,
        config.num_threads,
        |_, mut out_row, cube_row| {
            let mut worker = PixelWorker::new(bands, time_steps, nodata, config);
            let mut summary = SolveSummary::default();
            for (mut out, pixel) in out_row.outer_iter_mut().zip(cube_row.outer_iter()) {
                worker.load(pixel);
                summary.record(worker.solve());
                out.slice_mut(s![..bands])
                    .assign(&ArrayView1::from(&worker.estimate[..]));
                for (k, kind) in Deviation::ALL.into_iter().enumerate() {
                    out[bands + k] = worker.deviation(kind);
                }
            }
            summary
        },
    )?;

    log_summary("Geomad", &summary, config);
    Ok(Geomad {
        median: packed.slice(s![.., .., ..bands]).to_owned(),
        emad: packed.index_axis(Axis(2), bands).to_owned(),
        smad: packed.index_axis(Axis(2), bands + 1).to_owned(),
        bcmad: packed.index_axis(Axis(2), bands + 2).to_owned(),
        summary,
    })
}

/// Convert a median plane back to a raw representation: undo `scaling`, round
/// (for integer types), and write `nodata` where the median is missing.
pub fn median_to_raw<T: Sample>(
    median: ArrayView3<f64>,
    nodata: T,
    scaling: &Scaling,
) -> Array3<T> {
    median.mapv(|v| {
        if v.is_nan() {
            nodata
        } else {
            T::from_f64(scaling.unapply(v))
        }
    })
}

/// View a dynamically shaped array as a `(rows, cols, bands, time)` cube.
pub fn as_cube<T>(array: ArrayViewD<'_, T>) -> Result<ArrayView4<'_, T>> {
    let ndim = array.ndim();
    array
        .into_dimensionality::<Ix4>()
        .map_err(|_| GeomadError::InvalidRank {
            expected: 4,
            actual: ndim,
        })
}

/// View a dynamically shaped array as a `(rows, cols, bands)` median plane.
pub fn as_plane(array: ArrayViewD<'_, f64>) -> Result<ArrayView3<'_, f64>> {
    let ndim = array.ndim();
    array
        .into_dimensionality::<Ix3>()
        .map_err(|_| GeomadError::InvalidRank {
            expected: 3,
            actual: ndim,
        })
}
