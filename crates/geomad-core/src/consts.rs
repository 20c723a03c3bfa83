/// Minimum pixel count (rows*cols) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 4_096;

/// Default iteration cap for the geometric median solver.
pub const DEFAULT_MAX_ITERS: usize = 1_000;

/// Default relative convergence tolerance: iteration stops once the estimate
/// moves less than `epsilon` times the mean norm of the observations.
pub const DEFAULT_EPSILON: f64 = 1e-7;

/// Number of deviation statistics produced per pixel (EMAD, SMAD, BCMAD).
pub const DEVIATION_COUNT: usize = 3;

/// Axis of the observation cube holding spectral bands.
pub const BAND_AXIS: usize = 2;
