//! Nodata-aware gathering of per-pixel observations.
//!
//! A pixel of the observation cube is a `[band, time]` slice. A time sample is
//! valid only if every band is present: a single missing band discards the
//! whole sample. Valid samples are copied, transposed to time-major order and
//! widened to `f64`, into a buffer that each worker reuses across pixels.

use ndarray::{Array3, ArrayView1, ArrayView2, ArrayView4, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::consts::BAND_AXIS;
use crate::sample::Sample;

/// Linear transform applied to raw values while gathering:
/// `value * scale + offset`.
///
/// The identity by default, so integer inputs are treated as plain numbers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub scale: f64,
    pub offset: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl Scaling {
    pub fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }

    /// Inverse of [`Scaling::apply`].
    #[inline]
    pub fn unapply(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }
}

/// True if every band of one time sample is present.
pub fn is_valid_sample<T: Sample>(column: ArrayView1<T>, nodata: Option<T>) -> bool {
    column.iter().all(|v| !v.is_nodata(nodata))
}

/// Per-sample validity of a whole cube, shape `(rows, cols, time)`.
pub fn validity_mask<T: Sample>(cube: ArrayView4<T>, nodata: Option<T>) -> Array3<bool> {
    let (rows, cols, _, time_steps) = cube.dim();
    let mut mask = Array3::from_elem((rows, cols, time_steps), false);

    // Band lanes of the cube are indexed by (row, col, time), like the mask.
    Zip::from(&mut mask)
        .and(cube.lanes(Axis(BAND_AXIS)))
        .for_each(|valid, column| *valid = is_valid_sample(column, nodata));

    mask
}

/// Reusable buffer holding the valid observations of one pixel.
///
/// Rows are time samples, columns are bands, stored contiguously.
#[derive(Clone, Debug)]
pub struct PixelSamples {
    data: Vec<f64>,
    bands: usize,
    len: usize,
}

impl PixelSamples {
    /// Allocate room for `time_steps` samples of `bands` values.
    pub fn with_capacity(bands: usize, time_steps: usize) -> Self {
        Self {
            data: vec![0.0; bands * time_steps],
            bands,
            len: 0,
        }
    }

    /// Copy the valid samples of `pixel` (shape `[band, time]`) into the
    /// buffer, replacing its previous contents. Returns the valid count.
    pub fn gather<T: Sample>(
        &mut self,
        pixel: ArrayView2<T>,
        nodata: Option<T>,
        scaling: &Scaling,
    ) -> usize {
        let (bands, time_steps) = pixel.dim();
        self.bands = bands;
        if self.data.len() < bands * time_steps {
            self.data.resize(bands * time_steps, 0.0);
        }

        let mut idx = 0;
        for column in pixel.axis_iter(Axis(1)) {
            if !is_valid_sample(column, nodata) {
                continue;
            }
            let row = &mut self.data[idx * bands..(idx + 1) * bands];
            for (dst, &raw) in row.iter_mut().zip(column.iter()) {
                *dst = scaling.apply(raw.to_f64());
            }
            idx += 1;
        }

        self.len = idx;
        idx
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Band-vector of the `t`-th valid sample.
    #[inline]
    pub fn row(&self, t: usize) -> &[f64] {
        &self.data[t * self.bands..(t + 1) * self.bands]
    }

    /// Iterate over the valid band-vectors in time order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data[..self.len * self.bands].chunks_exact(self.bands.max(1))
    }
}
