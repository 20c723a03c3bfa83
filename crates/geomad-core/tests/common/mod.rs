#![allow(dead_code)]

use ndarray::{Array3, Array4, ArrayView4};

/// Fixed-point scale used by the integer fixtures (reflectance × 10000).
pub const FIXED_SCALE: f32 = 10_000.0;

/// Sentinel for missing samples in signed fixtures.
pub const I16_NODATA: i16 = -999;

/// Deterministic value in [0, 1) derived from `seed` (SplitMix64).
pub fn noise(seed: u64) -> f64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

fn key(parts: [usize; 5]) -> u64 {
    parts
        .iter()
        .fold(0xCBF2_9CE4_8422_2325u64, |h, &p| {
            (h ^ p as u64).wrapping_mul(0x0000_0100_0000_01B3)
        })
}

/// Build a synthetic surface-reflectance time series, shape
/// `(rows, cols, bands, time)`.
///
/// Each pixel has a smooth spectrum scaled by a per-date brightness factor
/// with a little spectral jitter. About 10% of dates are bright "cloud"
/// outliers and about 15% are missing (NaN in every band). Pixel (0, 1) is
/// missing on every date.
pub fn reflectance_cube(rows: usize, cols: usize, bands: usize, time_steps: usize) -> Array4<f32> {
    let mut cube = Array4::<f32>::zeros((rows, cols, bands, time_steps));
    for row in 0..rows {
        for col in 0..cols {
            for t in 0..time_steps {
                let date = noise(key([row, col, t, 0, 1]));
                let brightness = 0.85 + 0.3 * noise(key([row, col, t, 0, 2]));
                for band in 0..bands {
                    let base = 0.05 + 0.25 * noise(key([row, col, band, 0, 3]));
                    let jitter = 0.02 * (noise(key([row, col, band, t, 4])) - 0.5);
                    let value = if (row, col) == (0, 1) || date < 0.15 {
                        f64::NAN
                    } else if date > 0.9 {
                        0.6 + 0.3 * noise(key([row, col, band, t, 5]))
                    } else {
                        (base * brightness + jitter).max(0.001)
                    };
                    cube[[row, col, band, t]] = value as f32;
                }
            }
        }
    }
    cube
}

/// `round(cube * FIXED_SCALE)` as i16 with NaN replaced by `I16_NODATA`.
pub fn to_fixed_i16(cube: ArrayView4<f32>) -> Array4<i16> {
    cube.mapv(|v| {
        if v.is_nan() {
            I16_NODATA
        } else {
            (v * FIXED_SCALE).round() as i16
        }
    })
}

/// `round(cube * FIXED_SCALE)` as u16 with NaN replaced by 0.
pub fn to_fixed_u16(cube: ArrayView4<f32>) -> Array4<u16> {
    cube.mapv(|v| {
        if v.is_nan() {
            0
        } else {
            (v * FIXED_SCALE).round() as u16
        }
    })
}

/// Mean of all non-NaN values.
pub fn nanmean<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    sum / count as f64
}

/// Relative difference `|a - b| / |b|`.
pub fn rel_diff(a: f64, b: f64) -> f64 {
    (a - b).abs() / b.abs()
}

/// Cube where every pixel repeats the same band-vector on every date.
pub fn constant_cube(rows: usize, cols: usize, vector: &[f32], time_steps: usize) -> Array4<f32> {
    let bands = vector.len();
    Array4::from_shape_fn((rows, cols, bands, time_steps), |(_, _, b, _)| vector[b])
}

/// Bitwise equality, treating NaN as equal to NaN.
pub fn same_bits(a: &Array3<f64>, b: &Array3<f64>) -> bool {
    a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
}
