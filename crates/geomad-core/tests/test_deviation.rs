use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};

use geomad_core::deviation::{deviation, Aggregate, Deviation};
use geomad_core::nodata::{PixelSamples, Scaling};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn gather(pixel: &Array2<f64>) -> PixelSamples {
    let (bands, time_steps) = pixel.dim();
    let mut samples = PixelSamples::with_capacity(bands, time_steps);
    samples.gather(pixel.view(), None, &Scaling::default());
    samples
}

fn stat(kind: Deviation, pixel: &Array2<f64>, median: &[f64], aggregate: Aggregate) -> f64 {
    let samples = gather(pixel);
    let mut scratch = Vec::new();
    deviation(kind, &samples, median, aggregate, &mut scratch)
}

// ---------------------------------------------------------------------------
// Euclidean (EMAD)
// ---------------------------------------------------------------------------

#[test]
fn test_emad_median_of_distances() {
    // [band, time]: distances from the origin are 1, 2, 10.
    let pixel = array![[1.0, 0.0, 6.0], [0.0, 2.0, 8.0]];
    let d = stat(Deviation::Euclidean, &pixel, &[0.0, 0.0], Aggregate::Median);
    assert_abs_diff_eq!(d, 2.0, epsilon = 1e-12);
}

#[test]
fn test_emad_mean_aggregate() {
    let pixel = array![[1.0, 0.0, 6.0], [0.0, 2.0, 8.0]];
    let d = stat(Deviation::Euclidean, &pixel, &[0.0, 0.0], Aggregate::Mean);
    assert_abs_diff_eq!(d, 13.0 / 3.0, epsilon = 1e-12);
}

// ---------------------------------------------------------------------------
// Cosine (SMAD)
// ---------------------------------------------------------------------------

#[test]
fn test_smad_is_brightness_invariant() {
    // Every observation is a brighter or darker copy of the median spectrum.
    let pixel = array![[0.1, 0.2, 0.05], [0.2, 0.4, 0.1], [0.3, 0.6, 0.15]];
    let d = stat(Deviation::Cosine, &pixel, &[0.1, 0.2, 0.3], Aggregate::Median);
    assert_abs_diff_eq!(d, 0.0, epsilon = 1e-12);
}

#[test]
fn test_smad_orthogonal() {
    let pixel = array![[0.0, 0.0], [1.0, 2.0]];
    let d = stat(Deviation::Cosine, &pixel, &[1.0, 0.0], Aggregate::Median);
    assert_abs_diff_eq!(d, 1.0, epsilon = 1e-12);
}

#[test]
fn test_smad_zero_median_is_nan() {
    let pixel = array![[0.1, 0.2], [0.3, 0.4]];
    let d = stat(Deviation::Cosine, &pixel, &[0.0, 0.0], Aggregate::Median);
    assert!(d.is_nan());
}

// ---------------------------------------------------------------------------
// Bray-Curtis (BCMAD)
// ---------------------------------------------------------------------------

#[test]
fn test_bcmad_within_unit_interval() {
    let pixel = array![[0.1, 0.5, 0.9, 0.0], [0.3, 0.1, 0.0, 0.7]];
    let d = stat(Deviation::BrayCurtis, &pixel, &[0.2, 0.2], Aggregate::Median);
    assert!((0.0..=1.0).contains(&d), "got {d}");
}

#[test]
fn test_bcmad_known_value() {
    // Single observation: (|1-2| + |2-3|) / (3 + 5) = 0.25
    let pixel = array![[1.0], [2.0]];
    let d = stat(Deviation::BrayCurtis, &pixel, &[2.0, 3.0], Aggregate::Median);
    assert_abs_diff_eq!(d, 0.25, epsilon = 1e-12);
}

// ---------------------------------------------------------------------------
// Missing data
// ---------------------------------------------------------------------------

#[test]
fn test_missing_median_gives_nan_for_every_statistic() {
    let pixel = array![[0.1, 0.2], [0.3, 0.4]];
    for kind in Deviation::ALL {
        let d = stat(kind, &pixel, &[f64::NAN, 0.3], Aggregate::Median);
        assert!(d.is_nan(), "{kind} should be NaN");
    }
}

#[test]
fn test_no_samples_gives_nan() {
    let pixel = array![[f64::NAN, 0.2], [0.3, f64::NAN]];
    for kind in Deviation::ALL {
        let d = stat(kind, &pixel, &[0.1, 0.3], Aggregate::Mean);
        assert!(d.is_nan(), "{kind} should be NaN");
    }
}

#[test]
fn test_zero_spread_is_zero() {
    let pixel = array![[0.25, 0.25, 0.25], [0.5, 0.5, 0.5]];
    let median = [0.25, 0.5];
    assert_eq!(stat(Deviation::Euclidean, &pixel, &median, Aggregate::Median), 0.0);
    assert_eq!(stat(Deviation::BrayCurtis, &pixel, &median, Aggregate::Median), 0.0);
    assert_abs_diff_eq!(
        stat(Deviation::Cosine, &pixel, &median, Aggregate::Median),
        0.0,
        epsilon = 1e-12
    );
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_deviation_display() {
    assert_eq!(format!("{}", Deviation::Euclidean), "EMAD");
    assert_eq!(format!("{}", Deviation::Cosine), "SMAD");
    assert_eq!(format!("{}", Deviation::BrayCurtis), "BCMAD");
}

#[test]
fn test_aggregate_display_and_default() {
    assert_eq!(format!("{}", Aggregate::Median), "Median");
    assert_eq!(format!("{}", Aggregate::Mean), "Mean");
    assert_eq!(Aggregate::default(), Aggregate::Median);
}
