pub mod composite;
pub mod config;
pub mod consts;
pub mod deviation;
pub mod error;
pub mod geomedian;
pub mod nodata;
pub mod sample;

pub use composite::{
    bray_curtis_deviation_cube, cosine_deviation_cube, deviation_cube,
    euclidean_deviation_cube, geomad_cube, geometric_median_cube, median_to_raw, Geomad,
    SolveSummary,
};
pub use config::GeomadConfig;
pub use deviation::{Aggregate, Deviation};
pub use error::{GeomadError, Result};
pub use geomedian::{geometric_median_vector, SolverParams};
pub use nodata::{validity_mask, Scaling};
pub use sample::Sample;
