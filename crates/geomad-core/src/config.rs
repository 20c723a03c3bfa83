use serde::{Deserialize, Serialize};

use crate::deviation::Aggregate;
use crate::error::{GeomadError, Result};
use crate::geomedian::SolverParams;
use crate::nodata::Scaling;

/// Parameters shared by every cube-level entry point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeomadConfig {
    #[serde(default)]
    pub solver: SolverParams,
    /// Reduction applied to per-observation distances in the deviation
    /// statistics.
    #[serde(default)]
    pub aggregate: Aggregate,
    /// Transform from raw values to the units of the results.
    #[serde(default)]
    pub scaling: Scaling,
    /// Worker threads for this call. `None` uses the global Rayon pool.
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl GeomadConfig {
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;

        let Scaling { scale, offset } = self.scaling;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(GeomadError::InvalidConfig(format!(
                "scale must be finite and positive, got {scale}"
            )));
        }
        if !offset.is_finite() {
            return Err(GeomadError::InvalidConfig(format!(
                "offset must be finite, got {offset}"
            )));
        }

        if self.num_threads == Some(0) {
            return Err(GeomadError::InvalidConfig(
                "num_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
