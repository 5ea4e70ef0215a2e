use serde::{Deserialize, Serialize};

use crate::error::KheError;
use crate::seed::SeedCircle;

/// Number of points on every seed loop.
pub const SEED_POINTS: usize = 36;

/// Spacing of doubles in [1, 2); seed circles are measured in these units.
pub const ULP: f64 = f64::EPSILON;

/// Deepest loop a cache may build: 36 * 2^22 points.
pub const MAX_DOUBLINGS_LIMIT: u32 = 22;

/// Settings for one khe evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KheConfig {
    /// Seed circle radius in ulps. Must admit exactly [`SEED_POINTS`]
    /// lattice points, e.g. 65, 85 or 221.
    pub radius: u32,
    /// Cap on the number of doublings per cache entry. Queries closer to the
    /// imaginary axis than this depth can reach evaluate to NaN.
    #[serde(default = "default_max_doublings")]
    pub max_doublings: u32,
}

fn default_max_doublings() -> u32 {
    16
}

impl Default for KheConfig {
    fn default() -> Self {
        Self {
            radius: 65,
            max_doublings: default_max_doublings(),
        }
    }
}

impl KheConfig {
    pub fn with_radius(radius: u32) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }

    /// Checks every setting, building the seed circle to validate the radius.
    pub fn validate(&self) -> Result<SeedCircle, KheError> {
        if self.max_doublings > MAX_DOUBLINGS_LIMIT {
            return Err(KheError::DoublingLimit {
                requested: self.max_doublings,
                limit: MAX_DOUBLINGS_LIMIT,
            });
        }
        SeedCircle::new(self.radius)
    }
}
