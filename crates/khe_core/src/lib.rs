pub mod agm;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod expansion;
pub mod interp;
pub mod loops;
pub mod seed;
pub mod summation;
/// The `khe_core` crate evaluates khe(z) = θ₃(e^z)² on the open left half plane
/// by growing sampled loops from tiny seed circles with the inverse AGM.
///
/// Key components:
/// - **Seed**: `SeedCircle` (36 exactly representable lattice points per loop).
/// - **Expansion**: `agm_expand` (loop doubling) and the swap-step repair that orders root pairs.
/// - **Cache**: `LoopCache`, per-centre loops grown on demand and shared behind `Arc`.
/// - **Evaluator**: `Khe`, cubic interpolation on the cached loop, the asymptote far to the
///   left, and NaN where no trustworthy loop reaches.
/// - **Diagnostics**: round-trip, symmetry and ordering checks plus the loop spectrum.
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{LoopCache, Plan, Reach};
pub use config::KheConfig;
pub use error::KheError;
pub use evaluator::Khe;
pub use expansion::{agm_expand, agm_expand_with, ExpansionReport, Seam, SeamKind};
pub use loops::{Loop, LoopView};
pub use seed::SeedCircle;
