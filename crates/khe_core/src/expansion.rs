pub mod swap_step;

pub use swap_step::{classify_seam, Anchor, Meeting, Seam, SeamKind};

use std::sync::Arc;

use num_complex::Complex;
use serde::Serialize;

use crate::agm::StableInverseAgm;
use crate::loops::{Loop, SampleGrid};
use crate::traits::InverseAgm;

/// Environment variable that turns on per-doubling diagnostics on stderr.
pub const DEBUG_ENV: &str = "KHE_LOOP_DEBUG";

/// Walkers meeting with opposite orientations count as a disagreement only
/// if their root separation exceeds this fraction of the loop's largest
/// magnitude.
pub const MEETING_FLOOR: f64 = 1e-3;

/// What happened while doubling one loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpansionReport {
    /// Depth of the produced loop.
    pub depth: u32,
    pub len: usize,
    /// Root pairs whose order was exchanged, seams included.
    pub swaps: usize,
    /// Crossings of the circle of radius `center` by the doubled samples,
    /// counted before the pairs are ordered.
    pub innings: usize,
    /// Largest sample magnitude of the produced loop.
    pub scale: f64,
    pub anchors: Vec<Anchor>,
    pub meetings: Vec<Meeting>,
}

impl ExpansionReport {
    /// The meeting with the smallest root separation, where a wrong swap is
    /// most likely.
    pub fn weakest_meeting(&self) -> Option<&Meeting> {
        self.meetings
            .iter()
            .min_by(|a, b| a.separation.total_cmp(&b.separation))
    }

    /// Meetings where the two walkers disagreed about orientation while
    /// the roots were still distinguishable.
    pub fn disagreements(&self) -> usize {
        self.meetings
            .iter()
            .filter(|m| !m.consistent && m.separation > MEETING_FLOOR * self.scale)
            .count()
    }
}

/// Doubles `parent` with the stable inverse AGM step.
///
/// The result has twice as many samples over the same period: samples `i`
/// and `i + N` are the two roots whose arithmetic mean is `parent[i]` and
/// whose geometric mean is `±parent[i + N/2]`.
pub fn agm_expand(parent: &Loop, center: f64) -> Loop {
    agm_expand_with(parent, center, &StableInverseAgm).0
}

/// Doubles `parent` with the given inverse step and reports the repair pass.
pub fn agm_expand_with<S: InverseAgm + ?Sized>(
    parent: &Loop,
    center: f64,
    step: &S,
) -> (Loop, ExpansionReport) {
    let len = parent.len();
    debug_assert!(len % 2 == 0, "loop length must be even to double");
    let half = len / 2;
    let source = parent.points();

    let mut points = vec![Complex::new(0.0, 0.0); 2 * len];
    for k in 0..len {
        let (p, q) = step.inverse_step(source[k], source[(k + half) % len]);
        points[k] = p;
        points[k + len] = q;
    }

    let grid = SampleGrid::new(parent.seed_angles(), parent.depth() + 1);
    let resolution = swap_step::resolve(&mut points, &grid, center);
    let report = ExpansionReport {
        depth: parent.depth() + 1,
        len: points.len(),
        swaps: resolution.swaps,
        innings: resolution.innings,
        scale: points.iter().map(|p| p.norm()).fold(0.0, f64::max),
        anchors: resolution.anchors,
        meetings: resolution.meetings,
    };

    if std::env::var(DEBUG_ENV).is_ok() {
        let weakest = report.weakest_meeting();
        eprintln!(
            "agm_expand: depth={} len={} swaps={} innings={} seams={} weakest_meeting={:.3e}@{} disagreements={}",
            report.depth,
            report.len,
            report.swaps,
            report.innings,
            report.anchors.len(),
            weakest.map_or(f64::NAN, |m| m.separation),
            weakest.map_or(0, |m| m.index),
            report.disagreements()
        );
    }

    let doubled = Loop::new(points, parent.depth() + 1, Arc::clone(parent.seed_angles()));
    (doubled, report)
}
