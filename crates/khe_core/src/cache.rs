//! Loops per seed centre, grown on demand.
//!
//! A query at real part `x` is served by the loop at depth `n` grown from the
//! seed around `circle_center(x * 2^n)`. Because `x * 2^n` is exact, every `x`
//! in the family `x0 / 2^k` lands on the same centre, so one entry serves them
//! all at increasing depths.
//!
//! An entry stops growing at the first doubling whose walkers disagree; the
//! loops below it stay available.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use num_complex::Complex;

use crate::agm::StableInverseAgm;
use crate::config::{KheConfig, SEED_POINTS, ULP};
use crate::error::KheError;
use crate::expansion::{agm_expand_with, ExpansionReport, DEBUG_ENV};
use crate::loops::{ldexp, Loop, LoopView};
use crate::seed::SeedCircle;

/// Seed centres at or above this make the loop indistinguishable from the
/// asymptote `4e^z + 1`.
pub const CENTER_THRESHOLD: f64 = 2.0 - SEED_POINTS as f64 * ULP;

/// How a real part `x` is served.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Plan {
    /// `x` is NaN or not negative.
    Outside,
    /// `4e^z + 1` equals khe to machine precision.
    Asymptotic,
    /// The loop `depth` doublings above the seed at `center`.
    Doublings { depth: u32, center: f64 },
    /// Needs `depth` doublings, more than the cache may build.
    TooDeep { depth: u32 },
}

/// Result of looking up a real part.
#[derive(Debug, Clone)]
pub enum Reach {
    Asymptotic,
    Sampled(LoopView),
    /// No trustworthy loop exists: outside the half plane, past the depth
    /// cap, or past a doubling whose walkers disagreed.
    Unreachable,
}

#[derive(Debug)]
struct Entry {
    loops: Vec<Arc<Loop>>,
    /// `reports[k]` describes the doubling that produced `loops[k + 1]`.
    reports: Vec<ExpansionReport>,
    /// The doubling that was not published.
    refused: Option<ExpansionReport>,
}

type SharedEntry = Arc<Mutex<Entry>>;

#[derive(Debug)]
pub struct LoopCache {
    seed: SeedCircle,
    max_doublings: u32,
    entries: Mutex<HashMap<u64, SharedEntry>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV).is_ok()
}

impl LoopCache {
    pub fn new(config: &KheConfig) -> Result<Self, KheError> {
        let seed = config.validate()?;
        Ok(Self {
            seed,
            max_doublings: config.max_doublings,
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn seed(&self) -> &SeedCircle {
        &self.seed
    }

    pub fn max_doublings(&self) -> u32 {
        self.max_doublings
    }

    /// Number of doublings and seed centre serving real part `x`.
    ///
    /// The depth is the largest `n` with `circle_center(x * 2^n)` below
    /// [`CENTER_THRESHOLD`]; no such `n` means the asymptote is exact.
    pub fn plan(&self, x: f64) -> Plan {
        if x.is_nan() || x >= 0.0 {
            return Plan::Outside;
        }
        if self.seed.circle_center(x) >= CENTER_THRESHOLD {
            return Plan::Asymptotic;
        }
        let mut depth = 0u32;
        while self.seed.circle_center(ldexp(x, depth as i32 + 1)) < CENTER_THRESHOLD {
            depth += 1;
        }
        if depth > self.max_doublings {
            return Plan::TooDeep { depth };
        }
        Plan::Doublings {
            depth,
            center: self.seed.circle_center(ldexp(x, depth as i32)),
        }
    }

    /// Serves real part `x`, growing its entry as needed.
    pub fn lookup(&self, x: f64) -> Reach {
        let (depth, center) = match self.plan(x) {
            Plan::Asymptotic => return Reach::Asymptotic,
            Plan::Outside | Plan::TooDeep { .. } => return Reach::Unreachable,
            Plan::Doublings { depth, center } => (depth, center),
        };
        let shared = self.entry(center);
        let mut entry = lock(&shared);
        while entry.loops.len() <= depth as usize {
            if entry.refused.is_some() {
                return Reach::Unreachable;
            }
            let Some(last) = entry.loops.last().map(Arc::clone) else {
                return Reach::Unreachable;
            };
            let (next, report) = agm_expand_with(&last, center, &StableInverseAgm);
            if report.disagreements() > 0 {
                if debug_enabled() {
                    eprintln!(
                        "loop_cache: refused center={center:.17} depth {}: {} disagreeing meetings",
                        report.depth,
                        report.disagreements()
                    );
                }
                entry.refused = Some(report);
                return Reach::Unreachable;
            }
            entry.loops.push(Arc::new(next));
            entry.reports.push(report);
            if debug_enabled() {
                eprintln!(
                    "loop_cache: grew center={center:.17} to depth {} ({} points)",
                    entry.loops.len() - 1,
                    entry.loops[entry.loops.len() - 1].len()
                );
            }
        }
        let found = Arc::clone(&entry.loops[depth as usize]);
        Reach::Sampled(LoopView::new(found, center))
    }

    /// The loop at real part `x`, if one serves it.
    pub fn get_loop(&self, x: f64) -> Option<LoopView> {
        match self.lookup(x) {
            Reach::Sampled(view) => Some(view),
            Reach::Asymptotic | Reach::Unreachable => None,
        }
    }

    fn entry(&self, center: f64) -> SharedEntry {
        let mut entries = lock(&self.entries);
        let entry = entries.entry(center.to_bits()).or_insert_with(|| {
            if debug_enabled() {
                eprintln!("loop_cache: new entry center={center:.17}");
            }
            let seed = self.seed.seed_loop(Complex::new(center, 0.0));
            Arc::new(Mutex::new(Entry {
                loops: vec![Arc::new(seed)],
                reports: Vec::new(),
                refused: None,
            }))
        });
        Arc::clone(entry)
    }

    fn with_entry<T>(&self, center: f64, read: impl FnOnce(&Entry) -> T) -> Option<T> {
        let shared = lock(&self.entries).get(&center.to_bits()).map(Arc::clone)?;
        let entry = lock(&shared);
        Some(read(&entry))
    }

    /// Number of loops stored for `center`, zero if it has no entry.
    pub fn entry_len(&self, center: f64) -> usize {
        self.with_entry(center, |entry| entry.loops.len()).unwrap_or(0)
    }

    /// Snapshot of the loops stored for `center`.
    pub fn entry_loops(&self, center: f64) -> Vec<Arc<Loop>> {
        self.with_entry(center, |entry| entry.loops.clone())
            .unwrap_or_default()
    }

    /// Reports of the doublings stored for `center`, oldest first.
    pub fn entry_reports(&self, center: f64) -> Vec<ExpansionReport> {
        self.with_entry(center, |entry| entry.reports.clone())
            .unwrap_or_default()
    }

    /// The doubling that stopped `center`'s entry from growing, if any.
    pub fn refused(&self, center: f64) -> Option<ExpansionReport> {
        self.with_entry(center, |entry| entry.refused.clone()).flatten()
    }

    /// Number of seed centres with an entry.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{conjugate_symmetry_defects, doubling_defects};
    use crate::expansion::MEETING_FLOOR;
    use proptest::prelude::*;
    use std::thread;

    fn cache(radius: u32) -> LoopCache {
        LoopCache::new(&KheConfig::with_radius(radius)).expect("valid config")
    }

    #[test]
    fn repeated_queries_share_the_loop() {
        let cache = cache(65);
        let first = cache.get_loop(-1.0).expect("loop at -1");
        let second = cache.get_loop(-1.0).expect("loop at -1");
        assert!(Arc::ptr_eq(first.raw(), second.raw()));
        assert_eq!(first.depth(), 5);
        assert_eq!(first.len(), SEED_POINTS << 5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn halving_x_grows_the_same_entry() {
        let cache = cache(65);
        let view = cache.get_loop(-1.0).expect("loop at -1");
        let center = view.center();
        assert_eq!(cache.entry_len(center), 6);
        assert_eq!(cache.entry_reports(center).len(), 5);

        let deeper = cache.get_loop(-0.5).expect("loop at -0.5");
        assert_eq!(deeper.center(), center);
        assert_eq!(deeper.depth(), 6);
        assert_eq!(cache.entry_len(center), 7);
        assert_eq!(cache.len(), 1);

        let loops = cache.entry_loops(center);
        assert!(Arc::ptr_eq(&loops[5], view.raw()));
        assert!(Arc::ptr_eq(&loops[6], deeper.raw()));
        let depths: Vec<u32> = cache.entry_reports(center).iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![1, 2, 3, 4, 5, 6]);

        cache.get_loop(-1.0).expect("loop at -1");
        assert_eq!(cache.entry_len(center), 7);
        assert!(cache.refused(center).is_none());
    }

    #[test]
    fn no_loop_off_the_left_half_plane() {
        let cache = cache(85);
        assert!(cache.get_loop(0.0).is_none());
        assert!(cache.get_loop(0.5).is_none());
        assert!(cache.get_loop(f64::NAN).is_none());
        assert!(cache.get_loop(-40.0).is_none());
        assert_eq!(cache.plan(0.0), Plan::Outside);
        assert_eq!(cache.plan(f64::NAN), Plan::Outside);
        assert_eq!(cache.plan(-40.0), Plan::Asymptotic);
        assert!(matches!(cache.lookup(-40.0), Reach::Asymptotic));
        assert!(matches!(cache.lookup(0.5), Reach::Unreachable));
        assert!(cache.is_empty());
    }

    #[test]
    fn threshold_separates_asymptote_from_loops() {
        let cache = cache(65);
        let x_t = cache.seed().seed_real_part(CENTER_THRESHOLD);
        assert_eq!(cache.plan(x_t - 1e-6), Plan::Asymptotic);
        let Plan::Doublings { depth, center } = cache.plan(x_t + 1e-6) else {
            panic!("just inside the threshold should need a loop");
        };
        assert_eq!(depth, 0);
        assert!(center < CENTER_THRESHOLD);
        assert!(center > 1.9);
    }

    #[test]
    fn depth_past_the_cap_is_unreachable() {
        let capped = LoopCache::new(&KheConfig {
            radius: 65,
            max_doublings: 4,
        })
        .expect("valid config");
        assert!(matches!(capped.plan(-2.0), Plan::Doublings { depth: 4, .. }));
        assert_eq!(capped.plan(-1.0), Plan::TooDeep { depth: 5 });
        assert!(matches!(capped.lookup(-1.0), Reach::Unreachable));
        assert!(capped.is_empty());

        let cache = cache(65);
        assert_eq!(cache.plan(-1e-5), Plan::TooDeep { depth: 21 });
        assert!(matches!(cache.plan(-1e-300), Plan::TooDeep { depth } if depth > 900));
    }

    #[test]
    fn refused_entries_stop_growing() {
        let cache = cache(65);
        let view = cache.get_loop(-1.0).expect("loop at -1");
        let center = view.center();
        lock(&cache.entry(center)).refused = Some(ExpansionReport {
            depth: 6,
            ..ExpansionReport::default()
        });

        assert!(matches!(cache.lookup(-0.5), Reach::Unreachable));
        assert!(matches!(cache.lookup(-1.0), Reach::Sampled(_)));
        assert!(matches!(cache.lookup(-2.0), Reach::Sampled(_)));
        assert_eq!(cache.entry_len(center), 6);
        assert_eq!(cache.refused(center).map(|r| r.depth), Some(6));
    }

    #[test]
    fn concurrent_readers_see_one_loop() {
        let cache = cache(221);
        let views: Vec<LoopView> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.get_loop(-0.75)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread").expect("loop"))
                .collect()
        });
        for view in &views[1..] {
            assert!(Arc::ptr_eq(views[0].raw(), view.raw()));
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entry_len(views[0].center()), views[0].depth() as usize + 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]
        #[test]
        fn every_cached_loop_is_consistent(x in -0.05f64..-0.01, pick in 0usize..3) {
            let cache = cache([65, 85, 221][pick]);
            let view = cache.get_loop(x).expect("loop near the axis");
            let loops = cache.entry_loops(view.center());
            let reports = cache.entry_reports(view.center());
            prop_assert_eq!(loops.len(), view.depth() as usize + 1);
            prop_assert_eq!(reports.len() + 1, loops.len());
            for (pair, report) in loops.windows(2).zip(&reports) {
                prop_assert_eq!(report.disagreements(), 0, "depth {}", report.depth);
                prop_assert!(doubling_defects(&pair[0], &pair[1], 8.0).is_empty());
                let asymmetric = conjugate_symmetry_defects(pair[1].points(), MEETING_FLOOR);
                prop_assert!(asymmetric.is_empty(), "depth {}: {:?}", report.depth, asymmetric.len());
            }
        }
    }
}
