//! Pairing repair after a doubling.
//!
//! The inverse AGM step yields each pair of new samples `(a, a + N)` without
//! saying which root belongs at `a`. Near the imaginary axis khe peaks at
//! every rational fraction `j/b` of a turn, with height about
//! `G(j, b)² / b² · π / |x|` where `G` is the quadratic Gauss sum. The peaks
//! whose antipode (half a turn away) is tiny or of opposite sign pin down
//! which root goes where; those are the seams. Seams come from odd
//! denominators `b` (real peaks) and from `b = 4·odd` (imaginary peaks), and
//! are anchored only where the loop shows the peak clearly.
//!
//! Between consecutive seams a pair of walkers moves inward, one from each
//! seam, keeping the root difference `new[a] - new[a + N]` continuous and
//! swapping the two roots whenever the candidate difference points
//! backwards. The walker whose next difference is largest moves first, so
//! partners meet where the difference is smallest. At denominators divisible
//! by 8 both roots peak together and agree to within rounding; walkers meet
//! there instead of crossing.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::f64::consts::{PI, TAU};

use num_complex::Complex;
use serde::Serialize;

use crate::loops::SampleGrid;

/// A seam's dominant root must exceed its antipode by this factor (real
/// seams), or the root difference must exceed the root sum by it (imaginary
/// seams).
const DOMINANCE: f64 = 1e3;

/// Consecutive odd denominators without a seam that end the search.
const MISS_LIMIT: u64 = 3;

/// Which axis the seam's root lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeamKind {
    /// The seam root is real and its antipode vanishes.
    Real,
    /// The seam root is imaginary and its antipode is its negative.
    Imaginary,
}

/// Classifies the fraction `num/den` of a turn by its lowest-terms
/// denominator `b`: `b mod 4` of 1 or 3 is a real seam, `b = 4·odd` an
/// imaginary seam, anything else (`b ≡ 2 mod 4`, `b ≡ 0 mod 8`) no seam.
pub fn classify_seam(num: u64, den: u64) -> Option<SeamKind> {
    Seam::new(num, den).map(|seam| seam.kind)
}

/// A seam fraction `num/den` of a turn, in lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Seam {
    pub num: u64,
    pub den: u64,
    pub kind: SeamKind,
}

impl Seam {
    pub fn new(num: u64, den: u64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num, den);
        let (num, den) = (num / g, den / g);
        let kind = match den % 4 {
            1 | 3 => SeamKind::Real,
            0 if (den / 4) % 2 == 1 => SeamKind::Imaginary,
            _ => return None,
        };
        Some(Self { num, den, kind })
    }

    /// Imaginary part of khe at the seam, reduced to `[0, 2π)`.
    pub fn angle(&self) -> f64 {
        TAU * (self.num % self.den) as f64 / self.den as f64
    }

    /// Direction of the seam root: the sign of `G(num, den)²`.
    pub fn phase(&self) -> Complex<f64> {
        match self.kind {
            SeamKind::Real if self.den % 4 == 1 => Complex::new(1.0, 0.0),
            SeamKind::Real => Complex::new(-1.0, 0.0),
            SeamKind::Imaginary if self.num % 4 == 1 => Complex::new(0.0, 1.0),
            SeamKind::Imaginary => Complex::new(0.0, -1.0),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// A seam anchored in a doubled loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub seam: Seam,
    /// Pair index in `0..N`; the seam root sits at `index` or `index + N`.
    pub index: usize,
    pub swapped: bool,
}

/// Where two partner walkers stopped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Meeting {
    /// Pair index of the forward walker; its partner stopped one index later.
    pub index: usize,
    /// Smaller of the two walkers' last root differences.
    pub separation: f64,
    /// Whether both walkers ended with differences pointing the same way.
    pub consistent: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Resolution {
    pub swaps: usize,
    pub innings: usize,
    pub anchors: Vec<Anchor>,
    pub meetings: Vec<Meeting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// One walker: the pair index it has resolved up to and the root difference
/// it saw there.
#[derive(Debug, Clone, Copy)]
struct SwapStep {
    index: usize,
    direction: Direction,
    last_diff: Complex<f64>,
    partner: usize,
    retired: bool,
}

impl SwapStep {
    fn next_index(&self) -> usize {
        match self.direction {
            Direction::Forward => self.index + 1,
            Direction::Backward => self.index - 1,
        }
    }

    fn meets(&self, other: &SwapStep) -> bool {
        self.direction != other.direction && self.next_index() == other.index
    }
}

/// Heap entry: the walker with the largest upcoming difference goes first.
#[derive(Debug, Clone, Copy)]
struct Urgency {
    separation: f64,
    walker: usize,
}

impl PartialEq for Urgency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Urgency {}

impl PartialOrd for Urgency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Urgency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.separation
            .total_cmp(&other.separation)
            .then_with(|| other.walker.cmp(&self.walker))
    }
}

/// Root difference of the pair at `index`.
fn pair_diff(points: &[Complex<f64>], index: usize) -> Complex<f64> {
    let len = points.len();
    points[index % len] - points[(index + len / 2) % len]
}

fn swap_pair(points: &mut [Complex<f64>], index: usize) {
    let len = points.len();
    points.swap(index % len, (index + len / 2) % len);
}

/// Whether continuing from `last` to `candidate` reverses the difference.
fn reverses(candidate: Complex<f64>, last: Complex<f64>) -> bool {
    (candidate * last.conj()).re < 0.0
}

/// Counts crossings of `|p| = center` going once around the loop.
pub(crate) fn count_innings(points: &[Complex<f64>], center: f64) -> usize {
    let len = points.len();
    let outside = |i: usize| points[i % len].norm() > center;
    (0..len).filter(|&i| outside(i) != outside(i + 1)).count()
}

/// Pair index of `seam` and the sample holding its root, or `None` when the
/// seam rounds onto the mirror pair `N`.
fn locate(grid: &SampleGrid<'_>, seam: &Seam) -> Option<(usize, usize)> {
    let half = grid.len() / 2;
    let y = seam.angle();
    let upper = y >= PI;
    let index = grid.nearest(if upper { y - PI } else { y });
    if index >= half {
        return None;
    }
    Some((index, if upper { index + half } else { index }))
}

/// Whether the peak at `side` stands clear of its antipode.
fn is_clear(points: &[Complex<f64>], side: usize, kind: SeamKind, center: f64) -> bool {
    let half = points.len() / 2;
    let (root, antipode) = (points[side], points[(side + half) % points.len()]);
    let big = root.norm().max(antipode.norm());
    if big <= center {
        return false;
    }
    match kind {
        SeamKind::Real => big > DOMINANCE * root.norm().min(antipode.norm()),
        SeamKind::Imaginary => (root - antipode).norm() > DOMINANCE * (root + antipode).norm(),
    }
}

/// Seams to anchor, keyed by pair index.
///
/// The axis seams `0/1` and `1/4` are always used. Other fractions are
/// enumerated by odd denominator `i`, trying `j/i` and `j/(4i)`, until
/// [`MISS_LIMIT`] denominators in a row add nothing or the seam count reaches
/// the innings count.
fn find_seams(
    points: &[Complex<f64>],
    grid: &SampleGrid<'_>,
    center: f64,
    innings: usize,
) -> BTreeMap<usize, (Seam, usize)> {
    let len = points.len() as u64;
    let mut seams = BTreeMap::new();
    for (num, den) in [(0, 1), (1, 4)] {
        if let Some(seam) = Seam::new(num, den) {
            if let Some((index, side)) = locate(grid, &seam) {
                seams.entry(index).or_insert((seam, side));
            }
        }
    }

    let limit = innings.max(2);
    let mut misses = 0;
    let mut odd = 3u64;
    'search: while misses < MISS_LIMIT && odd * odd <= 4 * len {
        let mut found = 0;
        for den in [odd, 4 * odd] {
            for num in (1..den).filter(|&num| gcd(num, den) == 1) {
                if seams.len() >= limit {
                    break 'search;
                }
                let Some(seam) = Seam::new(num, den) else {
                    continue;
                };
                let Some((index, side)) = locate(grid, &seam) else {
                    continue;
                };
                if seams.contains_key(&index) || !is_clear(points, side, seam.kind, center) {
                    continue;
                }
                seams.insert(index, (seam, side));
                found += 1;
            }
        }
        misses = if found == 0 { misses + 1 } else { 0 };
        odd += 2;
    }
    seams
}

/// Reorders the freshly doubled `points` so each half-loop is continuous.
///
/// `points[a]` and `points[a + len/2]` are the two roots of one inverse step;
/// only their order changes. `grid` gives the sample angles of the doubled
/// loop and `center` its seed centre.
pub(crate) fn resolve(
    points: &mut [Complex<f64>],
    grid: &SampleGrid<'_>,
    center: f64,
) -> Resolution {
    debug_assert_eq!(points.len(), grid.len());
    let half = points.len() / 2;
    let mut resolution = Resolution {
        innings: count_innings(points, center),
        ..Resolution::default()
    };
    let seams = find_seams(points, grid, center, resolution.innings);

    for (&index, &(seam, side)) in &seams {
        let diff = points[side] - points[(side + half) % points.len()];
        let swapped = (diff * seam.phase().conj()).re < 0.0;
        if swapped {
            swap_pair(points, index);
            resolution.swaps += 1;
        }
        resolution.anchors.push(Anchor {
            seam,
            index,
            swapped,
        });
    }

    // The pair at `half` mirrors pair 0 and closes the last run.
    let bounds: Vec<usize> = seams.keys().copied().chain(std::iter::once(half)).collect();
    let mut walkers: Vec<SwapStep> = Vec::with_capacity(2 * seams.len());
    for run in bounds.windows(2) {
        let (lo, hi) = (run[0], run[1]);
        let forward = walkers.len();
        walkers.push(SwapStep {
            index: lo,
            direction: Direction::Forward,
            last_diff: pair_diff(points, lo),
            partner: forward + 1,
            retired: false,
        });
        walkers.push(SwapStep {
            index: hi,
            direction: Direction::Backward,
            last_diff: pair_diff(points, hi),
            partner: forward,
            retired: false,
        });
    }

    let mut heap = BinaryHeap::with_capacity(walkers.len());
    for id in 0..walkers.len() {
        schedule(points, &mut walkers, &mut heap, &mut resolution, id);
    }

    while let Some(Urgency { walker: id, .. }) = heap.pop() {
        if walkers[id].retired {
            continue;
        }
        let next = walkers[id].next_index();
        let mut candidate = pair_diff(points, next);
        let last = walkers[id].last_diff;
        let zero = Complex::new(0.0, 0.0);
        if candidate != zero && last != zero && reverses(candidate, last) {
            swap_pair(points, next);
            candidate = -candidate;
            resolution.swaps += 1;
        }
        let walker = &mut walkers[id];
        walker.index = next;
        if candidate != zero {
            walker.last_diff = candidate;
        }
        schedule(points, &mut walkers, &mut heap, &mut resolution, id);
    }

    resolution
}

/// Pushes walker `id` back onto the heap, or retires it with its partner if
/// the two have met.
fn schedule(
    points: &[Complex<f64>],
    walkers: &mut [SwapStep],
    heap: &mut BinaryHeap<Urgency>,
    resolution: &mut Resolution,
    id: usize,
) {
    let walker = walkers[id];
    if walker.retired {
        return;
    }
    let partner = walkers[walker.partner];
    if walker.meets(&partner) || walker.index == partner.index {
        let (forward, backward) = match walker.direction {
            Direction::Forward => (walker, partner),
            Direction::Backward => (partner, walker),
        };
        resolution.meetings.push(Meeting {
            index: forward.index,
            separation: forward.last_diff.norm().min(backward.last_diff.norm()),
            consistent: !reverses(backward.last_diff, forward.last_diff),
        });
        walkers[id].retired = true;
        walkers[walker.partner].retired = true;
        return;
    }
    heap.push(Urgency {
        separation: pair_diff(points, walker.next_index()).norm(),
        walker: id,
    });
}
