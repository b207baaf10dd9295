//! Point budget: blend edge points with uniformly random points.
//!
//! Edge points anchor the mesh to visible structure, but a mesh that only
//! follows edges looks busy and leaves flat regions untriangulated. At
//! most [`EDGE_SHARE`] of the budget goes to edge points; the rest is
//! spread uniformly over the image so every region gets vertices.
//!
//! Randomness is always supplied by the caller. [`rng_from_seed`] builds
//! the generator the pipeline uses, deterministic when a seed is given.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point};

/// Smallest point budget the sampler accepts.
pub const MIN_NUM_POINTS: usize = 100;

/// Largest fraction of the budget reserved for edge points, as
/// numerator / denominator so the quota is an exact integer floor.
pub const EDGE_SHARE: (usize, usize) = (4, 5);

/// Clamp a requested budget to at least [`MIN_NUM_POINTS`].
///
/// Zero and negative requests become [`MIN_NUM_POINTS`].
#[must_use]
pub fn clamp_num_points(requested: i64) -> usize {
    usize::try_from(requested).map_or(MIN_NUM_POINTS, |n| n.max(MIN_NUM_POINTS))
}

/// `floor(0.8 * num_points)`, computed without floating point.
#[must_use]
pub const fn edge_quota(num_points: usize) -> usize {
    let (num, den) = EDGE_SHARE;
    num_points / den * num + num_points % den * num / den
}

/// How a point budget was split between edge and random points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointBudget {
    /// Budget after clamping.
    pub requested: usize,
    /// Edge points offered by the edge extractor.
    pub edge_candidates: usize,
    /// Edge points kept.
    pub edge_selected: usize,
    /// Uniform random points added.
    pub random: usize,
}

impl PointBudget {
    /// Plan the split for `edge_candidates` edge points and a (clamped)
    /// budget of `num_points`.
    ///
    /// The random fill is clamped at zero rather than going negative.
    #[must_use]
    pub fn plan(edge_candidates: usize, num_points: usize) -> Self {
        let requested = num_points.max(MIN_NUM_POINTS);
        let quota = edge_quota(requested);
        let edge_selected = edge_candidates.min(quota);
        Self {
            requested,
            edge_candidates,
            edge_selected,
            random: requested.saturating_sub(edge_selected),
        }
    }

    /// Total number of points the sampler emits.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.edge_selected + self.random
    }
}

/// Build the sampler's random generator.
///
/// A fixed seed makes the whole pipeline reproducible; `None` seeds from
/// operating-system entropy.
#[must_use]
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Sample a point set of exactly the (clamped) budget.
///
/// See [`sample_with_budget`] for details.
#[must_use]
pub fn sample<R: Rng + ?Sized>(
    edge_points: &[Point],
    dimensions: Dimensions,
    num_points: usize,
    rng: &mut R,
) -> Vec<Point> {
    sample_with_budget(edge_points, dimensions, num_points, rng).0
}

/// Sample a point set and report how the budget was spent.
///
/// When there are more edge points than the edge quota, exactly the quota
/// is drawn without replacement; otherwise every edge point is kept. The
/// remainder is filled with integer-grid points uniform over
/// `[0, width) x [0, height)`.
#[must_use]
pub fn sample_with_budget<R: Rng + ?Sized>(
    edge_points: &[Point],
    dimensions: Dimensions,
    num_points: usize,
    rng: &mut R,
) -> (Vec<Point>, PointBudget) {
    let mut budget = PointBudget::plan(edge_points.len(), num_points);
    if dimensions.width == 0 || dimensions.height == 0 {
        budget.random = 0;
    }

    let mut points = Vec::with_capacity(budget.total());
    if budget.edge_selected == edge_points.len() {
        points.extend_from_slice(edge_points);
    } else {
        let picked = rand::seq::index::sample(rng, edge_points.len(), budget.edge_selected);
        points.extend(picked.into_iter().map(|i| edge_points[i]));
    }

    points.extend((0..budget.random).map(|_| random_point(dimensions, rng)));

    tracing::debug!(
        requested = budget.requested,
        edge_candidates = budget.edge_candidates,
        edge_selected = budget.edge_selected,
        random = budget.random,
        "sampled feature points"
    );
    (points, budget)
}

fn random_point<R: Rng + ?Sized>(dimensions: Dimensions, rng: &mut R) -> Point {
    Point::new(
        f64::from(rng.gen_range(0..dimensions.width)),
        f64::from(rng.gen_range(0..dimensions.height)),
    )
}
