//! Data generation helpers shared by the benchmarks.

use atlas_index::BoundingBox;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic batch of query windows of the given size, uniformly
/// placed inside the index extent.
pub fn random_windows(count: usize, extent: f64, window: f64, seed: u64) -> Vec<BoundingBox> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let x = rng.gen_range(0.0..extent - window);
            let y = rng.gen_range(0.0..extent - window);
            BoundingBox::new(x, y, x + window, y + window)
        })
        .collect()
}
