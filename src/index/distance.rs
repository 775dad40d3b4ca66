//! Angular distance for the vector index.

use wide::f32x8;

/// Upper end of the angular distance range.
pub const MAX_ANGULAR_DISTANCE: f32 = 2.0;

/// SIMD-accelerated dot product calculation.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() < 8 {
        return a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    }

    let mut dot_vec = f32x8::splat(0.0);

    // Process 8 values at a time
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        dot_vec = dot_vec + load(chunk_a) * load(chunk_b);
    }

    let mut total = dot_vec.to_array().iter().sum::<f32>();
    total += remainder_a
        .iter()
        .zip(remainder_b.iter())
        .map(|(x, y)| x * y)
        .sum::<f32>();

    total
}

#[inline]
fn load(chunk: &[f32]) -> f32x8 {
    f32x8::new([
        chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
    ])
}

/// L2 norm of a vector.
pub fn norm(a: &[f32]) -> f32 {
    dot_product(a, a).sqrt()
}

/// Angular distance `sqrt(2 - 2·cos θ)`, ranging over [0, 2].
///
/// Takes precomputed norms so the index can cache them per item. Zero
/// vectors are at the maximum distance from everything.
pub fn angular_distance(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return MAX_ANGULAR_DISTANCE;
    }
    let cosine = (dot_product(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0);
    (2.0 - 2.0 * cosine).max(0.0).sqrt()
}
