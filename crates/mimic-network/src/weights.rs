//! Operators over raw weight slices.
//!
//! These work on any `&[f32]`: a whole flattened network, a single
//! connection layer, or a learned layer buffer. [`NetworkWeights`]
//! delegates to them, and the evolutionary loop uses them directly to
//! build offspring.
//!
//! - **Initialization**: [`random`] draws uniformly from `[-limit, limit]`
//! - **Crossover**: [`blx_alpha`] implements the BLX-α operator
//! - **Mutation**: [`mutate`] applies sparse Gaussian noise
//! - **Blending**: [`blend`] is the convex combination used to merge
//!   imitation knowledge into evolved weights
//!
//! [`NetworkWeights`]: crate::NetworkWeights

use rand::Rng;
use rand_distr::Normal;

/// Creates a weight vector by applying a function to each index.
///
/// ```
/// use mimic_network::weights;
///
/// let w = weights::from_fn(|i| i as f32 * 0.5, 3);
/// assert_eq!(w, vec![0.0, 0.5, 1.0]);
/// ```
pub fn from_fn<F>(mut f: F, len: usize) -> Vec<f32>
where
    F: FnMut(usize) -> f32,
{
    let mut values = Vec::with_capacity(len);
    for i in 0..len {
        values.push(f(i));
    }
    values
}

/// Generates `len` weights uniformly distributed in `[-limit, limit]`.
pub fn random<R>(rng: &mut R, limit: f32, len: usize) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    from_fn(|_| rng.random_range(-limit..=limit), len)
}

/// Performs BLX-α (Blend Crossover) between two parent weight vectors.
///
/// For each position the child is sampled uniformly from
/// `[min - α·d, max + α·d]` where `d` is the distance between the parents,
/// then clamped to `[-limit, limit]`.
///
/// # Panics
///
/// Panics if parent vectors have different lengths.
pub fn blx_alpha<R>(p1: &[f32], p2: &[f32], alpha: f32, limit: f32, rng: &mut R) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    assert_eq!(p1.len(), p2.len());
    from_fn(
        |i| {
            let min = f32::min(p1[i], p2[i]);
            let max = f32::max(p1[i], p2[i]);
            let d = max - min;
            rng.random_range((min - alpha * d)..=(max + alpha * d))
                .clamp(-limit, limit)
        },
        p1.len(),
    )
}

/// Applies Gaussian mutation in-place.
///
/// Each weight is perturbed with probability `rate` by a sample from
/// `N(0, sigma)` and clamped to `[-limit, limit]`. A non-positive or
/// non-finite `sigma` leaves the weights unchanged.
pub fn mutate<R>(weights: &mut [f32], sigma: f32, limit: f32, rate: f32, rng: &mut R)
where
    R: Rng + ?Sized,
{
    let Ok(normal) = Normal::new(0.0, sigma) else {
        return;
    };
    if sigma <= 0.0 {
        return;
    }
    let rate = f64::from(rate.clamp(0.0, 1.0));
    for w in weights {
        if rng.random_bool(rate) {
            *w = (*w + rng.sample(normal)).clamp(-limit, limit);
        }
    }
}

/// Blends `learned` into `current` in-place:
/// `current = (1 - strength) * current + strength * learned`.
///
/// `strength` is clamped to `[0, 1]`. At `0` the slice is left untouched
/// bit for bit; at `1` it becomes an exact copy of `learned`.
///
/// # Panics
///
/// Panics if the slices have different lengths.
///
/// ```
/// use mimic_network::weights;
///
/// let mut current = [1.0, -1.0];
/// weights::blend(&mut current, &[0.0, 1.0], 0.25);
/// assert_eq!(current, [0.75, -0.5]);
/// ```
pub fn blend(current: &mut [f32], learned: &[f32], strength: f32) {
    assert_eq!(current.len(), learned.len());
    let strength = strength.clamp(0.0, 1.0);
    if strength <= 0.0 {
        return;
    }
    if strength >= 1.0 {
        current.copy_from_slice(learned);
        return;
    }
    for (w, l) in current.iter_mut().zip(learned) {
        *w = (1.0 - strength) * *w + strength * l;
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_random_within_limit() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let w = random(&mut rng, 1.0, 256);
        assert_eq!(w.len(), 256);
        assert!(w.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_blx_alpha_zero_stays_between_parents() {
        let mut rng = Pcg64Mcg::seed_from_u64(11);
        let p1 = [-1.0, 0.0, 2.0];
        let p2 = [1.0, 0.0, 3.0];
        for _ in 0..32 {
            let child = blx_alpha(&p1, &p2, 0.0, 4.0, &mut rng);
            assert!((-1.0..=1.0).contains(&child[0]));
            assert_eq!(child[1], 0.0);
            assert!((2.0..=3.0).contains(&child[2]));
        }
    }

    #[test]
    fn test_mutate_rate_zero_is_noop() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let mut w = vec![0.25; 16];
        mutate(&mut w, 1.0, 4.0, 0.0, &mut rng);
        assert_eq!(w, vec![0.25; 16]);
    }

    #[test]
    fn test_mutate_clamps_to_limit() {
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        let mut w = vec![0.9; 64];
        mutate(&mut w, 10.0, 1.0, 1.0, &mut rng);
        assert!(w.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_blend_zero_strength_is_bit_identical() {
        let original = [-0.0_f32, 1.5, -3.25, f32::MIN_POSITIVE];
        let mut current = original;
        blend(&mut current, &[1.0, 1.0, 1.0, 1.0], 0.0);
        for (a, b) in current.iter().zip(&original) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_blend_full_strength_copies_learned() {
        let mut current = [0.1, 0.2, 0.3];
        blend(&mut current, &[-2.0, 0.0, 2.0], 1.0);
        assert_eq!(current, [-2.0, 0.0, 2.0]);
    }
}
