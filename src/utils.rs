//! Shared numeric helpers.
//!
//! Random-index shuffling and permanence sampling used across the spatial
//! and temporal poolers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Return the minimum of two values.
///
/// # Examples
///
/// ```
/// use corticore::utils::min;
///
/// assert_eq!(min(5, 10), 5);
/// assert_eq!(min(10, 5), 5);
/// ```
#[inline]
pub fn min<T: Ord>(a: T, b: T) -> T {
    if a < b {
        a
    } else {
        b
    }
}

/// Return the maximum of two values.
///
/// # Examples
///
/// ```
/// use corticore::utils::max;
///
/// assert_eq!(max(5, 10), 10);
/// assert_eq!(max(10, 5), 10);
/// ```
#[inline]
pub fn max<T: Ord>(a: T, b: T) -> T {
    if a > b {
        a
    } else {
        b
    }
}

/// Generate a random unsigned integer in range [min, max] (inclusive).
///
/// # Examples
///
/// ```
/// use corticore::utils::rand_uint;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let val = rand_uint(10, 20, &mut rng);
/// assert!(val >= 10 && val <= 20);
/// ```
#[inline]
pub fn rand_uint<R: Rng>(min: u32, max: u32, rng: &mut R) -> u32 {
    rng.gen_range(min..=max)
}

/// Shuffle a slice of u32 values in-place using Fisher-Yates algorithm.
///
/// This is a partial shuffle - only the first `n` elements are shuffled.
/// If `n >= arr.len()`, all elements are shuffled.
///
/// # Arguments
///
/// * `arr` - Mutable slice to shuffle
/// * `n` - Number of elements to shuffle
/// * `rng` - Random number generator
///
/// # Examples
///
/// ```
/// use corticore::utils::shuffle;
/// use rand::SeedableRng;
///
/// let mut arr = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// shuffle(&mut arr, 10, &mut rng);
/// // arr is now shuffled
/// ```
pub fn shuffle<R: Rng>(arr: &mut [u32], n: usize, rng: &mut R) {
    let n = min(n, arr.len());
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        arr.swap(i, j);
    }
}

/// Shuffle a vector of usize values in-place using Fisher-Yates algorithm.
///
/// This is a convenience wrapper for shuffling usize vectors, which are
/// commonly used for index manipulation.
///
/// # Examples
///
/// ```
/// use corticore::utils::shuffle_indices;
/// use rand::SeedableRng;
///
/// let mut indices = vec![0, 1, 2, 3, 4];
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// shuffle_indices(&mut indices, &mut rng);
/// // indices is now shuffled
/// ```
pub fn shuffle_indices<R: Rng>(arr: &mut [usize], rng: &mut R) {
    for i in (1..arr.len()).rev() {
        let j = rng.gen_range(0..=i);
        arr.swap(i, j);
    }
}

/// Sample a permanence value from a Normal(mean, stddev) distribution,
/// clipped to `[lo, hi]`.
///
/// Used to initialise proximal synapse permanences around the connected
/// threshold so a realistic fraction start already-connected.
pub fn clipped_normal<R: Rng>(mean: f64, stddev: f64, lo: f64, hi: f64, rng: &mut R) -> f64 {
    let dist = Normal::new(mean, stddev).expect("stddev must be finite and positive");
    dist.sample(rng).clamp(lo, hi)
}

/// Build a per-invocation PRNG from a host-supplied `(u32, u32)` seed pair.
///
/// Mirrors the original engine's pattern of seeding an ephemeral kernel-side
/// RNG from two host-generated words on every call that needs randomness
/// (refine, init, active-state segment sampling) rather than relying on a
/// stateful device RNG (spec.md §9).
pub fn seeded_rng(seed: (u32, u32)) -> StdRng {
    let mut bytes = [0u8; 32];
    bytes[0..4].copy_from_slice(&seed.0.to_le_bytes());
    bytes[4..8].copy_from_slice(&seed.1.to_le_bytes());
    StdRng::from_seed(bytes)
}
