//! Candidate frame numbers for keyframe selection.
//!
//! Two strategies are available: evenly spaced ([`uniform_candidates`]) and
//! random with a guaranteed minimum spacing ([`random_candidates`]). Both
//! return frame numbers in generation order; callers decoding through a
//! [`FrameCursor`](crate::FrameCursor) should sort them first.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::configuration::CandidateStrategy;
use crate::error::KeyshotError;

/// Generate `count` candidate frame numbers out of `total_frames` using
/// `strategy`.
///
/// # Errors
///
/// Returns [`KeyshotError::CandidatePoolExhausted`] if the random strategy
/// cannot place `count` frames with the required spacing.
pub fn generate_candidates(
    strategy: CandidateStrategy,
    total_frames: u64,
    count: usize,
) -> Result<Vec<u64>, KeyshotError> {
    match strategy {
        CandidateStrategy::Uniform => Ok(uniform_candidates(total_frames, count)),
        CandidateStrategy::Random { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            random_candidates(total_frames, count, &mut rng)
        }
    }
}

/// Evenly spaced frame numbers `i * total_frames / (count + 1)` for
/// `i` in `1..=count`.
///
/// The last frame is never chosen, and the first only when `count` is not
/// smaller than `total_frames`. Repeated frame numbers are collapsed.
pub fn uniform_candidates(total_frames: u64, count: usize) -> Vec<u64> {
    let divisor = count as u128 + 1;
    let mut frames: Vec<u64> = (1..=count as u128)
        .map(|i| (i * u128::from(total_frames) / divisor) as u64)
        .collect();
    frames.dedup();
    frames
}

/// Minimum distance in frames between two random candidates:
/// `total_frames / (count * 4)`.
pub fn minimum_spacing(total_frames: u64, count: usize) -> u64 {
    match count {
        0 => total_frames,
        count => total_frames / (count as u64).saturating_mul(4),
    }
}

/// Draw `count` distinct frame numbers uniformly at random, keeping every
/// pair at least [`minimum_spacing`] frames apart.
///
/// After each draw, every frame closer than the spacing to the accepted one
/// is removed from the pool.
///
/// # Errors
///
/// Returns [`KeyshotError::CandidatePoolExhausted`] if the pool empties
/// before `count` frames were accepted.
pub fn random_candidates<R: Rng + ?Sized>(
    total_frames: u64,
    count: usize,
    rng: &mut R,
) -> Result<Vec<u64>, KeyshotError> {
    let spacing = minimum_spacing(total_frames, count);
    let mut pool: Vec<u64> = (0..total_frames).collect();
    let mut accepted = Vec::with_capacity(count);

    log::debug!("Drawing {count} random candidates from {total_frames} frames (spacing {spacing})");

    while accepted.len() < count {
        if pool.is_empty() {
            return Err(KeyshotError::CandidatePoolExhausted {
                requested: count,
                accepted: accepted.len(),
                total_frames,
            });
        }
        let frame = pool[rng.gen_range(0..pool.len())];
        pool.retain(|&other| other != frame && other.abs_diff(frame) >= spacing);
        accepted.push(frame);
    }

    Ok(accepted)
}
