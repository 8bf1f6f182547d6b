//! Parallel feature extraction and diversity scoring.
//!
//! Decoding stays on the cursor's thread; only the per-picture histogram
//! work and the per-round distance computation are spread across the rayon
//! pool. Each value is computed independently, so results match the
//! sequential path exactly.

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::distance::HistogramDistance;
use crate::error::KeyshotError;
use crate::histogram::Histogram;
use crate::source::Picture;

/// Normalized luma histogram of every picture, in input order.
pub(crate) fn luma_histograms(pictures: &[&Picture]) -> Result<Vec<Histogram>, KeyshotError> {
    pictures
        .par_iter()
        .map(|picture| {
            let samples = picture.luma_samples()?;
            Histogram::from_luma(&samples)
        })
        .collect()
}

/// Distance from each of `histograms` to `reference`, in input order.
pub(crate) fn distances_to(
    metric: HistogramDistance,
    reference: &Histogram,
    histograms: &[&Histogram],
) -> Result<Vec<f64>, KeyshotError> {
    histograms
        .par_iter()
        .map(|histogram| metric.diff(histogram, reference))
        .collect()
}
