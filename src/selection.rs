//! Greedy diversity ranking of candidate frames.
//!
//! Each round scores every remaining candidate as
//! `entropy + min_diversity`, where `min_diversity` is the smallest
//! histogram distance to any frame picked so far (the metric's maximum
//! before the first pick, so the first pick is the most detailed frame).
//! The best candidate is moved to the picks and the process repeats until
//! no candidates remain.
//!
//! The result is a [`Ranking`] of every candidate. Its first
//! [`keyframe_count`](KeyframeSelector::keyframe_count) picks are the
//! selected keyframes.
//!
//! # Example
//!
//! ```
//! use keyshot::{Candidate, Histogram, HistogramDistance, KeyframeSelector};
//!
//! let dark = Histogram::from_luma(&[10, 20, 30, 40])?;
//! let bright = Histogram::from_luma(&[200, 210, 220, 230])?;
//! let candidates = vec![
//!     Candidate::new(0, dark.clone(), ()),
//!     Candidate::new(1, dark, ()),
//!     Candidate::new(2, bright, ()),
//! ];
//!
//! let ranking = KeyframeSelector::new(2)
//!     .with_metric(HistogramDistance::AbsoluteError)
//!     .rank(candidates)?;
//! let picked: Vec<u64> = ranking.keyframes().map(|c| c.frame_number()).collect();
//! assert_eq!(picked, vec![0, 2]);
//! # Ok::<(), keyshot::KeyshotError>(())
//! ```

use crate::distance::HistogramDistance;
use crate::error::KeyshotError;
use crate::histogram::Histogram;

/// A frame competing for selection, with its features and the scores of
/// the round it was picked in.
#[derive(Debug, Clone)]
pub struct Candidate<P> {
    frame_number: u64,
    histogram: Histogram,
    entropy: f64,
    min_diversity: f64,
    score: f64,
    payload: P,
}

impl<P> Candidate<P> {
    /// Create a candidate, computing entropy from `histogram`.
    ///
    /// `histogram` should be normalized.
    pub fn new(frame_number: u64, histogram: Histogram, payload: P) -> Self {
        let entropy = histogram.entropy();
        Self::with_entropy(frame_number, histogram, entropy, payload)
    }

    /// Create a candidate with a precomputed entropy.
    pub fn with_entropy(frame_number: u64, histogram: Histogram, entropy: f64, payload: P) -> Self {
        Self {
            frame_number,
            histogram,
            entropy,
            min_diversity: 0.0,
            score: 0.0,
            payload,
        }
    }

    /// Frame number in the video's frame index.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Normalized luma histogram.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Shannon entropy of the histogram, in bits.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    /// Smallest distance to the frames picked before this one.
    pub fn min_diversity(&self) -> f64 {
        self.min_diversity
    }

    /// `entropy + min_diversity` in the round this candidate was picked.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Attached data (usually the decoded picture).
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Take the attached data, dropping the features.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Greedy max-min diversity selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyframeSelector {
    metric: HistogramDistance,
    keyframe_count: usize,
}

impl KeyframeSelector {
    /// Selector returning `keyframe_count` keyframes, using the default metric.
    pub fn new(keyframe_count: usize) -> Self {
        Self {
            metric: HistogramDistance::default(),
            keyframe_count,
        }
    }

    /// Use `metric` to compare histograms.
    pub fn with_metric(mut self, metric: HistogramDistance) -> Self {
        self.metric = metric;
        self
    }

    /// Distance metric.
    pub fn metric(&self) -> HistogramDistance {
        self.metric
    }

    /// Number of keyframes selected.
    pub fn keyframe_count(&self) -> usize {
        self.keyframe_count
    }

    /// Rank every candidate.
    ///
    /// Ties on score go to the lowest frame number, so the result only
    /// depends on the candidate set, not on its order.
    ///
    /// # Errors
    ///
    /// - [`KeyshotError::EmptySelection`] if there are no candidates or no
    ///   keyframes were requested.
    /// - [`KeyshotError::RangeMismatch`] if candidate histograms are not
    ///   comparable.
    pub fn rank<P>(&self, mut candidates: Vec<Candidate<P>>) -> Result<Ranking<P>, KeyshotError> {
        if candidates.is_empty() || self.keyframe_count == 0 {
            return Err(KeyshotError::EmptySelection {
                candidates: candidates.len(),
                keyframes: self.keyframe_count,
            });
        }

        log::debug!(
            "Ranking {} candidates with {} metric",
            candidates.len(),
            self.metric
        );

        for candidate in &mut candidates {
            candidate.min_diversity = self.metric.max_error();
        }

        let mut picks: Vec<Candidate<P>> = Vec::with_capacity(candidates.len());
        while !candidates.is_empty() {
            if let Some(previous) = picks.last() {
                update_min_diversity(self.metric, previous.histogram(), &mut candidates)?;
            }

            for candidate in &mut candidates {
                candidate.score = candidate.entropy + candidate.min_diversity;
            }

            let best = best_position(&candidates);
            let pick = candidates.swap_remove(best);
            log::debug!(
                "Pick {}: frame {} (entropy {:.4}, diversity {:.4})",
                picks.len(),
                pick.frame_number,
                pick.entropy,
                pick.min_diversity
            );
            picks.push(pick);
        }

        picks.reverse();
        Ok(Ranking {
            entries: picks,
            keyframe_count: self.keyframe_count,
        })
    }
}

impl Default for KeyframeSelector {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Every candidate ordered from least to most valuable.
///
/// The most valuable entry is the first greedy pick; the selected keyframes
/// are the last `keyframe_count` entries.
#[derive(Debug, Clone)]
pub struct Ranking<P> {
    entries: Vec<Candidate<P>>,
    keyframe_count: usize,
}

impl<P> Ranking<P> {
    /// Entries from least to most valuable.
    pub fn entries(&self) -> &[Candidate<P>] {
        &self.entries
    }

    /// Number of ranked candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing was ranked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keyframes this ranking selects (at most [`len`](Ranking::len)).
    pub fn keyframe_count(&self) -> usize {
        self.keyframe_count.min(self.entries.len())
    }

    /// Entries in the order they were picked.
    pub fn picks(&self) -> impl DoubleEndedIterator<Item = &Candidate<P>> {
        self.entries.iter().rev()
    }

    /// The selected keyframes, in pick order.
    pub fn keyframes(&self) -> impl Iterator<Item = &Candidate<P>> {
        self.picks().take(self.keyframe_count())
    }

    /// Split into (keyframes, remaining candidates), both in pick order.
    pub fn into_parts(self) -> (Vec<Candidate<P>>, Vec<Candidate<P>>) {
        let count = self.keyframe_count();
        let mut picks = self.entries;
        picks.reverse();
        let rest = picks.split_off(count);
        (picks, rest)
    }
}

/// Lower each candidate's `min_diversity` to its distance to `pick`.
fn update_min_diversity<P>(
    metric: HistogramDistance,
    pick: &Histogram,
    candidates: &mut [Candidate<P>],
) -> Result<(), KeyshotError> {
    #[cfg(feature = "rayon")]
    {
        let histograms: Vec<&Histogram> = candidates.iter().map(Candidate::histogram).collect();
        let distances = crate::rayon::distances_to(metric, pick, &histograms)?;
        for (candidate, distance) in candidates.iter_mut().zip(distances) {
            candidate.min_diversity = candidate.min_diversity.min(distance);
        }
    }

    #[cfg(not(feature = "rayon"))]
    for candidate in candidates.iter_mut() {
        let distance = metric.diff(&candidate.histogram, pick)?;
        candidate.min_diversity = candidate.min_diversity.min(distance);
    }

    Ok(())
}

/// Position of the highest score, lowest frame number on ties.
fn best_position<P>(candidates: &[Candidate<P>]) -> usize {
    let mut best = 0;
    for (position, candidate) in candidates.iter().enumerate().skip(1) {
        let current = &candidates[best];
        if candidate.score > current.score
            || (candidate.score == current.score && candidate.frame_number < current.frame_number)
        {
            best = position;
        }
    }
    best
}
