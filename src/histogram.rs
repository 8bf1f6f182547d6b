//! Fixed-range frequency tables over pixel intensities.
//!
//! A [`Histogram`] counts (optionally weighted) occurrences of integer values
//! in an inclusive `[low, high]` range. After [`normalize`](Histogram::normalize)
//! with its own total mass it becomes a probability distribution, which is
//! what the [`distance`](crate::distance) metrics and
//! [`entropy`](Histogram::entropy) expect.
//!
//! # Example
//!
//! ```
//! use keyshot::Histogram;
//!
//! let mut histogram = Histogram::new(0, 255);
//! histogram.count(16)?;
//! histogram.count(235)?;
//! histogram.normalize(histogram.total_mass())?;
//!
//! assert_eq!(histogram.get(16)?, 0.5);
//! assert_eq!(histogram.entropy(), 1.0);
//! # Ok::<(), keyshot::KeyshotError>(())
//! ```

use crate::error::KeyshotError;

/// Number of bins in a luma histogram (8-bit samples).
pub const LUMA_BINS: usize = 256;

/// A frequency table over the integer values `low..=high`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    low: i32,
    high: i32,
    bins: Vec<f64>,
    total: f64,
}

impl Histogram {
    /// Create a zeroed histogram covering `low..=high`.
    ///
    /// If `high < low` the bounds are swapped.
    pub fn new(low: i32, high: i32) -> Self {
        let (low, high) = if high < low { (high, low) } else { (low, high) };
        let length = (i64::from(high) - i64::from(low) + 1) as usize;
        Self {
            low,
            high,
            bins: vec![0.0; length],
            total: 0.0,
        }
    }

    /// Build a normalized 256-bin histogram from 8-bit luma samples.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::DivideByZero`] if `samples` is empty.
    pub fn from_luma(samples: &[u8]) -> Result<Self, KeyshotError> {
        let mut histogram = Self::new(0, (LUMA_BINS - 1) as i32);
        for &sample in samples {
            histogram.bins[sample as usize] += 1.0;
        }
        histogram.total = samples.len() as f64;
        histogram.normalize(histogram.total)?;
        Ok(histogram)
    }

    /// Lowest value this histogram accepts.
    pub fn low(&self) -> i32 {
        self.low
    }

    /// Highest value this histogram accepts.
    pub fn high(&self) -> i32 {
        self.high
    }

    /// Number of bins (`high - low + 1`).
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Sum of all bins.
    pub fn total_mass(&self) -> f64 {
        self.total
    }

    /// Bin masses, ordered by value starting at [`low`](Histogram::low).
    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Add one occurrence of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::HistogramValueOutOfRange`] if `value` lies
    /// outside `low..=high`.
    pub fn count(&mut self, value: i32) -> Result<(), KeyshotError> {
        self.count_weighted(value, 1.0)
    }

    /// Add `weight` to the bin of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::HistogramValueOutOfRange`] if `value` lies
    /// outside `low..=high`.
    pub fn count_weighted(&mut self, value: i32, weight: f64) -> Result<(), KeyshotError> {
        let slot = self.slot(value)?;
        self.bins[slot] += weight;
        self.total += weight;
        Ok(())
    }

    /// Mass of the bin holding `value`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::HistogramValueOutOfRange`] if `value` lies
    /// outside `low..=high`.
    pub fn get(&self, value: i32) -> Result<f64, KeyshotError> {
        let slot = self.slot(value)?;
        Ok(self.bins[slot])
    }

    /// Divide every bin and the total mass by `divisor`.
    ///
    /// Passing [`total_mass`](Histogram::total_mass) turns the table into a
    /// probability distribution.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::DivideByZero`] if `divisor` is zero.
    pub fn normalize(&mut self, divisor: f64) -> Result<(), KeyshotError> {
        if divisor == 0.0 {
            return Err(KeyshotError::DivideByZero);
        }
        for bin in &mut self.bins {
            *bin /= divisor;
        }
        self.total /= divisor;
        Ok(())
    }

    /// Zero every bin, keeping the range.
    pub fn reset(&mut self) {
        self.bins.fill(0.0);
        self.total = 0.0;
    }

    /// Shannon entropy in bits, `-sum(p * log2(p))` over non-empty bins.
    ///
    /// Only meaningful for a normalized histogram, where the result lies in
    /// `[0, log2(bin_count)]`.
    pub fn entropy(&self) -> f64 {
        self.bins
            .iter()
            .filter(|&&p| p != 0.0)
            .map(|&p| -p * p.log2())
            .sum()
    }

    /// `true` if `other` covers the same value range.
    pub fn same_range(&self, other: &Histogram) -> bool {
        self.low == other.low && self.high == other.high
    }

    fn slot(&self, value: i32) -> Result<usize, KeyshotError> {
        if value < self.low || value > self.high {
            return Err(KeyshotError::HistogramValueOutOfRange {
                value,
                low: self.low,
                high: self.high,
            });
        }
        Ok((i64::from(value) - i64::from(self.low)) as usize)
    }
}
