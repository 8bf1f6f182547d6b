//! Pairwise dissimilarity between normalized histograms.
//!
//! [`HistogramDistance`] is a closed set of metrics. Every metric requires both
//! histograms to cover the same value range and carry the same total mass
//! (normally both normalized to 1.0) and returns a value in
//! `[min_error(), max_error()]`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::KeyshotError;
use crate::histogram::Histogram;

/// Relative tolerance used when comparing the total mass of two histograms.
const MASS_TOLERANCE: f64 = 1e-9;

/// A histogram distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HistogramDistance {
    /// `sum(|a - b|) / (2 * mass)`.
    #[default]
    AbsoluteError,
    /// `sum(((a - b) / mass)^2) / 2`.
    SquaredError,
    /// Mean of `((a - b) / (a + b))^2` over all bins, skipping bins where both are empty.
    ChiSquare,
    /// Largest absolute difference between the cumulative sums, over mass.
    KolmogorovSmirnov,
    /// Accumulated transport cost of moving `a` onto `b` over the value axis.
    EarthMoverDistance,
}

impl HistogramDistance {
    /// Every available metric.
    pub const ALL: [HistogramDistance; 5] = [
        HistogramDistance::AbsoluteError,
        HistogramDistance::SquaredError,
        HistogramDistance::ChiSquare,
        HistogramDistance::KolmogorovSmirnov,
        HistogramDistance::EarthMoverDistance,
    ];

    /// Human-readable metric name.
    pub fn name(self) -> &'static str {
        match self {
            HistogramDistance::AbsoluteError => "absolute error",
            HistogramDistance::SquaredError => "squared error",
            HistogramDistance::ChiSquare => "chi square",
            HistogramDistance::KolmogorovSmirnov => "Kolmogorov-Smirnov",
            HistogramDistance::EarthMoverDistance => "earth-mover distance",
        }
    }

    /// Smallest value [`diff`](HistogramDistance::diff) can return.
    pub fn min_error(self) -> f64 {
        0.0
    }

    /// Largest value [`diff`](HistogramDistance::diff) can return.
    pub fn max_error(self) -> f64 {
        1.0
    }

    /// Distance between `a` and `b`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::RangeMismatch`] if the histograms differ in
    /// range or total mass, and [`KeyshotError::DivideByZero`] if their mass
    /// is zero.
    pub fn diff(self, a: &Histogram, b: &Histogram) -> Result<f64, KeyshotError> {
        check_comparable(a, b)?;

        let mass = a.total_mass();
        let bin_count = a.bin_count() as f64;
        let pairs = a.bins().iter().zip(b.bins());

        let distance = match self {
            HistogramDistance::AbsoluteError => {
                nonzero(mass)?;
                pairs.map(|(x, y)| (x - y).abs()).sum::<f64>() / (2.0 * mass)
            }
            HistogramDistance::SquaredError => {
                nonzero(mass)?;
                pairs
                    .map(|(x, y)| {
                        let diff = (x - y) / mass;
                        diff * diff
                    })
                    .sum::<f64>()
                    / 2.0
            }
            HistogramDistance::ChiSquare => {
                let error: f64 = pairs
                    .filter(|(x, y)| *x + *y != 0.0)
                    .map(|(x, y)| {
                        let ratio = (x - y) / (x + y);
                        ratio * ratio
                    })
                    .sum();
                error / bin_count
            }
            HistogramDistance::KolmogorovSmirnov => {
                nonzero(mass)?;
                let mut sum_a = 0.0;
                let mut sum_b = 0.0;
                let mut largest: f64 = 0.0;
                for (x, y) in pairs {
                    sum_a += x;
                    sum_b += y;
                    largest = largest.max((sum_a - sum_b).abs());
                }
                largest / mass
            }
            HistogramDistance::EarthMoverDistance => {
                nonzero(mass)?;
                // The last bin never moves: everything left over has arrived.
                let mut to_move = 0.0;
                let mut work = 0.0;
                for (x, y) in pairs.take(a.bin_count().saturating_sub(1)) {
                    to_move += x - y;
                    work += f64::abs(to_move);
                }
                work / (bin_count * mass)
            }
        };

        Ok(distance.clamp(self.min_error(), self.max_error()))
    }
}

impl Display for HistogramDistance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for HistogramDistance {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "absolute" | "absoluteerror" | "abs" => Ok(HistogramDistance::AbsoluteError),
            "squared" | "squarederror" => Ok(HistogramDistance::SquaredError),
            "chisquare" | "chi2" => Ok(HistogramDistance::ChiSquare),
            "kolmogorovsmirnov" | "ks" => Ok(HistogramDistance::KolmogorovSmirnov),
            "earthmover" | "earthmoverdistance" | "emd" => {
                Ok(HistogramDistance::EarthMoverDistance)
            }
            other => Err(format!("unknown histogram distance: {other}")),
        }
    }
}

fn check_comparable(a: &Histogram, b: &Histogram) -> Result<(), KeyshotError> {
    let mass_a = a.total_mass();
    let mass_b = b.total_mass();
    let scale = mass_a.abs().max(mass_b.abs()).max(1.0);
    if !a.same_range(b) || (mass_a - mass_b).abs() > MASS_TOLERANCE * scale {
        return Err(KeyshotError::RangeMismatch {
            left_low: a.low(),
            left_high: a.high(),
            left_mass: mass_a,
            right_low: b.low(),
            right_high: b.high(),
            right_mass: mass_b,
        });
    }
    Ok(())
}

fn nonzero(mass: f64) -> Result<(), KeyshotError> {
    if mass == 0.0 {
        Err(KeyshotError::DivideByZero)
    } else {
        Ok(())
    }
}
