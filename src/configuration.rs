//! Keyframe extraction settings.
//!
//! [`ExtractOptions`] is a builder that threads the selection parameters,
//! post-processing crops, progress callbacks and cancellation tokens
//! through [`extract_keyframes`](crate::extract_keyframes) without
//! polluting its signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyshot::{
//!     AspectRatio, CancellationToken, CandidateStrategy, ExtractOptions,
//!     HistogramDistance, KeyshotError, ProgressCallback, ProgressInfo,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_keyframe_count(8)
//!     .with_strategy(CandidateStrategy::Random { seed: Some(7) })
//!     .with_metric(HistogramDistance::ChiSquare)
//!     .with_border_crop(true, true)
//!     .with_aspect_crop("16:9".parse::<AspectRatio>()?)
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! # Ok::<(), KeyshotError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::crop::AspectRatio;
use crate::distance::HistogramDistance;
use crate::progress::{CancellationToken, ProgressCallback, Silent};

/// Candidates examined per requested keyframe when no explicit candidate
/// count is set.
pub const CANDIDATES_PER_KEYFRAME: usize = 2;

/// How candidate frame numbers are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateStrategy {
    /// Evenly spaced over the whole video. This is the default.
    #[default]
    Uniform,
    /// Random frames with a minimum spacing. A fixed seed makes the draw
    /// reproducible.
    Random {
        /// Seed for the random generator; `None` seeds from the OS.
        seed: Option<u64>,
    },
}

/// How candidate pictures are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Seek to each candidate, settling forward when a frame cannot be
    /// decoded exactly. This is the default.
    #[default]
    Seek,
    /// Decode the whole stream from the start without seeking. Slower, but
    /// works on files with broken seeking.
    Sequential,
}

/// Configuration for keyframe extraction.
///
/// All fields have sensible defaults: five keyframes chosen from ten
/// uniformly spaced candidates, compared with
/// [`HistogramDistance::AbsoluteError`], no cropping.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) keyframe_count: usize,
    pub(crate) candidate_count: Option<usize>,
    pub(crate) strategy: CandidateStrategy,
    pub(crate) metric: HistogramDistance,
    pub(crate) decode_mode: DecodeMode,
    pub(crate) border_crop_vertical: bool,
    pub(crate) border_crop_horizontal: bool,
    pub(crate) aspect_crop: Option<AspectRatio>,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N items).
    pub(crate) batch_size: u64,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("keyframe_count", &self.keyframe_count)
            .field("candidate_count", &self.candidate_count())
            .field("strategy", &self.strategy)
            .field("metric", &self.metric)
            .field("decode_mode", &self.decode_mode)
            .field("border_crop_vertical", &self.border_crop_vertical)
            .field("border_crop_horizontal", &self.border_crop_horizontal)
            .field("aspect_crop", &self.aspect_crop)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            keyframe_count: 5,
            candidate_count: None,
            strategy: CandidateStrategy::Uniform,
            metric: HistogramDistance::AbsoluteError,
            decode_mode: DecodeMode::Seek,
            border_crop_vertical: false,
            border_crop_horizontal: false,
            aspect_crop: None,
            progress: Arc::new(Silent),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Number of keyframes to return.
    #[must_use]
    pub fn with_keyframe_count(mut self, count: usize) -> Self {
        self.keyframe_count = count;
        self
    }

    /// Number of candidate frames to examine. Defaults to
    /// [`CANDIDATES_PER_KEYFRAME`] per keyframe.
    #[must_use]
    pub fn with_candidate_count(mut self, count: usize) -> Self {
        self.candidate_count = Some(count);
        self
    }

    /// Candidate generation strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: CandidateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Histogram distance used for diversity.
    #[must_use]
    pub fn with_metric(mut self, metric: HistogramDistance) -> Self {
        self.metric = metric;
        self
    }

    /// How candidates are decoded.
    #[must_use]
    pub fn with_decode_mode(mut self, mode: DecodeMode) -> Self {
        self.decode_mode = mode;
        self
    }

    /// Enable letterbox (`vertical`) and pillarbox (`horizontal`) removal.
    #[must_use]
    pub fn with_border_crop(mut self, vertical: bool, horizontal: bool) -> Self {
        self.border_crop_vertical = vertical;
        self.border_crop_horizontal = horizontal;
        self
    }

    /// Center crop every keyframe to `ratio` after border removal.
    #[must_use]
    pub fn with_aspect_crop(mut self, ratio: AspectRatio) -> Self {
        self.aspect_crop = Some(ratio);
        self
    }

    /// Attach a progress callback.
    ///
    /// The callback is invoked every [`batch_size`](ExtractOptions::with_batch_size)
    /// items.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, extraction stops between candidates and
    /// returns [`KeyshotError::Cancelled`](crate::KeyshotError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Number of keyframes requested.
    pub fn keyframe_count(&self) -> usize {
        self.keyframe_count
    }

    /// Effective number of candidates.
    pub fn candidate_count(&self) -> usize {
        self.candidate_count
            .unwrap_or(self.keyframe_count.saturating_mul(CANDIDATES_PER_KEYFRAME))
    }

    /// Candidate generation strategy.
    pub fn strategy(&self) -> CandidateStrategy {
        self.strategy
    }

    /// Histogram distance metric.
    pub fn metric(&self) -> HistogramDistance {
        self.metric
    }

    /// Candidate decode mode.
    pub fn decode_mode(&self) -> DecodeMode {
        self.decode_mode
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
