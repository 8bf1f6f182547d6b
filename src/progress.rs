//! Progress callbacks and cooperative cancellation.
//!
//! An extraction runs in three stages, named by [`OperationType`]. Each
//! stage reports [`ProgressInfo`] snapshots to the [`ProgressCallback`]
//! attached to [`ExtractOptions`], and checks the options'
//! [`CancellationToken`] between units of work.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyshot::{
//!     ExtractOptions, FrameCursor, KeyshotError, MediaFile, OperationType, ProgressCallback,
//!     ProgressInfo, extract_keyframes,
//! };
//!
//! struct StageLogger;
//!
//! impl ProgressCallback for StageLogger {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if info.operation == OperationType::CandidateDecoding {
//!             eprintln!("decoded {} of {:?} candidates", info.current, info.total);
//!         }
//!     }
//! }
//!
//! let mut cursor = FrameCursor::new(MediaFile::open("input.mp4")?)?;
//! let options = ExtractOptions::new().with_progress(Arc::new(StageLogger));
//! extract_keyframes(&mut cursor, &options)?;
//! # Ok::<(), KeyshotError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::configuration::ExtractOptions;

/// Stage of a keyframe extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Reading every packet to build the frame index. The total is unknown.
    IndexScan,
    /// Decoding candidate frames. The total is the candidate count.
    CandidateDecoding,
    /// Converting and cropping the picked keyframes. The total is the
    /// keyframe count.
    Selection,
}

/// One progress report.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub operation: OperationType,
    /// Items finished in this stage.
    pub current: u64,
    pub total: Option<u64>,
    /// `current / total` as a percentage, when the total is known and non-zero.
    pub percentage: Option<f32>,
    /// Time since the stage started.
    pub elapsed: Duration,
    /// Frame that completed the latest item, if the stage works on frames.
    pub current_frame: Option<u64>,
    /// Presentation time of `current_frame`, when known.
    pub current_timestamp: Option<Duration>,
}

/// Receives [`ProgressInfo`] reports.
///
/// Callbacks only observe; use a [`CancellationToken`] to stop a run.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Callback installed when none is configured.
pub(crate) struct Silent;

impl ProgressCallback for Silent {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared flag asking a running extraction to stop with
/// [`KeyshotError::Cancelled`](crate::KeyshotError::Cancelled).
///
/// Clones share the flag, so one clone can be handed to another thread.
///
/// ```
/// use keyshot::CancellationToken;
///
/// let token = CancellationToken::new();
/// let remote = token.clone();
/// remote.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counts finished items of one stage and reports every `batch_size` of
/// them, plus once more on [`finish`](ProgressTracker::finish).
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    batch_size: u64,
    current: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn start(
        options: &ExtractOptions,
        operation: OperationType,
        total: Option<u64>,
    ) -> Self {
        Self {
            callback: options.progress.clone(),
            operation,
            total,
            batch_size: options.batch_size.max(1),
            current: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn advance(&mut self, frame_number: Option<u64>, timestamp: Option<Duration>) {
        self.current += 1;
        if self.current % self.batch_size == 0 {
            self.report(frame_number, timestamp);
        }
    }

    pub(crate) fn finish(&mut self) {
        self.report(None, None);
    }

    fn report(&self, current_frame: Option<u64>, current_timestamp: Option<Duration>) {
        let percentage = match self.total {
            Some(total) if total > 0 => Some(self.current as f32 * 100.0 / total as f32),
            _ => None,
        };
        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.started.elapsed(),
            current_frame,
            current_timestamp,
        });
    }
}
