//! Error types for the `keyshot` crate.
//!
//! This module defines [`KeyshotError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context (paths,
//! frame numbers, timestamps, upstream messages) to diagnose a failure
//! without additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::cursor::SeekDirection;

/// The unified error type for all `keyshot` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyshotError {
    /// The media file could not be opened or its container was not recognised.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video stream exists but no decoder could be opened for it.
    #[error("No decoder available for video stream {stream_index}: {reason}")]
    NoDecoder {
        /// Container index of the video stream.
        stream_index: usize,
        /// Underlying reason the decoder could not be opened.
        reason: String,
    },

    /// Reading packets failed while building the frame index.
    #[error("Failed to scan video stream: {0}")]
    Scan(String),

    /// The container refused an approximate seek.
    #[error("Failed to seek to timestamp {timestamp}: {reason}")]
    Seek {
        /// Target timestamp in stream time base.
        timestamp: i64,
        /// Underlying reason the seek failed.
        reason: String,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The requested frame number exceeds the frame index.
    #[error("Frame {frame_number} is out of range (video has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The number of frames in the index.
        total_frames: u64,
    },

    /// A histogram value lies outside the histogram's range.
    #[error("Histogram value {value} is out of range [{low}, {high}]")]
    HistogramValueOutOfRange {
        /// The offending value.
        value: i32,
        /// Lowest value the histogram accepts.
        low: i32,
        /// Highest value the histogram accepts.
        high: i32,
    },

    /// A histogram was divided by zero.
    #[error("Cannot divide histogram by zero")]
    DivideByZero,

    /// Two histograms passed to a distance metric are not comparable.
    #[error(
        "Histogram mismatch: [{left_low}, {left_high}] with mass {left_mass} vs \
         [{right_low}, {right_high}] with mass {right_mass}"
    )]
    RangeMismatch {
        /// Lowest value of the left histogram.
        left_low: i32,
        /// Highest value of the left histogram.
        left_high: i32,
        /// Total mass of the left histogram.
        left_mass: f64,
        /// Lowest value of the right histogram.
        right_low: i32,
        /// Highest value of the right histogram.
        right_high: i32,
        /// Total mass of the right histogram.
        right_mass: f64,
    },

    /// A seek could not reconcile the decoded timestamp with the frame index
    /// under the requested direction policy.
    #[error(
        "Cannot resolve frame {frame_number} (expected pts {expected_pts}, decoded {decoded_pts:?}) \
         with direction {direction:?}"
    )]
    UnresolvableDrift {
        /// The frame number the seek targeted.
        frame_number: u64,
        /// Presentation timestamp recorded in the index for that frame.
        expected_pts: i64,
        /// Timestamp of the picture the decoder produced instead, if any.
        decoded_pts: Option<i64>,
        /// Direction policy that could not be satisfied.
        direction: SeekDirection,
    },

    /// The frame index of the loaded stream is empty.
    #[error("The video stream contains no indexable frames")]
    EmptyFrameIndex,

    /// The cursor was closed and can no longer decode.
    #[error("Frame cursor is closed")]
    CursorClosed,

    /// Keyframe selection was asked to work on an empty set.
    #[error("Cannot select {keyframes} keyframe(s) from {candidates} candidate(s)")]
    EmptySelection {
        /// Number of candidates supplied.
        candidates: usize,
        /// Number of keyframes requested.
        keyframes: usize,
    },

    /// Random candidate generation ran out of frames before reaching the
    /// requested count.
    #[error(
        "Only {accepted} of {requested} candidates fit into {total_frames} frames with the required spacing"
    )]
    CandidatePoolExhausted {
        /// Number of candidates requested.
        requested: usize,
        /// Number of candidates accepted before the pool ran dry.
        accepted: usize,
        /// Number of frames in the video.
        total_frames: u64,
    },

    /// An aspect ratio string could not be parsed or has a zero component.
    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(String),

    /// A luma buffer does not match the declared picture dimensions.
    #[error("Luma buffer has {actual} samples, expected {width}x{height}")]
    InvalidLumaBuffer {
        /// Declared picture width.
        width: u32,
        /// Declared picture height.
        height: u32,
        /// Number of samples actually supplied.
        actual: usize,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during export or conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for KeyshotError {
    fn from(error: FfmpegError) -> Self {
        KeyshotError::FfmpegError(error.to_string())
    }
}
