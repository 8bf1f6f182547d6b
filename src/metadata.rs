//! Video stream metadata.
//!
//! [`VideoMetadata`] is read once when a [`MediaFile`](crate::MediaFile) is
//! opened and cached for its lifetime.

use std::time::Duration;

use ffmpeg_next::Rational;

/// Metadata for the selected video stream.
///
/// # Example
///
/// ```no_run
/// use keyshot::MediaFile;
///
/// let media = MediaFile::open("input.mp4").unwrap();
/// let metadata = media.metadata();
/// println!("{}x{} {} @ {:.2} fps", metadata.width, metadata.height, metadata.codec,
///     metadata.frames_per_second);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second (approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
    /// Time base of the stream's timestamps.
    pub time_base: Rational,
    /// Declared start time of the stream in time base units, if known.
    pub start_time: Option<i64>,
    /// Container duration.
    pub duration: Duration,
    /// Container index of the stream.
    pub stream_index: usize,
}
