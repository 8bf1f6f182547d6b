//! # keyshot
//!
//! Pick a handful of representative, visually diverse keyframes from a
//! video, for thumbnails and previews.
//!
//! `keyshot` combines two pieces, powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate:
//!
//! - a frame-accurate [`FrameCursor`] that indexes every frame of a video
//!   stream once and then seeks to exact frame numbers on top of the
//!   container's approximate seeking, detecting and resolving drift;
//! - a greedy [`KeyframeSelector`] that ranks candidate frames by luma
//!   entropy plus histogram distance to the frames already picked.
//!
//! ## Quick Start
//!
//! ### Extract keyframes
//!
//! ```no_run
//! use keyshot::{ExtractOptions, extract_keyframes_from_path};
//!
//! let options = ExtractOptions::new().with_keyframe_count(6);
//! let extraction = extract_keyframes_from_path("input.mp4", &options).unwrap();
//! for (n, keyframe) in extraction.keyframes.iter().enumerate() {
//!     keyframe.image.save(format!("keyframe-{n}.jpg")).unwrap();
//! }
//! ```
//!
//! ### Seek to an exact frame
//!
//! ```no_run
//! use keyshot::{FrameCursor, MediaFile, SeekDirection};
//!
//! let mut cursor = FrameCursor::new(MediaFile::open("input.mp4").unwrap()).unwrap();
//! cursor.seek_to(1200, SeekDirection::Exact).unwrap();
//! let image = cursor.picture().unwrap().to_image().unwrap();
//! image.save("frame-1200.png").unwrap();
//! ```
//!
//! ## Features
//!
//! - **Frame index**: dense, presentation-ordered table of every frame
//! - **Exact seeking**: `Forward`, `Backward` and `Exact` drift policies
//! - **Histogram metrics**: absolute, squared, chi-square,
//!   Kolmogorov-Smirnov and earth-mover distances
//! - **Candidate strategies**: uniform or random with minimum spacing
//! - **Crops**: letterbox/pillarbox removal and aspect-ratio center crops
//! - **Progress & cancellation**: callbacks and `CancellationToken`
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Histogram and diversity computation on the rayon pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod candidates;
pub mod configuration;
pub mod crop;
pub mod cursor;
pub mod distance;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod histogram;
pub mod index;
pub mod media;
pub mod metadata;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod selection;
pub mod source;
mod utilities;

pub use candidates::{generate_candidates, minimum_spacing, random_candidates, uniform_candidates};
pub use configuration::{CANDIDATES_PER_KEYFRAME, CandidateStrategy, DecodeMode, ExtractOptions};
pub use crop::{
    AspectRatio, aspect_crop, crop_borders_horizontal, crop_borders_vertical,
    detect_horizontal_border, detect_vertical_border,
};
pub use cursor::{CursorState, FrameCursor, SHORT_HOP_THRESHOLD, SeekDirection, SeekOutcome};
pub use distance::HistogramDistance;
pub use error::KeyshotError;
pub use extract::{Extraction, Keyframe, RankedFrame, extract_keyframes, extract_keyframes_from_path};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use ffmpeg_next::Rational;
pub use histogram::{Histogram, LUMA_BINS};
pub use index::{FrameIndex, FrameRecord, GroupOfPicturesSummary};
pub use media::MediaFile;
pub use metadata::VideoMetadata;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use selection::{Candidate, KeyframeSelector, Ranking};
pub use source::{Picture, SourcePacket, VideoSource};
pub use utilities::{pts_to_duration, pts_to_seconds};
