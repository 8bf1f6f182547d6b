//! The keyframe extraction pipeline.
//!
//! [`extract_keyframes`] ties the pieces together: generate candidate frame
//! numbers, decode them in ascending order through a [`FrameCursor`],
//! compute luma histograms and entropy, rank the candidates greedily,
//! convert the selected pictures to images and apply the configured crops.
//!
//! # Example
//!
//! ```no_run
//! use keyshot::{ExtractOptions, KeyshotError, extract_keyframes_from_path};
//!
//! let extraction = extract_keyframes_from_path("input.mp4", &ExtractOptions::new())?;
//! for (n, keyframe) in extraction.keyframes.iter().enumerate() {
//!     keyframe.image.save(format!("keyframe-{n}.jpg"))?;
//! }
//! # Ok::<(), KeyshotError>(())
//! ```

use std::{path::Path, time::Duration};

use image::DynamicImage;

use crate::candidates::generate_candidates;
use crate::configuration::{DecodeMode, ExtractOptions};
use crate::crop::{aspect_crop, crop_borders_horizontal, crop_borders_vertical};
use crate::cursor::{CursorState, FrameCursor, SeekDirection};
use crate::error::KeyshotError;
use crate::histogram::Histogram;
use crate::index::FrameIndex;
use crate::media::MediaFile;
use crate::progress::{OperationType, ProgressTracker};
use crate::selection::{Candidate, KeyframeSelector};
use crate::source::{Picture, VideoSource};
use crate::utilities::pts_to_duration;

/// One ranked candidate, as reported by an [`Extraction`].
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFrame {
    /// Frame number in the video's frame index.
    pub frame_number: u64,
    /// Presentation timestamp in stream time base.
    pub pts: i64,
    /// Presentation time.
    pub timestamp: Duration,
    /// Shannon entropy of the luma histogram, in bits.
    pub entropy: f64,
    /// Smallest histogram distance to the frames picked before it.
    pub min_diversity: f64,
    /// `entropy + min_diversity` when it was picked.
    pub score: f64,
    /// Whether the frame is one of the returned keyframes.
    pub selected: bool,
}

/// A selected keyframe with its exported image.
#[derive(Debug, Clone)]
pub struct Keyframe {
    /// Frame number in the video's frame index.
    pub frame_number: u64,
    /// Presentation timestamp in stream time base.
    pub pts: i64,
    /// Presentation time.
    pub timestamp: Duration,
    /// Shannon entropy of the luma histogram, in bits.
    pub entropy: f64,
    /// Smallest histogram distance to the keyframes picked before it.
    pub min_diversity: f64,
    /// `entropy + min_diversity` when it was picked.
    pub score: f64,
    /// The picture, after border and aspect crops.
    pub image: DynamicImage,
}

/// Result of [`extract_keyframes`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Every decoded candidate, in the order it was picked.
    pub ranking: Vec<RankedFrame>,
    /// The selected keyframes, in the order they were picked.
    pub keyframes: Vec<Keyframe>,
    /// Letterbox height removed from the top and bottom of each keyframe.
    pub vertical_border: u32,
    /// Pillarbox width removed from the left and right of each keyframe.
    pub horizontal_border: u32,
}

/// Open `path`, index it and extract keyframes.
///
/// # Errors
///
/// Any error from [`MediaFile::open`], [`FrameIndex::scan`] or
/// [`extract_keyframes`].
pub fn extract_keyframes_from_path<P: AsRef<Path>>(
    path: P,
    options: &ExtractOptions,
) -> Result<Extraction, KeyshotError> {
    let mut media = MediaFile::open(path)?;
    let index = FrameIndex::scan_with_options(&mut media, options)?;
    let mut cursor = FrameCursor::from_parts(media, index);
    extract_keyframes(&mut cursor, options)
}

/// Select the most diverse, most detailed frames reachable through `cursor`.
///
/// # Errors
///
/// - [`KeyshotError::EmptyFrameIndex`] if the video has no frames.
/// - [`KeyshotError::EmptySelection`] if no keyframes or candidates are requested.
/// - [`KeyshotError::CandidatePoolExhausted`] if random candidates do not fit.
/// - [`KeyshotError::Cancelled`] if the cancellation token fires.
/// - Seek, decode and conversion errors.
pub fn extract_keyframes<S: VideoSource>(
    cursor: &mut FrameCursor<S>,
    options: &ExtractOptions,
) -> Result<Extraction, KeyshotError> {
    let total_frames = cursor.index().len() as u64;
    if total_frames == 0 {
        return Err(KeyshotError::EmptyFrameIndex);
    }

    let keyframe_count = options.keyframe_count();
    let candidate_count = options.candidate_count();
    if keyframe_count == 0 || candidate_count == 0 {
        return Err(KeyshotError::EmptySelection {
            candidates: candidate_count,
            keyframes: keyframe_count,
        });
    }

    let mut frames = generate_candidates(options.strategy(), total_frames, candidate_count)?;
    frames.sort_unstable();
    frames.dedup();
    log::info!(
        "Examining {} candidate(s) out of {} frame(s) for {} keyframe(s)",
        frames.len(),
        total_frames,
        keyframe_count
    );

    let time_base = cursor.source().time_base();
    let mut tracker = ProgressTracker::start(
        options,
        OperationType::CandidateDecoding,
        Some(frames.len() as u64),
    );
    let decoded = match options.decode_mode() {
        DecodeMode::Seek => decode_seeking(cursor, &frames, options, &mut tracker)?,
        DecodeMode::Sequential => decode_sequential(cursor, &frames, options, &mut tracker)?,
    };
    tracker.finish();

    let histograms = luma_histograms(&decoded)?;
    let candidates: Vec<Candidate<Picture>> = decoded
        .into_iter()
        .zip(histograms)
        .map(|((frame_number, picture), histogram)| Candidate::new(frame_number, histogram, picture))
        .collect();

    if options.is_cancelled() {
        return Err(KeyshotError::Cancelled);
    }

    let mut tracker =
        ProgressTracker::start(options, OperationType::Selection, Some(keyframe_count as u64));

    let ranking = KeyframeSelector::new(keyframe_count)
        .with_metric(options.metric())
        .rank(candidates)?;

    let report: Vec<RankedFrame> = ranking
        .picks()
        .enumerate()
        .map(|(position, candidate)| {
            let pts = candidate.payload().timestamp();
            RankedFrame {
                frame_number: candidate.frame_number(),
                pts,
                timestamp: pts_to_duration(pts, time_base),
                entropy: candidate.entropy(),
                min_diversity: candidate.min_diversity(),
                score: candidate.score(),
                selected: position < ranking.keyframe_count(),
            }
        })
        .collect();

    let (selected, _) = ranking.into_parts();
    let mut images = Vec::with_capacity(selected.len());
    for candidate in &selected {
        if options.is_cancelled() {
            return Err(KeyshotError::Cancelled);
        }
        images.push(candidate.payload().to_image()?);
        let pts = candidate.payload().timestamp();
        tracker.advance(
            Some(candidate.frame_number()),
            Some(pts_to_duration(pts, time_base)),
        );
    }

    let vertical_border = if options.border_crop_vertical {
        crop_borders_vertical(&mut images)
    } else {
        0
    };
    let horizontal_border = if options.border_crop_horizontal {
        crop_borders_horizontal(&mut images)
    } else {
        0
    };
    if let Some(ratio) = options.aspect_crop {
        for image in &mut images {
            *image = aspect_crop(image, ratio);
        }
    }
    tracker.finish();

    let keyframes = selected
        .into_iter()
        .zip(images)
        .map(|(candidate, image)| {
            let pts = candidate.payload().timestamp();
            Keyframe {
                frame_number: candidate.frame_number(),
                pts,
                timestamp: pts_to_duration(pts, time_base),
                entropy: candidate.entropy(),
                min_diversity: candidate.min_diversity(),
                score: candidate.score(),
                image,
            }
        })
        .collect();

    Ok(Extraction {
        ranking: report,
        keyframes,
        vertical_border,
        horizontal_border,
    })
}

/// Seek to every candidate, settling forward on undecodable frames.
/// Candidates with nothing decodable after them are dropped.
fn decode_seeking<S: VideoSource>(
    cursor: &mut FrameCursor<S>,
    frames: &[u64],
    options: &ExtractOptions,
    tracker: &mut ProgressTracker,
) -> Result<Vec<(u64, Picture)>, KeyshotError> {
    let mut decoded: Vec<(u64, Picture)> = Vec::with_capacity(frames.len());

    for &target in frames {
        if options.is_cancelled() {
            return Err(KeyshotError::Cancelled);
        }
        if decoded.last().is_some_and(|(last, _)| *last >= target) {
            log::debug!("Candidate {target} was passed while settling forward; skipping");
            continue;
        }

        let landed = match cursor.seek_to(target, SeekDirection::Forward) {
            Ok(landed) => landed,
            Err(KeyshotError::UnresolvableDrift { .. }) => {
                log::warn!("No decodable frame at or after candidate {target}; skipping");
                continue;
            }
            Err(error) => return Err(error),
        };
        if let Some(picture) = cursor.take_picture() {
            tracker.advance(Some(landed), None);
            decoded.push((landed, picture));
        }
    }

    Ok(decoded)
}

/// Decode the whole stream once, keeping the first picture at or after each
/// candidate.
fn decode_sequential<S: VideoSource>(
    cursor: &mut FrameCursor<S>,
    frames: &[u64],
    options: &ExtractOptions,
    tracker: &mut ProgressTracker,
) -> Result<Vec<(u64, Picture)>, KeyshotError> {
    let mut decoded: Vec<(u64, Picture)> = Vec::with_capacity(frames.len());
    let mut pending = frames.iter().copied().peekable();

    // A used cursor is rewound once; a fresh one starts at frame 0 anyway.
    let mut has_picture = if cursor.state() == CursorState::Uninitialized {
        false
    } else {
        cursor.seek_to(0, SeekDirection::Forward)?;
        true
    };

    while let Some(&target) = pending.peek() {
        if options.is_cancelled() {
            return Err(KeyshotError::Cancelled);
        }
        if !has_picture && cursor.advance_one()?.is_none() {
            log::warn!("Stream ended before candidate {target}");
            break;
        }
        has_picture = false;

        let CursorState::Positioned(current) = cursor.state() else {
            continue;
        };
        if current < target {
            continue;
        }
        while pending.next_if(|&next| next <= current).is_some() {}
        if let Some(picture) = cursor.take_picture() {
            tracker.advance(Some(current), None);
            decoded.push((current, picture));
        }
    }

    Ok(decoded)
}

fn luma_histograms(decoded: &[(u64, Picture)]) -> Result<Vec<Histogram>, KeyshotError> {
    #[cfg(feature = "rayon")]
    {
        let pictures: Vec<&Picture> = decoded.iter().map(|(_, picture)| picture).collect();
        crate::rayon::luma_histograms(&pictures)
    }

    #[cfg(not(feature = "rayon"))]
    decoded
        .iter()
        .map(|(_, picture)| {
            let samples = picture.luma_samples()?;
            Histogram::from_luma(&samples)
        })
        .collect()
}
