//! Dense, presentation-ordered index of every decodable frame.
//!
//! [`FrameIndex::scan`] reads the whole video stream once without decoding,
//! records the timestamps and sync flag of every video packet, sorts them into
//! presentation order and numbers them `0..len`. The cursor uses the index to
//! translate frame numbers into seek targets and to check what the decoder
//! actually produced.
//!
//! # Example
//!
//! ```no_run
//! use keyshot::{FrameIndex, KeyshotError, MediaFile};
//!
//! let mut media = MediaFile::open("input.mp4")?;
//! let index = FrameIndex::scan(&mut media)?;
//! println!("{} frames, {} keyframes", index.len(), index.keyframe_count());
//! # Ok::<(), KeyshotError>(())
//! ```

use crate::configuration::ExtractOptions;
use crate::error::KeyshotError;
use crate::progress::{OperationType, ProgressTracker};
use crate::source::VideoSource;

/// Timestamps and sync flag of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    /// Presentation timestamp (falls back to the decode timestamp when the
    /// container did not record one).
    pub pts: i64,
    /// Decode timestamp (falls back to the presentation timestamp).
    pub dts: i64,
    /// Whether the packet was a sync point.
    pub is_keyframe: bool,
}

/// Summary of the Group of Pictures structure derived from an index.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOfPicturesSummary {
    /// Number of sync frames.
    pub keyframes: usize,
    /// Average distance in frames between consecutive sync frames.
    pub average_size: f64,
    /// Largest distance in frames between consecutive sync frames.
    pub max_size: u64,
}

/// Frames of one video stream, sorted by presentation timestamp.
///
/// A frame's number is its position in the index. Presentation timestamps are
/// strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameIndex {
    records: Vec<FrameRecord>,
}

impl FrameIndex {
    /// Build an index from records in read order.
    ///
    /// Records are stable-sorted by presentation timestamp. When several
    /// records share a timestamp only the first one read is kept.
    pub fn from_records(mut records: Vec<FrameRecord>) -> Self {
        records.sort_by_key(|record| record.pts);
        let before = records.len();
        records.dedup_by_key(|record| record.pts);
        if records.len() != before {
            log::warn!(
                "Dropped {} frame(s) with duplicate presentation timestamps",
                before - records.len()
            );
        }
        Self { records }
    }

    /// Scan `source` once and build its frame index.
    ///
    /// Packets whose timestamp lies before the stream's declared start time
    /// are not decodable on their own and are left out. Afterwards the
    /// source is repositioned at the stream start and the decoder is flushed,
    /// ready for sequential decoding from frame 0.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::Scan`] if reading any packet fails, or
    /// [`KeyshotError::Seek`] if the source cannot rewind.
    pub fn scan<S: VideoSource>(source: &mut S) -> Result<Self, KeyshotError> {
        Self::scan_with_options(source, &ExtractOptions::default())
    }

    /// [`scan`](FrameIndex::scan), reporting every indexed frame to the
    /// options' progress callback and honouring its cancellation token.
    pub(crate) fn scan_with_options<S: VideoSource>(
        source: &mut S,
        options: &ExtractOptions,
    ) -> Result<Self, KeyshotError> {
        let mut tracker = ProgressTracker::start(options, OperationType::IndexScan, None);
        let stream_index = source.video_stream_index();
        let start_time = source.start_time();
        log::debug!(
            "Scanning video stream {} (start_time={:?})",
            stream_index,
            start_time
        );

        let mut records = Vec::new();
        let mut before_start = 0usize;
        let mut untimed = 0usize;

        loop {
            if options.is_cancelled() {
                return Err(KeyshotError::Cancelled);
            }
            let packet = match source.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(error @ KeyshotError::Scan(_)) => return Err(error),
                Err(error) => return Err(KeyshotError::Scan(error.to_string())),
            };
            if packet.stream_index != stream_index {
                continue;
            }

            let Some(pts) = packet.pts.or(packet.dts) else {
                untimed += 1;
                continue;
            };
            if start_time.is_some_and(|start| pts < start) {
                before_start += 1;
                continue;
            }

            records.push(FrameRecord {
                pts,
                dts: packet.dts.unwrap_or(pts),
                is_keyframe: packet.is_key,
            });
            tracker.advance(None, None);
        }
        tracker.finish();

        if before_start > 0 {
            log::debug!("Left {before_start} packet(s) before the stream start out of the index");
        }
        if untimed > 0 {
            log::warn!("Left {untimed} packet(s) without pts or dts out of the index");
        }

        let index = Self::from_records(records);

        let rewind_target = start_time
            .or_else(|| index.records.iter().map(|record| record.dts).min())
            .unwrap_or(0);
        source.seek_approximate(rewind_target, true)?;
        source.flush_decoder();

        log::info!(
            "Indexed {} frame(s) ({} keyframe(s)) on stream {}",
            index.len(),
            index.keyframe_count(),
            stream_index
        );

        Ok(index)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if the stream has no indexable frames.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record of frame `frame_number`.
    pub fn get(&self, frame_number: u64) -> Option<&FrameRecord> {
        usize::try_from(frame_number)
            .ok()
            .and_then(|position| self.records.get(position))
    }

    /// All records in presentation order.
    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Frame number whose presentation timestamp equals `pts`.
    pub fn frame_with_pts(&self, pts: i64) -> Option<u64> {
        self.records
            .binary_search_by_key(&pts, |record| record.pts)
            .ok()
            .map(|position| position as u64)
    }

    /// First frame number at or after `from` whose presentation timestamp
    /// equals `pts`.
    pub fn frame_with_pts_from(&self, from: u64, pts: i64) -> Option<u64> {
        self.frame_with_pts(pts).filter(|&frame| frame >= from)
    }

    /// Nearest sync frame strictly before `frame_number`.
    pub fn keyframe_before(&self, frame_number: u64) -> Option<u64> {
        let end = usize::try_from(frame_number)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        self.records[..end]
            .iter()
            .rposition(|record| record.is_keyframe)
            .map(|position| position as u64)
    }

    /// Number of sync frames.
    pub fn keyframe_count(&self) -> usize {
        self.records.iter().filter(|record| record.is_keyframe).count()
    }

    /// Distances between consecutive sync frames.
    pub fn group_of_pictures(&self) -> GroupOfPicturesSummary {
        let positions: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_keyframe)
            .map(|(position, _)| position)
            .collect();

        let sizes: Vec<u64> = positions
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = positions.get(i + 1).copied().unwrap_or(self.records.len());
                (end - start) as u64
            })
            .collect();

        let average_size = if sizes.is_empty() {
            0.0
        } else {
            sizes.iter().sum::<u64>() as f64 / sizes.len() as f64
        };

        GroupOfPicturesSummary {
            keyframes: positions.len(),
            average_size,
            max_size: sizes.iter().copied().max().unwrap_or(0),
        }
    }
}
