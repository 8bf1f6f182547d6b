//! Frame-exact random access on top of approximate container seeking.
//!
//! Containers can only seek to sync points near a timestamp, and decoders may
//! drop or reorder pictures. [`FrameCursor`] reconciles that with the exact
//! frame numbers of a [`FrameIndex`]: every decoded picture is checked
//! against the index, and every [`seek_to`](FrameCursor::seek_to) ends on a
//! picture whose timestamp matches a real index entry, chosen according to a
//! [`SeekDirection`] when the requested frame cannot be produced.
//!
//! # Example
//!
//! ```no_run
//! use keyshot::{FrameCursor, KeyshotError, MediaFile, SeekDirection};
//!
//! let media = MediaFile::open("input.mp4")?;
//! let mut cursor = FrameCursor::new(media)?;
//!
//! let landed = cursor.seek_to(250, SeekDirection::Forward)?;
//! let picture = cursor.picture().expect("seek leaves a picture");
//! println!("frame {landed} at pts {}", picture.timestamp());
//! # Ok::<(), KeyshotError>(())
//! ```

use crate::error::KeyshotError;
use crate::index::FrameIndex;
use crate::source::{Picture, VideoSource};

/// Forward hops shorter than this are decoded instead of seeked.
pub const SHORT_HOP_THRESHOLD: u64 = 20;

/// What to do when the requested frame cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeekDirection {
    /// Settle on the first frame the decoder produces after the target.
    #[default]
    Forward,
    /// Settle on the last frame the decoder produced before the target.
    Backward,
    /// Accept only the requested frame and fail otherwise.
    Exact,
}

/// Position of a [`FrameCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing decoded yet; the next picture is frame 0.
    Uninitialized,
    /// The current picture is the given index entry.
    Positioned(u64),
    /// The last decode did not land on the expected index entry.
    Drifted {
        /// Frame number the cursor expected to produce.
        frame_number: u64,
        /// Timestamp of the picture that was actually decoded.
        timestamp: i64,
    },
    /// The cursor was closed.
    Closed,
}

/// Relation between a decoded timestamp and the one a seek is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The decoded picture is the target.
    ExactMatch,
    /// The decoder produced a later picture; the target was skipped.
    Overshoot(i64),
    /// The decoder is still before the target.
    Undershoot(i64),
}

impl SeekOutcome {
    /// Classify `decoded_pts` against `target_pts`.
    pub fn classify(decoded_pts: i64, target_pts: i64) -> Self {
        if decoded_pts == target_pts {
            SeekOutcome::ExactMatch
        } else if decoded_pts > target_pts {
            SeekOutcome::Overshoot(decoded_pts)
        } else {
            SeekOutcome::Undershoot(decoded_pts)
        }
    }
}

/// How a decode-forward pass after a container seek ended.
enum Landing {
    Exact(Picture),
    Overshoot {
        picture: Picture,
        last_passed: Option<i64>,
    },
    Exhausted {
        last_passed: Option<i64>,
    },
}

/// Frame-accurate cursor over a [`VideoSource`].
///
/// The cursor owns at most one decoded picture at a time. It is released
/// before the next one is decoded, so callers must not hold on to
/// [`picture`](FrameCursor::picture) across cursor calls; use
/// [`take_picture`](FrameCursor::take_picture) to keep one.
pub struct FrameCursor<S: VideoSource> {
    source: S,
    index: FrameIndex,
    state: CursorState,
    picture: Option<Picture>,
    /// The end-of-stream drain has been submitted since the last seek.
    drained: bool,
}

impl<S: VideoSource> FrameCursor<S> {
    /// Index `source` and create a cursor positioned before frame 0.
    ///
    /// # Errors
    ///
    /// Returns any error from [`FrameIndex::scan`].
    pub fn new(mut source: S) -> Result<Self, KeyshotError> {
        let index = FrameIndex::scan(&mut source)?;
        Ok(Self::from_parts(source, index))
    }

    /// Create a cursor from a source and a previously built index.
    ///
    /// `source` must be positioned at the start of its video stream, as
    /// [`FrameIndex::scan`] leaves it.
    pub fn from_parts(source: S, index: FrameIndex) -> Self {
        Self {
            source,
            index,
            state: CursorState::Uninitialized,
            picture: None,
            drained: false,
        }
    }

    /// The frame index.
    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Frame number of the current position, if any.
    ///
    /// For a drifted cursor this is the frame number it expected.
    pub fn current_frame_number(&self) -> Option<u64> {
        match self.state {
            CursorState::Positioned(frame_number) | CursorState::Drifted { frame_number, .. } => {
                Some(frame_number)
            }
            CursorState::Uninitialized | CursorState::Closed => None,
        }
    }

    /// The current picture.
    pub fn picture(&self) -> Option<&Picture> {
        self.picture.as_ref()
    }

    /// Move the current picture out of the cursor. The position is kept.
    pub fn take_picture(&mut self) -> Option<Picture> {
        self.picture.take()
    }

    /// Release the current picture and refuse further decoding.
    pub fn close(&mut self) {
        self.picture = None;
        self.state = CursorState::Closed;
    }

    /// Give back the source and index.
    pub fn into_parts(self) -> (S, FrameIndex) {
        (self.source, self.index)
    }

    /// Decode the next picture in presentation order.
    ///
    /// The new frame number is the previous one plus one. If the decoded
    /// timestamp does not match that index entry, the index is searched
    /// forward for it (the decoder dropped frames); if it is not found the
    /// cursor becomes [`CursorState::Drifted`].
    ///
    /// A drifted cursor only guessed its frame number, so the next picture
    /// is looked up in the whole index. A drifted picture that came before
    /// the expected frame does not use that frame number up.
    ///
    /// Returns `None` once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::CursorClosed`] after [`close`](FrameCursor::close),
    /// or any read/decode error from the source.
    pub fn advance_one(&mut self) -> Result<Option<&Picture>, KeyshotError> {
        self.ensure_open()?;
        self.picture = None;

        let Some(picture) = self.decode_next()? else {
            log::debug!("End of stream reached after {:?}", self.state);
            return Ok(None);
        };

        let (expected, search_from) = match self.state {
            CursorState::Positioned(frame_number) => (frame_number + 1, frame_number + 2),
            CursorState::Drifted {
                frame_number,
                timestamp,
            } => {
                let undershot = self
                    .index
                    .get(frame_number)
                    .is_some_and(|record| timestamp < record.pts);
                let expected = if undershot { frame_number } else { frame_number + 1 };
                (expected, 0)
            }
            CursorState::Uninitialized | CursorState::Closed => (0, 0),
        };
        let decoded = picture.timestamp();

        self.state = match self.index.get(expected) {
            Some(record) if record.pts == decoded => CursorState::Positioned(expected),
            _ => match self.index.frame_with_pts_from(search_from, decoded) {
                Some(frame_number) => {
                    log::debug!(
                        "Decoder skipped frames: expected {expected}, got {frame_number} (pts {decoded})"
                    );
                    CursorState::Positioned(frame_number)
                }
                None => {
                    log::warn!("Decoded pts {decoded} has no index entry at or after frame {search_from}");
                    CursorState::Drifted {
                        frame_number: expected,
                        timestamp: decoded,
                    }
                }
            },
        };

        self.picture = Some(picture);
        Ok(self.picture.as_ref())
    }

    /// Move to `frame_number`, returning the frame number actually reached.
    ///
    /// Staying put is free and short forward hops are decoded sequentially.
    /// Anything else seeks the container to the frame's decode timestamp
    /// (biased backward) and decodes forward until the target appears. If
    /// the decoder skips past it, `direction` decides:
    ///
    /// - [`SeekDirection::Forward`] keeps the later picture;
    /// - [`SeekDirection::Backward`] seeks again, exactly, to the last frame
    ///   decoded before the target;
    /// - [`SeekDirection::Exact`] fails.
    ///
    /// # Errors
    ///
    /// - [`KeyshotError::FrameOutOfRange`] if `frame_number` is not in the index.
    /// - [`KeyshotError::UnresolvableDrift`] if no frame satisfies `direction`.
    /// - [`KeyshotError::Seek`] or decode errors from the source.
    pub fn seek_to(
        &mut self,
        frame_number: u64,
        direction: SeekDirection,
    ) -> Result<u64, KeyshotError> {
        self.ensure_open()?;

        let total_frames = self.index.len() as u64;
        if frame_number >= total_frames {
            return Err(KeyshotError::FrameOutOfRange {
                frame_number,
                total_frames,
            });
        }

        let current = match self.state {
            CursorState::Positioned(current) => Some(current),
            CursorState::Uninitialized => None,
            CursorState::Drifted { .. } | CursorState::Closed => {
                return self.seek_resolving(frame_number, direction);
            }
        };

        if current == Some(frame_number) && self.picture.is_some() {
            return Ok(frame_number);
        }

        let hop = frame_number as i64 - current.map_or(-1, |current| current as i64);
        if hop > 0 && (hop as u64) < SHORT_HOP_THRESHOLD {
            if let Some(landed) = self.advance_to(frame_number)? {
                if landed == frame_number || direction == SeekDirection::Forward {
                    return Ok(landed);
                }
                if direction == SeekDirection::Exact {
                    let decoded = self.picture.as_ref().map(Picture::timestamp);
                    return Err(self.drift(frame_number, decoded, direction));
                }
            }
            log::debug!("Short hop to frame {frame_number} did not land; seeking instead");
        }

        self.seek_resolving(frame_number, direction)
    }

    /// Decode the next frame. Same as [`advance_one`](FrameCursor::advance_one).
    ///
    /// # Errors
    ///
    /// See [`advance_one`](FrameCursor::advance_one).
    pub fn seek_to_next(&mut self) -> Result<Option<&Picture>, KeyshotError> {
        self.advance_one()
    }

    /// Move to the frame before the current one, settling backward.
    ///
    /// Returns `None` without moving when there is no earlier frame.
    ///
    /// # Errors
    ///
    /// See [`seek_to`](FrameCursor::seek_to).
    pub fn seek_to_previous(&mut self) -> Result<Option<u64>, KeyshotError> {
        match self.current_frame_number() {
            Some(current) if current > 0 => self
                .seek_to(current - 1, SeekDirection::Backward)
                .map(Some),
            _ => {
                self.ensure_open()?;
                Ok(None)
            }
        }
    }

    fn ensure_open(&self) -> Result<(), KeyshotError> {
        if self.state == CursorState::Closed {
            Err(KeyshotError::CursorClosed)
        } else {
            Ok(())
        }
    }

    /// Advance until at or past `target`. `None` if the stream ended or the
    /// cursor drifted on the way.
    fn advance_to(&mut self, target: u64) -> Result<Option<u64>, KeyshotError> {
        loop {
            if self.advance_one()?.is_none() {
                return Ok(None);
            }
            match self.state {
                CursorState::Positioned(current) if current >= target => return Ok(Some(current)),
                CursorState::Positioned(_) => {}
                _ => return Ok(None),
            }
        }
    }

    /// Container seek followed by direction-dependent resolution. A backward
    /// overshoot is retried once as an exact seek to the last frame passed.
    fn seek_resolving(
        &mut self,
        frame_number: u64,
        direction: SeekDirection,
    ) -> Result<u64, KeyshotError> {
        let mut target = frame_number;
        let mut policy = direction;

        loop {
            match self.seek_and_decode(target)? {
                Landing::Exact(picture) => return Ok(self.adopt(target, picture)),
                Landing::Overshoot {
                    picture,
                    last_passed,
                } => {
                    let decoded = picture.timestamp();
                    match policy {
                        SeekDirection::Forward => {
                            return match self.index.frame_with_pts_from(target, decoded) {
                                Some(landed) => Ok(self.adopt(landed, picture)),
                                None => Err(self.drift(target, Some(decoded), policy)),
                            };
                        }
                        SeekDirection::Backward => {
                            drop(picture);
                            let Some(previous) =
                                last_passed.and_then(|pts| self.index.frame_with_pts(pts))
                            else {
                                return Err(self.drift(target, Some(decoded), policy));
                            };
                            log::debug!(
                                "Frame {target} cannot be decoded; settling back on frame {previous}"
                            );
                            target = previous;
                            policy = SeekDirection::Exact;
                        }
                        SeekDirection::Exact => {
                            return Err(self.drift(target, Some(decoded), policy));
                        }
                    }
                }
                Landing::Exhausted { last_passed } => {
                    return Err(self.drift(target, last_passed, policy));
                }
            }
        }
    }

    /// Seek the container to `target`'s decode timestamp and decode forward
    /// until a picture at or after its presentation timestamp appears.
    fn seek_and_decode(&mut self, target: u64) -> Result<Landing, KeyshotError> {
        let total_frames = self.index.len() as u64;
        let record = *self
            .index
            .get(target)
            .ok_or(KeyshotError::FrameOutOfRange {
                frame_number: target,
                total_frames,
            })?;

        // The decoder position is unknown until a picture is adopted.
        self.picture = None;
        self.state = CursorState::Drifted {
            frame_number: target,
            timestamp: record.pts,
        };

        log::debug!(
            "Seeking to frame {target} (pts={}, dts={})",
            record.pts,
            record.dts
        );
        self.source.seek_approximate(record.dts, true)?;
        self.source.flush_decoder();
        self.drained = false;

        let mut last_passed = None;
        while let Some(picture) = self.decode_next()? {
            match SeekOutcome::classify(picture.timestamp(), record.pts) {
                SeekOutcome::ExactMatch => return Ok(Landing::Exact(picture)),
                SeekOutcome::Overshoot(_) => {
                    return Ok(Landing::Overshoot {
                        picture,
                        last_passed,
                    });
                }
                SeekOutcome::Undershoot(pts) => last_passed = Some(pts),
            }
        }

        Ok(Landing::Exhausted { last_passed })
    }

    fn adopt(&mut self, frame_number: u64, picture: Picture) -> u64 {
        self.state = CursorState::Positioned(frame_number);
        self.picture = Some(picture);
        frame_number
    }

    fn drift(
        &mut self,
        frame_number: u64,
        decoded_pts: Option<i64>,
        direction: SeekDirection,
    ) -> KeyshotError {
        let expected_pts = self
            .index
            .get(frame_number)
            .map_or(i64::MIN, |record| record.pts);
        self.picture = None;
        self.state = CursorState::Drifted {
            frame_number,
            timestamp: decoded_pts.unwrap_or(expected_pts),
        };
        log::warn!(
            "Unresolvable drift at frame {frame_number} (expected pts {expected_pts}, decoded {decoded_pts:?}, {direction:?})"
        );
        KeyshotError::UnresolvableDrift {
            frame_number,
            expected_pts,
            decoded_pts,
            direction,
        }
    }

    /// Pull the next picture, feeding packets of the video stream and
    /// draining the decoder once the container is exhausted.
    fn decode_next(&mut self) -> Result<Option<Picture>, KeyshotError> {
        let stream_index = self.source.video_stream_index();
        loop {
            if let Some(picture) = self.source.receive_picture()? {
                return Ok(Some(picture));
            }
            if self.drained {
                return Ok(None);
            }
            match self.source.read_packet()? {
                Some(packet) if packet.stream_index == stream_index => {
                    self.source.send_packet(Some(&packet.payload))?;
                }
                Some(_) => {}
                None => {
                    self.source.send_packet(None)?;
                    self.drained = true;
                }
            }
        }
    }
}
