//! Scripted in-memory video source shared by the integration tests.
//!
//! Packets are described up front (timestamps, sync flag, whether the
//! decoder turns them into a picture). The fake decoder buffers pictures
//! and releases them in presentation order once more than
//! `reorder_delay` are pending, which is how B-frame decoders behave.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};

use keyshot::{KeyshotError, Picture, Rational, SourcePacket, VideoSource};

pub const VIDEO_STREAM: usize = 0;
pub const AUDIO_STREAM: usize = 1;
pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 4;

/// Timestamp step between consecutive frames.
pub const STEP: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct ScriptedPacket {
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub is_key: bool,
    pub produces_picture: bool,
}

impl ScriptedPacket {
    pub fn video(pts: i64, dts: i64, is_key: bool) -> Self {
        Self {
            stream_index: VIDEO_STREAM,
            pts: Some(pts),
            dts: Some(dts),
            is_key,
            produces_picture: true,
        }
    }

    pub fn audio(pts: i64) -> Self {
        Self {
            stream_index: AUDIO_STREAM,
            pts: Some(pts),
            dts: Some(pts),
            is_key: true,
            produces_picture: false,
        }
    }
}

pub struct SyntheticSource {
    packets: Vec<ScriptedPacket>,
    position: usize,
    start_time: Option<i64>,
    reorder_delay: usize,
    buffered: BTreeSet<i64>,
    ready: VecDeque<i64>,
    seek_count: usize,
    fail_read_at: Option<usize>,
}

impl SyntheticSource {
    pub fn new(packets: Vec<ScriptedPacket>) -> Self {
        Self {
            packets,
            position: 0,
            start_time: None,
            reorder_delay: 0,
            buffered: BTreeSet::new(),
            ready: VecDeque::new(),
            seek_count: 0,
            fail_read_at: None,
        }
    }

    /// `frames` frames in presentation order, pts = dts = `i * STEP`, a sync
    /// point every `gop` frames.
    pub fn sequential(frames: usize, gop: usize) -> Self {
        let packets = (0..frames)
            .map(|i| {
                let ts = i as i64 * STEP;
                ScriptedPacket::video(ts, ts, i % gop == 0)
            })
            .collect();
        Self::new(packets).with_start_time(0)
    }

    /// `groups` groups of four frames stored as I P B B (decode order), so
    /// the decoder needs one picture of delay to output presentation order.
    pub fn reordered(groups: usize) -> Self {
        let mut packets = Vec::with_capacity(groups * 4);
        for group in 0..groups {
            let base = group as i64 * 4 * STEP;
            packets.push(ScriptedPacket::video(base, base - STEP, true));
            packets.push(ScriptedPacket::video(base + 3 * STEP, base, false));
            packets.push(ScriptedPacket::video(base + STEP, base + STEP, false));
            packets.push(ScriptedPacket::video(base + 2 * STEP, base + 2 * STEP, false));
        }
        Self::new(packets).with_start_time(0).with_reorder_delay(1)
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_reorder_delay(mut self, delay: usize) -> Self {
        self.reorder_delay = delay;
        self
    }

    /// The packet for the frame at `pts` decodes to nothing.
    pub fn with_missing_picture(mut self, pts: i64) -> Self {
        for packet in &mut self.packets {
            if packet.stream_index == VIDEO_STREAM && packet.pts == Some(pts) {
                packet.produces_picture = false;
            }
        }
        self
    }

    /// Reading the packet at read position `position` fails.
    pub fn with_read_error_at(mut self, position: usize) -> Self {
        self.fail_read_at = Some(position);
        self
    }

    pub fn seek_count(&self) -> usize {
        self.seek_count
    }
}

/// Deterministic luma content: a gradient whose slope depends on `pts`.
pub fn luma_for(pts: i64) -> Vec<u8> {
    let slope = (pts / STEP).rem_euclid(7) as usize + 1;
    (0..(WIDTH * HEIGHT) as usize)
        .map(|i| ((i * slope * 5 + (pts.rem_euclid(256) as usize)) % 256) as u8)
        .collect()
}

impl VideoSource for SyntheticSource {
    type Payload = usize;

    fn video_stream_index(&self) -> usize {
        VIDEO_STREAM
    }

    fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    fn time_base(&self) -> Rational {
        Rational::new(1, 100)
    }

    fn read_packet(&mut self) -> Result<Option<SourcePacket<usize>>, KeyshotError> {
        if self.fail_read_at == Some(self.position) {
            return Err(KeyshotError::FfmpegError("scripted read failure".to_string()));
        }
        let Some(packet) = self.packets.get(self.position) else {
            return Ok(None);
        };
        let payload = self.position;
        self.position += 1;
        Ok(Some(SourcePacket {
            stream_index: packet.stream_index,
            pts: packet.pts,
            dts: packet.dts,
            is_key: packet.is_key,
            payload,
        }))
    }

    fn send_packet(&mut self, payload: Option<&usize>) -> Result<(), KeyshotError> {
        match payload {
            Some(&position) => {
                let packet = self.packets[position];
                if packet.produces_picture {
                    if let Some(pts) = packet.pts.or(packet.dts) {
                        self.buffered.insert(pts);
                    }
                }
                while self.buffered.len() > self.reorder_delay {
                    if let Some(first) = self.buffered.pop_first() {
                        self.ready.push_back(first);
                    }
                }
            }
            None => {
                while let Some(first) = self.buffered.pop_first() {
                    self.ready.push_back(first);
                }
            }
        }
        Ok(())
    }

    fn receive_picture(&mut self) -> Result<Option<Picture>, KeyshotError> {
        match self.ready.pop_front() {
            Some(pts) => Picture::from_luma(pts, WIDTH, HEIGHT, luma_for(pts)).map(Some),
            None => Ok(None),
        }
    }

    fn flush_decoder(&mut self) {
        self.buffered.clear();
        self.ready.clear();
    }

    fn seek_approximate(&mut self, timestamp: i64, bias_backward: bool) -> Result<(), KeyshotError> {
        self.seek_count += 1;
        let sync_points = self.packets.iter().enumerate().filter(|(_, packet)| {
            packet.stream_index == VIDEO_STREAM && packet.is_key
        });
        let sync_ts = |packet: &ScriptedPacket| packet.dts.or(packet.pts).unwrap_or(i64::MIN);

        self.position = if bias_backward {
            sync_points
                .filter(|(_, packet)| sync_ts(packet) <= timestamp)
                .map(|(position, _)| position)
                .last()
                .unwrap_or(0)
        } else {
            sync_points
                .find(|(_, packet)| sync_ts(packet) >= timestamp)
                .map(|(position, _)| position)
                .unwrap_or(self.packets.len())
        };
        Ok(())
    }
}
