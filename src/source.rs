//! The decode collaborator consumed by the frame index and cursor.
//!
//! [`VideoSource`] is the narrow interface the core needs from a media
//! engine: read packets, push them through a decoder, pull pictures back out,
//! seek approximately and flush. [`MediaFile`](crate::MediaFile) implements it
//! on top of FFmpeg; tests implement it with scripted streams.
//!
//! Decoded pictures are returned as owned [`Picture`] values. Dropping a
//! picture releases its pixel buffers.

use std::borrow::Cow;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use ffmpeg_next::{
    Rational,
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::KeyshotError;

/// One demuxed packet.
#[derive(Debug, Clone)]
pub struct SourcePacket<P> {
    /// Container stream this packet belongs to.
    pub stream_index: usize,
    /// Presentation timestamp, if the container recorded one.
    pub pts: Option<i64>,
    /// Decoding timestamp, if the container recorded one.
    pub dts: Option<i64>,
    /// Whether the packet is a sync point.
    pub is_key: bool,
    /// Compressed payload handed back to [`VideoSource::send_packet`].
    pub payload: P,
}

/// A seekable, decodable video stream.
///
/// Decoding follows a send/receive model: packets are submitted with
/// [`send_packet`](VideoSource::send_packet) and pictures collected with
/// [`receive_picture`](VideoSource::receive_picture), which returns `None`
/// when the decoder needs more input. Submitting `None` starts draining the
/// decoder at end of stream.
pub trait VideoSource {
    /// Compressed packet payload.
    type Payload;

    /// Container index of the selected video stream.
    fn video_stream_index(&self) -> usize;

    /// Declared start time of the video stream, in stream time base.
    fn start_time(&self) -> Option<i64>;

    /// Time base of the video stream's timestamps.
    fn time_base(&self) -> Rational;

    /// Read the next packet of any stream, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be read.
    fn read_packet(&mut self) -> Result<Option<SourcePacket<Self::Payload>>, KeyshotError>;

    /// Submit a packet to the decoder, or `None` to drain it.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::VideoDecodeError`] if the decoder rejects the packet.
    fn send_packet(&mut self, payload: Option<&Self::Payload>) -> Result<(), KeyshotError>;

    /// Pull the next decoded picture, or `None` if more input is needed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::VideoDecodeError`] if decoding fails.
    fn receive_picture(&mut self) -> Result<Option<Picture>, KeyshotError>;

    /// Discard any pictures buffered inside the decoder.
    fn flush_decoder(&mut self);

    /// Reposition the demuxer near `timestamp` (stream time base).
    ///
    /// With `bias_backward` the demuxer lands on a sync point at or before
    /// the target.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::Seek`] if the container cannot seek.
    fn seek_approximate(&mut self, timestamp: i64, bias_backward: bool)
    -> Result<(), KeyshotError>;
}

enum PictureData {
    Decoded(VideoFrame),
    Luma(Vec<u8>),
}

/// A decoded picture with its presentation timestamp.
pub struct Picture {
    timestamp: i64,
    width: u32,
    height: u32,
    data: PictureData,
}

impl Debug for Picture {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let kind = match self.data {
            PictureData::Decoded(ref frame) => format!("{:?}", frame.format()),
            PictureData::Luma(_) => "luma".to_string(),
        };
        f.debug_struct("Picture")
            .field("timestamp", &self.timestamp)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data", &kind)
            .finish()
    }
}

impl Picture {
    /// Wrap a frame produced by an FFmpeg decoder.
    pub(crate) fn from_frame(timestamp: i64, frame: VideoFrame) -> Self {
        Self {
            timestamp,
            width: frame.width(),
            height: frame.height(),
            data: PictureData::Decoded(frame),
        }
    }

    /// Build a grayscale picture from tightly packed luma samples.
    ///
    /// # Errors
    ///
    /// Returns [`KeyshotError::InvalidLumaBuffer`] if `luma` does not hold
    /// exactly `width * height` samples.
    pub fn from_luma(
        timestamp: i64,
        width: u32,
        height: u32,
        luma: Vec<u8>,
    ) -> Result<Self, KeyshotError> {
        if luma.len() != width as usize * height as usize {
            return Err(KeyshotError::InvalidLumaBuffer {
                width,
                height,
                actual: luma.len(),
            });
        }
        Ok(Self {
            timestamp,
            width,
            height,
            data: PictureData::Luma(luma),
        })
    }

    /// Presentation timestamp in stream time base.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Picture width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Picture height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tightly packed 8-bit luma samples, row by row.
    ///
    /// Planar and semi-planar 8-bit YUV frames expose their Y plane directly;
    /// any other pixel format is converted to grayscale first.
    ///
    /// # Errors
    ///
    /// Returns an FFmpeg error if the grayscale conversion fails.
    pub fn luma_samples(&self) -> Result<Cow<'_, [u8]>, KeyshotError> {
        match self.data {
            PictureData::Luma(ref luma) => Ok(Cow::Borrowed(luma.as_slice())),
            PictureData::Decoded(ref frame) if has_luma_plane(frame.format()) => Ok(Cow::Owned(
                crate::utilities::frame_to_buffer(frame, self.width, self.height, 1),
            )),
            PictureData::Decoded(ref frame) => {
                let gray = convert_frame(frame, Pixel::GRAY8)?;
                Ok(Cow::Owned(crate::utilities::frame_to_buffer(
                    &gray,
                    self.width,
                    self.height,
                    1,
                )))
            }
        }
    }

    /// Convert to an [`image::DynamicImage`] for cropping and export.
    ///
    /// Decoded frames become RGB8 images; luma-only pictures become Luma8.
    ///
    /// # Errors
    ///
    /// Returns an FFmpeg error if colour conversion fails, or
    /// [`KeyshotError::VideoDecodeError`] if the converted buffer is malformed.
    pub fn to_image(&self) -> Result<DynamicImage, KeyshotError> {
        match self.data {
            PictureData::Luma(ref luma) => {
                GrayImage::from_raw(self.width, self.height, luma.clone())
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| {
                        KeyshotError::VideoDecodeError(
                            "Failed to construct grayscale image from luma samples".to_string(),
                        )
                    })
            }
            PictureData::Decoded(ref frame) => {
                let rgb_frame = convert_frame(frame, Pixel::RGB24)?;
                let buffer =
                    crate::utilities::frame_to_buffer(&rgb_frame, self.width, self.height, 3);
                RgbImage::from_raw(self.width, self.height, buffer)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| {
                        KeyshotError::VideoDecodeError(
                            "Failed to construct RGB image from decoded frame data".to_string(),
                        )
                    })
            }
        }
    }
}

/// Pixel formats whose first plane already holds 8-bit luma.
fn has_luma_plane(format: Pixel) -> bool {
    matches!(
        format,
        Pixel::GRAY8
            | Pixel::YUV410P
            | Pixel::YUV411P
            | Pixel::YUV420P
            | Pixel::YUV422P
            | Pixel::YUV440P
            | Pixel::YUV444P
            | Pixel::YUVJ420P
            | Pixel::YUVJ422P
            | Pixel::YUVJ440P
            | Pixel::YUVJ444P
            | Pixel::YUVA420P
            | Pixel::NV12
            | Pixel::NV21
    )
}

fn convert_frame(frame: &VideoFrame, target: Pixel) -> Result<VideoFrame, KeyshotError> {
    let mut scaler = ScalingContext::get(
        frame.format(),
        frame.width(),
        frame.height(),
        target,
        frame.width(),
        frame.height(),
        ScalingFlags::BILINEAR,
    )?;
    let mut converted = VideoFrame::empty();
    scaler.run(frame, &mut converted)?;
    Ok(converted)
}
