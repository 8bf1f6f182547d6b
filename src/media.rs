//! FFmpeg-backed [`VideoSource`].
//!
//! [`MediaFile`] opens a container, selects its video stream and decoder,
//! and caches [`VideoMetadata`]. It is the source a [`FrameCursor`](crate::FrameCursor)
//! normally runs on.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{context::Input, stream::Stream},
    frame::Video as VideoFrame,
    media::Type,
};

use crate::{
    error::KeyshotError,
    metadata::VideoMetadata,
    source::{Picture, SourcePacket, VideoSource},
};

/// An opened media file with a decoder on its video stream.
///
/// # Example
///
/// ```no_run
/// use keyshot::{KeyshotError, MediaFile};
///
/// let media = MediaFile::open("input.mp4")?;
/// println!("Codec: {}", media.metadata().codec);
/// # Ok::<(), KeyshotError>(())
/// ```
pub struct MediaFile {
    /// The opened FFmpeg input (demuxer) context.
    input_context: Input,
    /// Decoder for the selected video stream.
    decoder: VideoDecoder,
    /// Cached metadata extracted at open time.
    metadata: VideoMetadata,
    /// Path to the opened media file (kept for error messages).
    file_path: PathBuf,
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("metadata", &self.metadata)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl MediaFile {
    /// Open a media file and prepare its video stream for decoding.
    ///
    /// FFmpeg's preferred video stream is used when a decoder can be opened
    /// for it; otherwise the first other video stream with a working decoder.
    ///
    /// # Errors
    ///
    /// - [`KeyshotError::FileOpen`] if the file cannot be opened.
    /// - [`KeyshotError::NoVideoStream`] if the file has no video stream.
    /// - [`KeyshotError::NoDecoder`] if no video stream can be decoded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KeyshotError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening media file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| KeyshotError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| KeyshotError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let best_index = input_context
            .streams()
            .best(Type::Video)
            .map(|stream| stream.index());
        let mut stream_indices: Vec<usize> = input_context
            .streams()
            .filter(|stream| stream.parameters().medium() == Type::Video)
            .map(|stream| stream.index())
            .collect();
        if let Some(best) = best_index {
            stream_indices.retain(|&index| index != best);
            stream_indices.insert(0, best);
        }

        let mut first_failure = None;
        for index in stream_indices {
            let Some(stream) = input_context.stream(index) else {
                continue;
            };
            match open_decoder(&stream) {
                Ok(decoder) => {
                    let metadata = read_metadata(&input_context, &stream, &decoder);
                    log::info!(
                        "Opened video stream {} ({}, {}x{}, {:.3} fps)",
                        index,
                        metadata.codec,
                        metadata.width,
                        metadata.height,
                        metadata.frames_per_second
                    );
                    return Ok(Self {
                        input_context,
                        decoder,
                        metadata,
                        file_path,
                    });
                }
                Err(reason) => {
                    log::warn!("Cannot decode video stream {index}: {reason}");
                    first_failure.get_or_insert((index, reason));
                }
            }
        }

        match first_failure {
            Some((stream_index, reason)) => Err(KeyshotError::NoDecoder {
                stream_index,
                reason,
            }),
            None => Err(KeyshotError::NoVideoStream),
        }
    }

    /// Metadata of the selected video stream.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl VideoSource for MediaFile {
    type Payload = Packet;

    fn video_stream_index(&self) -> usize {
        self.metadata.stream_index
    }

    fn start_time(&self) -> Option<i64> {
        self.metadata.start_time
    }

    fn time_base(&self) -> Rational {
        self.metadata.time_base
    }

    fn read_packet(&mut self) -> Result<Option<SourcePacket<Packet>>, KeyshotError> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input_context) {
            Ok(()) => Ok(Some(SourcePacket {
                stream_index: packet.stream(),
                pts: packet.pts(),
                dts: packet.dts(),
                is_key: packet.is_key(),
                payload: packet,
            })),
            Err(FfmpegError::Eof) => Ok(None),
            Err(error) => Err(KeyshotError::from(error)),
        }
    }

    fn send_packet(&mut self, payload: Option<&Packet>) -> Result<(), KeyshotError> {
        let result = match payload {
            Some(packet) => self.decoder.send_packet(packet),
            None => self.decoder.send_eof(),
        };
        match result {
            Ok(()) | Err(FfmpegError::Eof) => Ok(()),
            Err(error) => Err(KeyshotError::VideoDecodeError(error.to_string())),
        }
    }

    fn receive_picture(&mut self) -> Result<Option<Picture>, KeyshotError> {
        let mut frame = VideoFrame::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => {
                let timestamp = frame.pts().or(frame.timestamp()).ok_or_else(|| {
                    KeyshotError::VideoDecodeError("Decoded frame has no timestamp".to_string())
                })?;
                Ok(Some(Picture::from_frame(timestamp, frame)))
            }
            Err(FfmpegError::Eof) => Ok(None),
            Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(error) => Err(KeyshotError::VideoDecodeError(error.to_string())),
        }
    }

    fn flush_decoder(&mut self) {
        self.decoder.flush();
    }

    fn seek_approximate(&mut self, timestamp: i64, bias_backward: bool) -> Result<(), KeyshotError> {
        let flags = if bias_backward {
            ffmpeg_sys_next::AVSEEK_FLAG_BACKWARD as i32
        } else {
            0
        };
        // SAFETY: the context pointer is owned by `input_context`, which
        // outlives the call, and the stream index was validated at open.
        let result = unsafe {
            ffmpeg_sys_next::av_seek_frame(
                self.input_context.as_mut_ptr(),
                self.metadata.stream_index as i32,
                timestamp,
                flags,
            )
        };
        if result < 0 {
            return Err(KeyshotError::Seek {
                timestamp,
                reason: FfmpegError::from(result).to_string(),
            });
        }
        Ok(())
    }
}

fn open_decoder(stream: &Stream<'_>) -> Result<VideoDecoder, String> {
    let context = CodecContext::from_parameters(stream.parameters())
        .map_err(|error| format!("Failed to read codec parameters: {error}"))?;
    context
        .decoder()
        .video()
        .map_err(|error| format!("Failed to create video decoder: {error}"))
}

fn read_metadata(input_context: &Input, stream: &Stream<'_>, decoder: &VideoDecoder) -> VideoMetadata {
    let frame_rate = stream.avg_frame_rate();
    let frames_per_second = if frame_rate.denominator() != 0 {
        frame_rate.numerator() as f64 / frame_rate.denominator() as f64
    } else {
        let rate = stream.rate();
        if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        }
    };

    let duration_microseconds = input_context.duration();
    let duration = if duration_microseconds > 0 {
        Duration::from_micros(duration_microseconds as u64)
    } else {
        Duration::ZERO
    };

    let start_time = Some(stream.start_time()).filter(|&start| start != ffmpeg_sys_next::AV_NOPTS_VALUE);

    VideoMetadata {
        width: decoder.width(),
        height: decoder.height(),
        frames_per_second,
        codec: decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        time_base: stream.time_base(),
        start_time,
        duration,
        stream_index: stream.index(),
    }
}
