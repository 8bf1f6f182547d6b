//! Control over FFmpeg's own console logging.
//!
//! FFmpeg writes warnings about damaged streams and unusual timestamps to
//! stderr on its own, independently of the Rust [`log`] facade that
//! `keyshot` uses for its diagnostics. Frame-accurate seeking provokes many
//! of those messages on imperfect files, so callers usually want to lower
//! the level.
//!
//! # Example
//!
//! ```no_run
//! use keyshot::FfmpegLogLevel;
//!
//! keyshot::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! assert_eq!(keyshot::get_ffmpeg_log_level(), Some(FfmpegLogLevel::Error));
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::Level;

/// FFmpeg log verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Only unrecoverable errors that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Detailed informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Everything.
    Trace,
}

const LEVELS: [(FfmpegLogLevel, Level, &str); 9] = [
    (FfmpegLogLevel::Quiet, Level::Quiet, "quiet"),
    (FfmpegLogLevel::Panic, Level::Panic, "panic"),
    (FfmpegLogLevel::Fatal, Level::Fatal, "fatal"),
    (FfmpegLogLevel::Error, Level::Error, "error"),
    (FfmpegLogLevel::Warning, Level::Warning, "warning"),
    (FfmpegLogLevel::Info, Level::Info, "info"),
    (FfmpegLogLevel::Verbose, Level::Verbose, "verbose"),
    (FfmpegLogLevel::Debug, Level::Debug, "debug"),
    (FfmpegLogLevel::Trace, Level::Trace, "trace"),
];

impl FfmpegLogLevel {
    /// Lower-case name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        LEVELS[self as usize].2
    }

    fn to_ffmpeg(self) -> Level {
        LEVELS[self as usize].1
    }

    fn from_ffmpeg(level: Level) -> Option<Self> {
        LEVELS
            .iter()
            .find(|(_, ffmpeg, _)| *ffmpeg == level)
            .map(|(ours, _, _)| *ours)
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        let wanted = if wanted == "warn" { "warning".to_string() } else { wanted };
        LEVELS
            .iter()
            .find(|(_, _, name)| *name == wanted)
            .map(|(level, _, _)| *level)
            .ok_or_else(|| format!("unknown FFmpeg log level: {value}"))
    }
}

/// Set FFmpeg's log level. Does not affect the `log` facade.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg());
}

/// Current FFmpeg log level, or `None` if FFmpeg reports a value between
/// the named levels.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .and_then(FfmpegLogLevel::from_ffmpeg)
}
