use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use keyshot::{
    AspectRatio, CandidateStrategy, DecodeMode, ExtractOptions, Extraction, FfmpegLogLevel,
    FrameIndex, HistogramDistance, MediaFile, OperationType, ProgressCallback, ProgressInfo,
    VideoSource,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  keyshot extract input.mp4 --number 6 --output thumb-{n}.jpg\n  keyshot extract input.mp4 --random --seed 42 --border-crop-v --aspect-crop 16:9\n  keyshot info input.mp4 --json\n  keyshot completions zsh > _keyshot";

/// Placeholder replaced by the keyframe number in output patterns.
const NUMBER_PLACEHOLDER: &str = "{n}";

#[derive(Debug, Parser)]
#[command(
    name = "keyshot",
    version,
    about = "Extract representative, visually diverse keyframes from videos",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output, including the full candidate ranking.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Select keyframes and write them as images.
    #[command(
        about = "Extract keyframes",
        after_help = "Examples:\n  keyshot extract input.mp4\n  keyshot extract input.mp4 --number 3 --candidates 30 --metric emd --json"
    )]
    Extract {
        /// Input video path.
        input: PathBuf,
        /// Number of keyframes to write.
        #[arg(short, long, default_value_t = 5)]
        number: usize,
        /// Number of candidate frames to examine (default: twice --number).
        #[arg(short, long)]
        candidates: Option<usize>,
        /// Pick candidates at random instead of evenly spaced.
        #[arg(long)]
        random: bool,
        /// Seed for --random.
        #[arg(long, requires = "random")]
        seed: Option<u64>,
        /// Decode sequentially instead of seeking (slow, for broken files).
        #[arg(long)]
        no_seek: bool,
        /// Histogram distance (absolute, squared, chi2, ks, emd).
        #[arg(long, default_value = "absolute")]
        metric: String,
        /// Remove letterbox borders (top and bottom).
        #[arg(long)]
        border_crop_v: bool,
        /// Remove pillarbox borders (left and right).
        #[arg(long)]
        border_crop_h: bool,
        /// Center crop to an aspect ratio, e.g. 16:9.
        #[arg(long)]
        aspect_crop: Option<String>,
        /// Output file pattern; `{n}` is replaced by the keyframe number.
        #[arg(short, long, default_value = "keyframe-{n}.jpg")]
        output: String,
        /// Print the ranking as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print stream metadata and frame index statistics.
    #[command(
        about = "Print video metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  keyshot info input.mp4\n  keyshot info input.mp4 --json"
    )]
    Info {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn output_path(pattern: &str, number: usize) -> PathBuf {
    if pattern.contains(NUMBER_PLACEHOLDER) {
        PathBuf::from(pattern.replace(NUMBER_PLACEHOLDER, &number.to_string()))
    } else {
        let path = Path::new(pattern);
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match path.extension() {
            Some(extension) => format!("{stem}-{number}.{}", extension.to_string_lossy()),
            None => format!("{stem}-{number}"),
        };
        path.with_file_name(file_name)
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        keyshot::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let stage = match info.operation {
            OperationType::IndexScan => "indexing",
            OperationType::CandidateDecoding => "decoding candidates",
            OperationType::Selection => "selecting",
            _ => "working",
        };
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        self.bar.set_message(stage);
    }
}

fn print_ranking(extraction: &Extraction) {
    for (position, frame) in extraction.ranking.iter().enumerate() {
        let marker = if frame.selected { '*' } else { ' ' };
        let line = format!(
            "{:2}{}: #={:5} t={:8.3}s E={:.6} hd={:.6}",
            position + 1,
            marker,
            frame.frame_number,
            frame.timestamp.as_secs_f64(),
            frame.entropy,
            frame.min_diversity
        );
        if frame.selected {
            eprintln!("{}", line.bold());
        } else {
            eprintln!("{line}");
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Extract {
            input,
            number,
            candidates,
            random,
            seed,
            no_seek,
            metric,
            border_crop_v,
            border_crop_h,
            aspect_crop,
            output,
            json,
        } => {
            if number == 0 {
                return Err("--number must be greater than 0".into());
            }

            let metric: HistogramDistance = metric.parse()?;
            let mut options = ExtractOptions::new()
                .with_keyframe_count(number)
                .with_metric(metric)
                .with_border_crop(border_crop_v, border_crop_h);
            if let Some(count) = candidates {
                options = options.with_candidate_count(count);
            }
            if random {
                options = options.with_strategy(CandidateStrategy::Random { seed });
            }
            if no_seek {
                options = options.with_decode_mode(DecodeMode::Sequential);
            }
            if let Some(ratio) = aspect_crop {
                options = options.with_aspect_crop(ratio.parse::<AspectRatio>()?);
            }

            let paths: Vec<PathBuf> = (1..=number)
                .map(|n| output_path(&output, n))
                .collect();
            for path in &paths {
                ensure_writable_path(path, cli.global.overwrite)?;
            }

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let extraction = keyshot::extract_keyframes_from_path(&input, &options)?;
            if let Some(progress) = progress {
                progress.finish();
            }

            if cli.global.verbose {
                print_ranking(&extraction);
            }

            for (keyframe, path) in extraction.keyframes.iter().zip(&paths) {
                keyframe.image.save(path)?;
                if cli.global.verbose {
                    eprintln!("saved frame {} -> {}", keyframe.frame_number, path.display());
                }
            }

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "metric": metric.name(),
                    "vertical_border": extraction.vertical_border,
                    "horizontal_border": extraction.horizontal_border,
                    "ranking": extraction.ranking.iter().map(|frame| json!({
                        "frame_number": frame.frame_number,
                        "pts": frame.pts,
                        "timestamp_seconds": frame.timestamp.as_secs_f64(),
                        "entropy": frame.entropy,
                        "min_diversity": frame.min_diversity,
                        "score": frame.score,
                        "selected": frame.selected,
                    })).collect::<Vec<_>>(),
                    "keyframes": extraction.keyframes.iter().zip(&paths).map(|(keyframe, path)| json!({
                        "frame_number": keyframe.frame_number,
                        "timestamp_seconds": keyframe.timestamp.as_secs_f64(),
                        "path": path.display().to_string(),
                    })).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Wrote {} keyframe(s) from {} candidate(s)",
                        extraction.keyframes.len(),
                        extraction.ranking.len()
                    )
                    .green()
                );
            }
        }
        Commands::Info { input, json } => {
            let mut media = MediaFile::open(&input)?;
            let index = FrameIndex::scan(&mut media)?;
            let metadata = media.metadata();
            let group_of_pictures = index.group_of_pictures();
            let indexed_duration = index
                .records()
                .last()
                .map(|last| keyshot::pts_to_seconds(last.pts, media.time_base()))
                .unwrap_or(0.0);

            if json {
                let payload = json!({
                    "width": metadata.width,
                    "height": metadata.height,
                    "fps": metadata.frames_per_second,
                    "codec": metadata.codec,
                    "stream_index": metadata.stream_index,
                    "time_base": format!("{}/{}", metadata.time_base.numerator(), metadata.time_base.denominator()),
                    "start_time": metadata.start_time,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "frames": index.len(),
                    "keyframes": group_of_pictures.keyframes,
                    "average_gop_size": group_of_pictures.average_size,
                    "max_gop_size": group_of_pictures.max_size,
                    "last_frame_seconds": indexed_duration,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "Video: {}x{} @ {:.2} fps [{}] (stream {})",
                    metadata.width,
                    metadata.height,
                    metadata.frames_per_second,
                    metadata.codec,
                    metadata.stream_index
                );
                println!("Duration: {:?}", metadata.duration);
                println!(
                    "Frames: {} ({} keyframe(s), last at {:.3}s)",
                    index.len(),
                    group_of_pictures.keyframes,
                    indexed_duration
                );
                println!(
                    "GOP: average {:.1}, max {}",
                    group_of_pictures.average_size, group_of_pictures.max_size
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "keyshot", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
