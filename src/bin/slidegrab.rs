use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use slidegrab::{
    CaptureEvent, FfmpegLogLevel, FfmpegSource, ImageDirectoryPersister, ParallelScanCoordinator,
    ProgressInfo, ProgressSink, RunSummary, ScanOptions, ScanReport, Segment, TesseractExtractor,
    VideoSource, discovery,
};

const CLI_AFTER_HELP: &str = "Examples:\n  slidegrab scan videos --out save\n  slidegrab scan videos --out save --workers 8 --stride 10 --lang eng --progress\n  slidegrab probe videos/lecture.mp4 --json\n  slidegrab completions zsh > _slidegrab";

#[derive(Debug, Parser)]
#[command(
    name = "slidegrab",
    version,
    about = "Save one frame per distinct on-screen text state of lecture and slide videos",
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
    /// Show per-capture and per-segment logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show one progress bar per segment.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan every video in a directory and save keyframes.
    #[command(
        about = "Extract keyframes from every video in a directory",
        after_help = "Each video's frames go to <OUT>/<video name>/frame_<index>.<ext>."
    )]
    Scan {
        /// Directory containing .mp4 / .avi / .mov / .mkv / .webm files.
        input: PathBuf,
        /// Output directory for captured frames.
        #[arg(long, default_value = "save")]
        out: PathBuf,
        /// Minimum frames between two captures.
        #[arg(long, default_value_t = slidegrab::DEFAULT_MIN_INTERVAL)]
        min_interval: u64,
        /// Frames after which unchanged content is captured again.
        #[arg(long, default_value_t = slidegrab::DEFAULT_MAX_INTERVAL)]
        max_interval: u64,
        /// Number of parallel segments per video.
        #[arg(long, default_value_t = 12)]
        workers: usize,
        /// Evaluate every Nth frame of each segment.
        #[arg(long, default_value_t = slidegrab::DEFAULT_STRIDE)]
        stride: u64,
        /// Similarity below which text counts as new content.
        #[arg(long, default_value_t = slidegrab::DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: f64,
        /// Tesseract language list.
        #[arg(long, default_value = slidegrab::text::DEFAULT_LANGUAGES)]
        lang: String,
        /// Path to the tesseract executable.
        #[arg(long, default_value = "tesseract")]
        tesseract: PathBuf,
        /// Output image extension (png, jpg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
        /// Print a machine-readable JSON summary.
        #[arg(long)]
        json: bool,
    },

    /// Print frame count, frame rate, and codec of a video.
    #[command(about = "Print video properties", visible_alias = "info")]
    Probe {
        /// Video file path.
        input: PathBuf,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// One progress bar per segment, created lazily as workers start.
struct SegmentBars {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    style: ProgressStyle,
}

impl SegmentBars {
    fn new(multi: MultiProgress) -> Result<Self, Box<dyn std::error::Error>> {
        let style = ProgressStyle::with_template(
            "{prefix:>12} {bar:40.cyan/blue} {pos}/{len} frames {msg}",
        )?
        .progress_chars("##-");
        Ok(Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            style,
        })
    }

    /// Close bars of segments that failed before finishing.
    fn abandon_unfinished(&self) {
        if let Ok(bars) = self.bars.lock() {
            for bar in bars.values().filter(|bar| !bar.is_finished()) {
                bar.abandon_with_message("failed");
            }
        }
    }

    fn with_bar(&self, segment_id: usize, action: impl FnOnce(&ProgressBar)) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(&segment_id) {
                action(bar);
            }
        }
    }
}

impl ProgressSink for SegmentBars {
    fn on_progress(&self, info: &ProgressInfo) {
        self.with_bar(info.segment_id, |bar| bar.set_position(info.current));
    }

    fn on_segment_started(&self, segment: &Segment) {
        let bar = self.multi.add(ProgressBar::new(segment.len()));
        bar.set_style(self.style.clone());
        bar.set_prefix(format!("segment {}", segment.id));
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(segment.id, bar);
        }
    }

    fn on_capture(&self, event: &CaptureEvent) {
        self.with_bar(event.segment_id, |bar| {
            bar.set_message(format!("last capture @ {}", event.frame_number))
        });
    }

    fn on_segment_finished(&self, report: &ScanReport) {
        self.with_bar(report.segment.id, |bar| {
            bar.finish_with_message(format!("{} captured", report.captures.len()))
        });
    }
}

/// Prints log records with the progress bars suspended, so lines written
/// while workers run do not tear the bars.
struct BarAwareLogger {
    inner: env_logger::Logger,
    bars: MultiProgress,
}

impl log::Log for BarAwareLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.inner.matches(record) {
            self.bars.suspend(|| self.inner.log(record));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn init_logging(
    global: &GlobalOptions,
    bars: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if global.verbose { "info" } else { "warn" };
    let inner =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .build();
    let max_level = inner.filter();

    log::set_boxed_logger(Box::new(BarAwareLogger {
        inner,
        bars: bars.clone(),
    }))?;
    log::set_max_level(max_level);
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level.parse()?;
        slidegrab::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn summary_json(video: &Path, summary: &RunSummary) -> Value {
    json!({
        "video": video.display().to_string(),
        "total_frames": summary.total_frames,
        "fps": summary.frame_rate,
        "elapsed_seconds": summary.elapsed.as_secs_f64(),
        "complete": summary.is_complete(),
        "unreadable_frames": summary.read_failures(),
        "captures": summary.captures().iter().map(|event| json!({
            "frame": event.frame_number,
            "segment": event.segment_id,
            "path": event.path.display().to_string(),
            "reason": format!("{:?}", event.reason),
        })).collect::<Vec<_>>(),
        "failed_segments": summary.failures().map(|(segment, error)| json!({
            "id": segment.id,
            "start_frame": segment.bounds().map(|(start, _)| start),
            "end_frame": segment.bounds().map(|(_, end)| end),
            "error": error.to_string(),
        })).collect::<Vec<_>>(),
    })
}

fn print_summary(video: &Path, summary: &RunSummary, verbose: bool) {
    if verbose {
        println!("{summary}");
    }

    let failures: Vec<_> = summary.failures().collect();
    for (segment, error) in &failures {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("{segment} of {} failed: {error}", video.display()).yellow()
        );
    }

    let line = format!(
        "{}: {} keyframe(s) from {} frames in {:.1?}",
        video.display(),
        summary.capture_count(),
        summary.total_frames,
        summary.elapsed
    );
    if failures.is_empty() {
        println!("{} {}", "done".green().bold(), line.green());
    } else {
        println!(
            "{} {} ({} failed segment(s))",
            "partial".yellow().bold(),
            line.yellow(),
            failures.len()
        );
    }
}

/// Where and how a directory scan reports its results.
struct ScanOutput<'a> {
    out: &'a Path,
    ext: &'a str,
    json: bool,
}

fn scan_directory(
    global: &GlobalOptions,
    multi: &MultiProgress,
    input: &Path,
    output: &ScanOutput<'_>,
    options: ScanOptions,
    extractor: &TesseractExtractor,
) -> Result<(), Box<dyn std::error::Error>> {
    let ScanOutput {
        out,
        ext,
        json: json_output,
    } = *output;

    options.validate()?;

    let videos = discovery::find_videos(input)?;
    if videos.is_empty() {
        return Err(format!("no video files found in {}", input.display()).into());
    }
    fs::create_dir_all(out)?;

    let mut opened = 0_usize;
    let mut payload = Vec::new();

    for video in &videos {
        let source = match FfmpegSource::open(video) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("{} {}", "warning:".yellow().bold(), error.to_string().yellow());
                continue;
            }
        };

        if !json_output {
            println!(
                "{} {} ({} frames @ {:.2} fps)",
                "scanning".cyan().bold(),
                video.display(),
                source.frame_count(),
                source.frame_rate()
            );
        }

        let target = discovery::output_directory_for(out, video);
        let persister = ImageDirectoryPersister::new(&target).with_extension(ext);

        let mut video_options = options.clone();
        let bars = if global.progress {
            let bars = Arc::new(SegmentBars::new(multi.clone())?);
            video_options = video_options.with_progress(bars.clone());
            Some(bars)
        } else {
            None
        };

        let result =
            ParallelScanCoordinator::new(video_options).run(&source, extractor, &persister);
        if let Some(bars) = &bars {
            bars.abandon_unfinished();
        }

        let summary = match result {
            Ok(summary) => summary,
            Err(error) => {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{}: {error}", video.display()).yellow()
                );
                continue;
            }
        };

        if summary.reports().next().is_some() {
            opened += 1;
        }

        if json_output {
            payload.push(summary_json(video, &summary));
        } else {
            print_summary(video, &summary, global.verbose);
        }
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "{} {}",
            "saved".green().bold(),
            format!("keyframes under {}", out.display()).green()
        );
    }

    if opened == 0 {
        return Err("no video could be opened".into());
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = MultiProgress::new();
    init_logging(&cli.global, &multi)?;
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Scan {
            input,
            out,
            min_interval,
            max_interval,
            workers,
            stride,
            threshold,
            lang,
            tesseract,
            ext,
            json,
        } => {
            let options = ScanOptions::new()
                .with_min_interval(min_interval)
                .with_max_interval(max_interval)
                .with_workers(workers)
                .with_stride(stride)
                .with_similarity_threshold(threshold)
                .with_batch_size(stride);
            let extractor = TesseractExtractor::new()
                .with_program(&tesseract)
                .with_languages(&lang);

            let output = ScanOutput {
                out: &out,
                ext: &ext,
                json,
            };
            scan_directory(&cli.global, &multi, &input, &output, options, &extractor)?;
        }
        Commands::Probe { input, json } => {
            let source = FfmpegSource::open(&input)?;
            if json {
                let payload = json!({
                    "path": source.path().display().to_string(),
                    "frame_count": source.frame_count(),
                    "fps": source.frame_rate(),
                    "width": source.width(),
                    "height": source.height(),
                    "codec": source.codec(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Path: {}", source.path().display());
                println!(
                    "Video: {}x{} @ {:.2} fps [{}]",
                    source.width(),
                    source.height(),
                    source.frame_rate(),
                    source.codec()
                );
                println!("Frames: {}", source.frame_count());
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "slidegrab", &mut std::io::stdout());
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

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_defaults() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["slidegrab", "scan", "videos"]).unwrap();
        match cli.command {
            super::Commands::Scan {
                out,
                min_interval,
                max_interval,
                workers,
                stride,
                threshold,
                lang,
                ..
            } => {
                assert_eq!(out, std::path::PathBuf::from("save"));
                assert_eq!(min_interval, 15);
                assert_eq!(max_interval, 150);
                assert_eq!(workers, 12);
                assert_eq!(stride, 5);
                assert_eq!(threshold, 0.25);
                assert_eq!(lang, "chi_sim+eng");
            }
            other => panic!("expected scan, got {other:?}"),
        }
    }

    fn hidden_bars() -> indicatif::MultiProgress {
        indicatif::MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden())
    }

    #[test]
    fn bar_aware_logger_keeps_env_filter() {
        use log::Log;

        let logger = super::BarAwareLogger {
            inner: env_logger::Builder::new()
                .filter_level(log::LevelFilter::Warn)
                .build(),
            bars: hidden_bars(),
        };

        let warn = log::Metadata::builder().level(log::Level::Warn).build();
        let info = log::Metadata::builder().level(log::Level::Info).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&info));

        // Records go through the suspended bars without disturbing them.
        let bar = logger.bars.add(indicatif::ProgressBar::new(10));
        bar.set_position(4);
        logger.log(
            &log::Record::builder()
                .level(log::Level::Warn)
                .args(format_args!("segment 0: frame 3 unreadable"))
                .build(),
        );
        logger.flush();
        assert_eq!(bar.position(), 4);
        assert!(!bar.is_finished());
    }

    #[test]
    fn failed_segments_have_their_bars_abandoned() {
        use slidegrab::{ProgressSink, Segment};

        let bars = super::SegmentBars::new(hidden_bars()).unwrap();
        bars.on_segment_started(&Segment::new(0, 0, 9));
        bars.on_segment_started(&Segment::new(1, 10, 19));
        bars.with_bar(0, |bar| bar.finish_with_message("0 captured"));

        bars.abandon_unfinished();

        let open = bars.bars.lock().unwrap();
        assert!(open.values().all(|bar| bar.is_finished()));
        assert_eq!(open.len(), 2);
    }
}
