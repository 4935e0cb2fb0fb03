// src/main.rs

mod analyzer;
mod calibration;
mod config;
mod detection_source;
mod projector;
mod proximity;
mod types;

use analyzer::{DistanceAnalyzer, FrameResult};
use anyhow::Result;
use calibration::CalibrationModel;
use detection_source::DetectionSource;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use types::{Config, Frame};
use walkdir::WalkDir;

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("social_distancing={}", config.logging.level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Social Distancing Analysis Starting");
    info!("✓ Configuration loaded");

    let mut analysis_config = config.analysis.clone();
    if let Ok(value) = std::env::var("SAFE_DISTANCING_THRESHOLD") {
        match value.parse::<f64>() {
            Ok(threshold) => {
                info!("Threshold overridden from environment: {:.2}", threshold);
                analysis_config.safe_distance_threshold = threshold;
            }
            Err(_) => warn!("Ignoring unparsable SAFE_DISTANCING_THRESHOLD: {}", value),
        }
    }

    info!(
        "Analysis settings: threshold={:.2} ({:?}), draw_warped={}",
        analysis_config.safe_distance_threshold, analysis_config.units, analysis_config.draw_warped
    );

    // A failed calibration disables analysis but never the run: frames pass
    // through unanalyzed until a good calibration is configured.
    let calibration = match CalibrationModel::load(&config.calibration.file) {
        Ok(model) => match model.check_units(analysis_config.units) {
            Ok(()) => Some(model),
            Err(e) => {
                warn!("Calibration rejected: {}. Analysis disabled.", e);
                None
            }
        },
        Err(e) => {
            warn!(
                "Failed to load calibration {}: {}. Analysis disabled.",
                config.calibration.file, e
            );
            None
        }
    };

    let analyzer = DistanceAnalyzer::new(analysis_config, calibration);
    if analyzer.is_calibrated() {
        info!("✓ Distance analyzer ready");
    }

    let streams = find_detection_streams(&config.input.detections_dir)?;
    if streams.is_empty() {
        error!(
            "No detection streams found in {}",
            config.input.detections_dir
        );
        return Ok(());
    }
    info!("Found {} detection stream(s) to process", streams.len());

    let mut totals = StreamStats::default();
    for (idx, stream_path) in streams.iter().enumerate() {
        info!(
            "Processing stream {}/{}: {}",
            idx + 1,
            streams.len(),
            stream_path.display()
        );

        match process_stream(stream_path, &analyzer, &config) {
            Ok(stats) => {
                info!("✓ Stream processed");
                info!("  Frames: {}", stats.frames);
                info!(
                    "  Detections: {} analyzed / {} received",
                    stats.detections_analyzed, stats.detections_received
                );
                info!(
                    "  Violations: {} pair(s) across {} frame(s), {} unsafe detection(s)",
                    stats.violating_pairs, stats.frames_with_violations, stats.unsafe_detections
                );
                info!("  Processing speed: {:.1} FPS", stats.avg_fps());
                totals.merge(&stats);
            }
            Err(e) => error!("Failed to process stream: {}", e),
        }
    }

    info!("Final Report:");
    info!("  Streams: {}", streams.len());
    info!("  Total frames: {}", totals.frames);
    info!(
        "  Total detections: {} analyzed / {} received",
        totals.detections_analyzed, totals.detections_received
    );
    info!("  Total violating pairs: {}", totals.violating_pairs);
    info!("  Total unsafe detections: {}", totals.unsafe_detections);
    info!(
        "  Frames with violations: {} ({:.1}%)",
        totals.frames_with_violations,
        100.0 * totals.frames_with_violations as f64 / totals.frames.max(1) as f64
    );

    Ok(())
}

#[derive(Debug, Default)]
struct StreamStats {
    frames: u64,
    detections_received: u64,
    detections_analyzed: u64,
    unsafe_detections: u64,
    violating_pairs: u64,
    frames_with_violations: u64,
    duration_secs: f64,
}

impl StreamStats {
    fn avg_fps(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.frames as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    fn merge(&mut self, other: &Self) {
        self.frames += other.frames;
        self.detections_received += other.detections_received;
        self.detections_analyzed += other.detections_analyzed;
        self.unsafe_detections += other.unsafe_detections;
        self.violating_pairs += other.violating_pairs;
        self.frames_with_violations += other.frames_with_violations;
        self.duration_secs += other.duration_secs;
    }
}

fn find_detection_streams(dir: &str) -> Result<Vec<PathBuf>> {
    let mut streams = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            streams.push(path.to_path_buf());
        }
    }

    streams.sort();
    Ok(streams)
}

fn process_stream(path: &Path, analyzer: &DistanceAnalyzer, config: &Config) -> Result<StreamStats> {
    let start_time = Instant::now();

    let mut source = DetectionSource::open(path)?;

    std::fs::create_dir_all(&config.input.output_dir)?;
    let stream_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stream");
    let results_path =
        Path::new(&config.input.output_dir).join(format!("{}_analysis.jsonl", stream_name));
    let mut results_file = std::fs::File::create(&results_path)?;
    info!("Results will be written to: {}", results_path.display());

    let mut stats = StreamStats::default();
    let mut size_warned = false;

    while let Some(record) = source.next_frame()? {
        let frame = Frame {
            index: record.frame,
            width: record.width,
            height: record.height,
        };

        if let Some(calibration) = analyzer.calibration() {
            if !size_warned && (frame.width, frame.height) != calibration.source_size {
                warn!(
                    "Stream frames are {}x{} but the calibration was fit against {}x{}",
                    frame.width, frame.height, calibration.source_size.0, calibration.source_size.1
                );
                size_warned = true;
            }
        }

        let result = analyzer.analyze(Some(&frame), &record.detections);

        stats.frames += 1;
        stats.detections_received += record.detections.len() as u64;
        stats.detections_analyzed += result.detections.len() as u64;
        stats.unsafe_detections += result.violation_count() as u64;
        let pairs = result.violation_edges().len() as u64;
        stats.violating_pairs += pairs;
        if pairs > 0 {
            stats.frames_with_violations += 1;
        }

        save_frame_result(frame.index, &result, &mut results_file)?;

        if stats.frames % 100 == 0 {
            info!(
                "Progress: {} frames | {} violating pair(s) so far",
                stats.frames, stats.violating_pairs
            );
        }
    }

    stats.duration_secs = start_time.elapsed().as_secs_f64();
    Ok(stats)
}

fn save_frame_result(frame: u64, result: &FrameResult, file: &mut std::fs::File) -> Result<()> {
    let record = serde_json::json!({
        "frame": frame,
        "detections": result.detections,
        "warped_view": result.warped_view,
        "violation_edges": result.violation_edges(),
    });
    writeln!(file, "{}", serde_json::to_string(&record)?)?;
    Ok(())
}
