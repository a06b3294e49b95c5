use std::collections::HashMap;
use std::time::Instant;

/// Stage name for face localisation plus mask classification.
pub const STAGE_PREDICT: &str = "predict";
/// Stage name for drawing the overlay.
pub const STAGE_ANNOTATE: &str = "annotate";
/// Stage name for encoding the annotated frame.
pub const STAGE_WRITE: &str = "write";
/// Metric name for faces classified in one frame.
pub const METRIC_FACES: &str = "faces";

/// Observer for stream-level events: progress, per-stage timings and
/// per-frame metrics.
pub trait PipelineLogger: Send {
    /// `total` is 0 for live sources.
    fn progress(&mut self, current: usize, total: usize);

    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logs throttled progress through `log` and keeps every timing and metric
/// sample for the closing summary.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Formatted report, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let frames = self.frames_seen;
        let mut lines = vec![format!(
            "Run summary ({frames} frames, {elapsed_s:.1}s elapsed):"
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, durations) in stages {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.iter().collect();
        metric_names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, values) in metric_names {
            let total: f64 = values.iter().sum();
            lines.push(format!("  {name}: avg {:.2}  total {total:.0}", mean(values)));
        }

        if frames > 0 && elapsed_s > 0.0 {
            lines.push(format!("  Throughput: {:.1} fps", frames as f64 / elapsed_s));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        if total == 0 {
            if current % self.throttle_frames == 0 {
                log::info!("Processed {current} frames");
            }
        } else if current % self.throttle_frames == 0 || current == total {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
