//! Output formatting for CLI results

use colorful::Colorful;
use serde::Serialize;

use crate::core::{SessionEvent, SessionMetadata, SessionState, SpectrogramColumn};
use crate::error::ErrorKind;

/// What one analysis run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub file: String,
    pub state: SessionState,
    pub columns: u64,
    pub lanes: usize,
    pub expected_columns: Option<u64>,
    pub dropped: u64,
    pub high_water_mark: usize,
    pub capacity: usize,
    pub elapsed_secs: f64,
    /// Frequency most often found at the peak bin
    pub dominant_hz: Option<f32>,
    pub failure: Option<(ErrorKind, String)>,
}

/// Tracks the dominant peak across columns without keeping them
#[derive(Debug, Default)]
pub struct PeakHistogram {
    counts: Vec<u64>,
}

impl PeakHistogram {
    pub fn record(&mut self, column: &SpectrogramColumn) {
        if let Some((bin, _)) = column.peak_bin() {
            if self.counts.len() <= bin {
                self.counts.resize(bin + 1, 0);
            }
            self.counts[bin] += 1;
        }
    }

    pub fn dominant_bin(&self) -> Option<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .max_by_key(|(bin, n)| (**n, std::cmp::Reverse(*bin)))
            .map(|(bin, _)| bin)
    }
}

/// Format stream metadata for terminal output
pub fn format_metadata(meta: &SessionMetadata) -> String {
    let audio = &meta.audio;
    let mut output = String::new();

    let format = audio.format.map(|f| f.name()).unwrap_or("memory");
    output.push_str(&format!("  Format: {} ({})\n", format, audio.codec_name));
    output.push_str(&format!("  Sample Rate: {} Hz\n", audio.sample_rate));
    output.push_str(&format!("  Channels: {}\n", audio.channels));
    match audio.duration_secs {
        Some(d) => output.push_str(&format!("  Duration: {:.2}s\n", d)),
        None => output.push_str("  Duration: unknown\n"),
    }
    output.push_str(&format!(
        "  Window: {} / hop {} ({:.1} ms per column, {} bins)\n",
        meta.window_size,
        meta.hop_size,
        meta.column_interval_secs() * 1000.0,
        meta.frequencies.len()
    ));
    for (key, value) in &audio.tags {
        output.push_str(&format!("  {}: {}\n", key, value));
    }

    output
}

/// One-line description of a column for verbose output
pub fn format_column(column: &SpectrogramColumn, frequencies: &[f32]) -> String {
    let peak = column
        .peak_bin()
        .map(|(bin, value)| {
            let hz = frequencies.get(bin).copied().unwrap_or(0.0);
            format!("peak {:.0} Hz ({:.1})", hz, value)
        })
        .unwrap_or_else(|| "empty".to_string());

    format!(
        "    [{:>8.3}s ch{}] {}{}",
        column.time_secs,
        column.channel,
        peak,
        if column.partial { " (padded)" } else { "" }
    )
}

/// Format the final summary for terminal output
pub fn format_summary(summary: &RunSummary) -> String {
    let mut output = String::new();

    let status = match summary.state {
        SessionState::Completed => "✓ COMPLETED".green().to_string(),
        SessionState::Cancelled => "— CANCELLED".yellow().to_string(),
        SessionState::Failed => "✗ FAILED".red().to_string(),
        other => other.name().to_string(),
    };
    output.push_str(&format!("  Status: {}\n", status));

    if let Some((kind, message)) = &summary.failure {
        output.push_str(&format!("    • {}\n", format!("{}: {}", kind, message).red()));
    }

    match summary.expected_columns {
        Some(expected) => output.push_str(&format!(
            "  Columns: {} of {} expected ({} lane(s))\n",
            summary.columns, expected, summary.lanes
        )),
        None => output.push_str(&format!(
            "  Columns: {} ({} lane(s))\n",
            summary.columns, summary.lanes
        )),
    }

    output.push_str(&format!(
        "  Buffer: peak {} of {} columns\n",
        summary.high_water_mark, summary.capacity
    ));
    if summary.dropped > 0 {
        output.push_str(&format!(
            "  {}\n",
            format!("Dropped {} columns under backpressure", summary.dropped).yellow()
        ));
    }
    if let Some(hz) = summary.dominant_hz {
        output.push_str(&format!("  Dominant Frequency: {:.0} Hz\n", hz));
    }
    output.push_str(&format!("  Elapsed: {:.2}s\n", summary.elapsed_secs));

    output
}

/// One event as a single JSON line
pub fn format_json_event(event: &SessionEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Summary as pretty-printed JSON
pub fn format_json_summary(summary: &RunSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}
