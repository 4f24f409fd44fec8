// src/core/events.rs
//
// What a session reports to its consumer.

use serde::Serialize;

use super::dsp::SpectrogramColumn;
use super::source::AudioMetadata;
use crate::config::AnalysisConfig;
use crate::error::ErrorKind;

/// Lifecycle of one analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Not started, or still opening the source
    Idle,
    /// Producer loop active
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Running) | (Idle, Failed) | (Running, Completed) | (Running, Cancelled) | (Running, Failed)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Snapshot published once the source is open
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetadata {
    /// Path of the analyzed file, `None` for in-memory sources
    pub source_path: Option<String>,
    pub audio: AudioMetadata,
    pub window_size: usize,
    pub hop_size: usize,
    /// Column streams produced: 1 when downmixed, else one per channel
    pub lanes: usize,
    /// Centre frequency of every bin in Hz
    pub frequencies: Vec<f32>,
    /// Total columns across all lanes, when the stream length is known
    pub expected_columns: Option<u64>,
}

impl SessionMetadata {
    pub fn new(source_path: Option<String>, audio: AudioMetadata, config: &AnalysisConfig) -> Self {
        let lanes = config.channel_mix.lanes(audio.channels);
        let frequencies = config.bin_frequencies(audio.sample_rate);
        let expected_columns = audio
            .total_frames
            .map(|n| config.expected_columns(n) * lanes as u64);

        Self {
            source_path,
            audio,
            window_size: config.window_size,
            hop_size: config.hop_size,
            lanes,
            frequencies,
            expected_columns,
        }
    }

    /// Seconds between successive columns
    pub fn column_interval_secs(&self) -> f64 {
        self.hop_size as f64 / self.audio.sample_rate.max(1) as f64
    }
}

/// Events delivered to the consumer, in order.
///
/// Exactly one terminal event (`Completed`, `Cancelled` or `Failed`) ends
/// the sequence, and no `Column` follows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Metadata(SessionMetadata),
    Column(SpectrogramColumn),
    Progress { fraction: f64 },
    Completed,
    Cancelled,
    Failed { kind: ErrorKind, message: String },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed { .. })
    }
}

/// Point-in-time view of a session's shared status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Fraction decoded, in [0, 1]
    pub progress: f64,
    pub failure: Option<(ErrorKind, String)>,
    pub metadata: Option<SessionMetadata>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            progress: 0.0,
            failure: None,
            metadata: None,
        }
    }
}

impl SessionStatus {
    /// The terminal event matching this status, if the state is terminal
    pub fn terminal_event(&self) -> Option<SessionEvent> {
        match self.state {
            SessionState::Completed => Some(SessionEvent::Completed),
            SessionState::Cancelled => Some(SessionEvent::Cancelled),
            SessionState::Failed => {
                let (kind, message) = self
                    .failure
                    .clone()
                    .unwrap_or((ErrorKind::Decode, "unknown failure".to_string()));
                Some(SessionEvent::Failed { kind, message })
            }
            SessionState::Idle | SessionState::Running => None,
        }
    }
}
