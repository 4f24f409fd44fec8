//! SpectrumWeaver - Streaming spectrogram analysis
//!
//! Decodes an audio file progressively and turns it into spectrogram
//! columns that a renderer can draw while the rest of the file is still
//! being processed. Memory stays bounded regardless of file length.
//!
//! ## Features
//!
//! - **Content-sniffed decoding**: WAV, MP3, FLAC, Ogg Vorbis, M4A and ADTS AAC via Symphonia
//! - **Overlapping STFT windows**: Hann, Hamming, Blackman, Blackman-Harris, rectangular
//! - **Bounded delivery**: blocking or drop-oldest backpressure between producer and consumer
//! - **Cooperative cancellation**: checked at every decoded chunk
//! - **Deterministic output**: identical input and configuration give identical columns
//!
//! ## Module Structure
//!
//! - `core` - Decoding, windowing, transform, result channel and session
//! - `config` - Analysis configuration and presets
//! - `cli` - Command-line interface
//! - `testgen` - Synthetic signals and WAV fixtures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spectrum_weaver::{AnalysisConfig, AnalysisSession, SessionEvent};
//!
//! let mut session = AnalysisSession::new();
//! session.start("track.flac", AnalysisConfig::default())?;
//!
//! let state = session.run_to_completion(|event| match event {
//!     SessionEvent::Column(column) => draw(column),
//!     SessionEvent::Progress { fraction } => println!("{:.0}%", fraction * 100.0),
//!     _ => {}
//! });
//! ```
//!
//! ## Session States
//!
//! | State     | Meaning                                         |
//! |-----------|-------------------------------------------------|
//! | Idle      | Not started, or opening the source              |
//! | Running   | Producer decoding and publishing columns        |
//! | Completed | End of stream reached, every column published   |
//! | Cancelled | Stopped on request at a chunk boundary          |
//! | Failed    | Unsupported format or unrecoverable decode error |

// Core analysis functionality
pub mod core;

// Command-line interface
pub mod cli;

// Configuration and presets
pub mod config;

// Error taxonomy
pub mod error;

// Signal and fixture generation
pub mod testgen;

// Re-export commonly used types at crate root for convenience
pub use config::{AnalysisConfig, AnalysisPreset, Backpressure, ChannelMix, ConfigBuilder, Scaling};
pub use core::{
    AnalysisSession, AnalysisWindow, AudioMetadata, AudioSource, AudioStream, CancellationToken,
    ColumnReceiver, FormatKind, Frame, FrameBatcher, MemorySource, SampleSource, SessionEvent,
    SessionMetadata, SessionSlot, SessionState, SessionStatus, SpectrogramColumn,
    SpectrogramComputer, WindowFunction,
};
pub use error::{ErrorKind, SpectroError};
