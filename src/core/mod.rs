//! Core streaming analysis engine

pub mod batcher;
pub mod channel;
pub mod decoder;
pub mod dsp;
pub mod events;
pub mod session;
pub mod source;
pub mod visualization;

pub use batcher::{AnalysisWindow, FrameBatcher, WindowPoll};
pub use channel::{result_channel, CancellationToken, ColumnReceiver, ColumnSender, PutError, TakeError};
pub use decoder::{AudioSource, FormatKind, MAX_IO_RETRIES};
pub use dsp::{SpectrogramColumn, SpectrogramComputer, WindowFunction};
pub use events::{SessionEvent, SessionMetadata, SessionState, SessionStatus};
pub use session::{AnalysisSession, SessionSlot};
pub use source::{AudioMetadata, AudioStream, Frame, MemorySource, SampleSource};
