// src/core/session.rs
//
// Analysis session: runs decode -> window -> transform -> publish on a
// dedicated producer thread and reports back through the result channel,
// a side channel of events and one guarded status cell.

use crossbeam_channel::{unbounded, Receiver, Select, Sender};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::batcher::{FrameBatcher, WindowPoll};
use super::channel::{result_channel, CancellationToken, ColumnReceiver, ColumnSender, TakeError};
use super::decoder::AudioSource;
use super::dsp::SpectrogramComputer;
use super::events::{SessionEvent, SessionMetadata, SessionState, SessionStatus};
use super::source::SampleSource;
use crate::config::AnalysisConfig;
use crate::error::{Result, SpectroError};

/// Smallest progress step reported as an event
const PROGRESS_STEP: f64 = 1e-3;

/// Status cell shared between the session and its producer
#[derive(Debug, Default)]
struct Shared {
    status: Mutex<SessionStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, next: SessionState) {
        Self::apply(&mut self.lock(), next);
    }

    fn apply(status: &mut SessionStatus, next: SessionState) {
        if status.state.can_transition_to(next) {
            info!("Session {} -> {}", status.state, next);
            status.state = next;
        } else {
            warn!("Ignoring transition {} -> {}", status.state, next);
        }
    }

    /// Settle a producer that reached end of stream. The cancel flag is read
    /// under the status lock, so a cancel that got in first wins.
    fn complete(&self, cancel: &CancellationToken) -> SessionState {
        let mut status = self.lock();
        let next = if cancel.is_cancelled() {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        };
        Self::apply(&mut status, next);
        status.state
    }

    fn fail(&self, err: &SpectroError) {
        warn!("Session failed: {}", err);
        let mut status = self.lock();
        status.failure = Some((err.kind(), err.to_string()));
        drop(status);
        self.transition(SessionState::Failed);
    }
}

/// Producer-side handles moved into the worker thread
struct Producer {
    config: AnalysisConfig,
    shared: Arc<Shared>,
    columns: ColumnSender,
    events: Sender<SessionEvent>,
    cancel: CancellationToken,
    source_path: Option<String>,
}

enum Outcome {
    EndOfStream,
    Cancelled,
    Failed(SpectroError),
}

impl Producer {
    fn run<S, F>(self, open: F)
    where
        S: SampleSource,
        F: FnOnce() -> Result<S>,
    {
        let mut source = match open() {
            Ok(source) => source,
            Err(e) => {
                self.columns.close();
                self.shared.fail(&e);
                return;
            }
        };
        source.set_channel_mix(self.config.channel_mix);

        let metadata = SessionMetadata::new(
            self.source_path.clone(),
            source.stream().metadata.clone(),
            &self.config,
        );
        self.shared.lock().metadata = Some(metadata.clone());
        self.shared.transition(SessionState::Running);
        let _ = self.events.send(SessionEvent::Metadata(metadata.clone()));

        let mut batcher = FrameBatcher::new(
            self.config.window_size,
            self.config.hop_size,
            self.config.chunk_size,
            metadata.lanes,
            self.config.window_function,
        );
        let mut computer = SpectrogramComputer::new(&self.config, metadata.audio.sample_rate);
        let mut reported = 0.0f64;

        let outcome = 'decode: loop {
            let next = source.decode_next(self.config.chunk_size);
            if self.cancel.is_cancelled() {
                break 'decode Outcome::Cancelled;
            }

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break 'decode Outcome::EndOfStream,
                Err(e) => break 'decode Outcome::Failed(e),
            };
            debug!("Chunk at {} ({} frames)", frame.start, frame.len());

            if let Err(e) = batcher.push(frame) {
                break 'decode Outcome::Failed(e);
            }
            while let WindowPoll::Ready(window) = batcher.pop_window() {
                let column = computer.transform(&window);
                if self.columns.put(column).is_err() {
                    break 'decode Outcome::Cancelled;
                }
            }

            if let Some(fraction) = source.stream().fraction_decoded() {
                self.report_progress(fraction, &mut reported);
            }
        };

        let outcome = match outcome {
            Outcome::EndOfStream => self.flush(&mut batcher, &mut computer),
            other => other,
        };

        drop(source);
        batcher.discard();

        match outcome {
            Outcome::EndOfStream => {
                self.report_progress(1.0, &mut reported);
                if self.shared.complete(&self.cancel) == SessionState::Cancelled {
                    let discarded = self.columns.discard();
                    debug!("Cancelled at end of stream, discarded {} columns", discarded);
                } else {
                    self.columns.close();
                }
            }
            Outcome::Cancelled => {
                let discarded = self.columns.discard();
                debug!("Discarded {} buffered columns", discarded);
                self.shared.transition(SessionState::Cancelled);
            }
            Outcome::Failed(e) => {
                let discarded = self.columns.discard();
                debug!("Discarded {} buffered columns", discarded);
                self.shared.fail(&e);
            }
        }
    }

    /// Publish the padded tail windows
    fn flush(&self, batcher: &mut FrameBatcher, computer: &mut SpectrogramComputer) -> Outcome {
        for window in batcher.finish() {
            let column = computer.transform(&window);
            if self.columns.put(column).is_err() {
                return Outcome::Cancelled;
            }
        }
        Outcome::EndOfStream
    }

    /// Report progress when it moved by at least `PROGRESS_STEP`, or reached 1
    fn report_progress(&self, fraction: f64, reported: &mut f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let finished = fraction >= 1.0 && *reported < 1.0;
        if fraction - *reported < PROGRESS_STEP && !finished {
            return;
        }

        *reported = fraction;
        self.shared.lock().progress = fraction;
        let _ = self.events.send(SessionEvent::Progress { fraction });
    }
}

/// Consumer-side handles of a started session
struct Run {
    columns: ColumnReceiver,
    events: Receiver<SessionEvent>,
    worker: Option<JoinHandle<()>>,
}

/// One analysis of one audio stream.
///
/// Created `Idle`; `start` launches the producer thread. The consumer pulls
/// events one at a time with `poll_event` / `wait_event`, in batches of up to
/// `column_batch` columns with `poll_batch` / `wait_batch`, or hands a
/// callback to `run_to_completion` / `run_batched`. Dropping a running
/// session cancels it and waits for the producer to exit.
pub struct AnalysisSession {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    config: Option<AnalysisConfig>,
    run: Option<Run>,
    terminal_delivered: bool,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            cancel: CancellationToken::new(),
            config: None,
            run: None,
            terminal_delivered: false,
        }
    }

    /// Start analyzing the file at `path`.
    ///
    /// Configuration problems are returned here and leave the session
    /// `Idle`. Everything found while opening or decoding the file is
    /// reported through the event stream as `Failed`.
    pub fn start<P: AsRef<Path>>(&mut self, path: P, config: AnalysisConfig) -> Result<()> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let display = path.display().to_string();
        let mix = config.channel_mix;
        self.launch(config, Some(display), move || AudioSource::open(&path, mix))
    }

    /// Start analyzing an already opened source
    pub fn start_with_source<S>(&mut self, source: S, config: AnalysisConfig) -> Result<()>
    where
        S: SampleSource + Send + 'static,
    {
        self.launch(config, None, move || Ok(source))
    }

    fn launch<S, F>(&mut self, config: AnalysisConfig, source_path: Option<String>, open: F) -> Result<()>
    where
        S: SampleSource + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        if self.run.is_some() || self.state() != SessionState::Idle {
            return Err(SpectroError::InvalidState(format!(
                "session already started (state: {})",
                self.state()
            )));
        }
        config.validate()?;

        let (columns_tx, columns_rx) =
            result_channel(config.channel_capacity, config.backpressure, self.cancel.clone());
        let (events_tx, events_rx) = unbounded();

        let producer = Producer {
            config: config.clone(),
            shared: self.shared.clone(),
            columns: columns_tx,
            events: events_tx,
            cancel: self.cancel.clone(),
            source_path,
        };

        let worker = thread::Builder::new()
            .name("spectrum-producer".to_string())
            .spawn(move || producer.run(open))?;

        self.config = Some(config);
        self.run = Some(Run {
            columns: columns_rx,
            events: events_rx,
            worker: Some(worker),
        });
        Ok(())
    }

    /// Ask the producer to stop at its next chunk boundary. Does nothing
    /// before `start` or once the session has settled.
    pub fn cancel(&self) {
        if self.run.is_none() {
            return;
        }
        let status = self.shared.lock();
        if status.state.is_terminal() {
            debug!("Cancel ignored, session already {}", status.state);
            return;
        }
        info!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Cancel and wait for the producer to exit. Returns the final state.
    pub fn cancel_and_wait(&mut self) -> SessionState {
        self.cancel();
        self.join();
        self.state()
    }

    /// Wait for the producer thread to exit
    pub fn join(&mut self) {
        if let Some(handle) = self.run.as_mut().and_then(|run| run.worker.take()) {
            if handle.join().is_err() {
                let err = SpectroError::Decode("producer thread panicked".to_string());
                self.shared.fail(&err);
            }
        }
    }

    /// Join a producer that exited without settling the session and mark the
    /// session failed. Returns false while the producer is still running.
    fn reap_exited_worker(&mut self) -> bool {
        let exited = self
            .run
            .as_ref()
            .and_then(|run| run.worker.as_ref())
            .map_or(true, |handle| handle.is_finished());
        if !exited {
            return false;
        }

        self.join();
        if !self.state().is_terminal() {
            let err = SpectroError::Decode("producer exited without finishing".to_string());
            self.shared.fail(&err);
        }
        true
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn progress(&self) -> f64 {
        self.shared.lock().progress
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().clone()
    }

    pub fn metadata(&self) -> Option<SessionMetadata> {
        self.shared.lock().metadata.clone()
    }

    pub fn config(&self) -> Option<&AnalysisConfig> {
        self.config.as_ref()
    }

    /// Result channel of a started session
    pub fn columns(&self) -> Option<&ColumnReceiver> {
        self.run.as_ref().map(|run| &run.columns)
    }

    /// Whether the terminal event has been handed out
    pub fn is_finished(&self) -> bool {
        self.terminal_delivered
    }

    /// Next event if one is ready, without waiting.
    ///
    /// Side events come first, then buffered columns; the terminal event is
    /// returned once the result channel is closed and drained. After
    /// cancellation is requested no further column is returned.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        if self.terminal_delivered {
            return None;
        }
        {
            let run = self.run.as_ref()?;
            if let Ok(event) = run.events.try_recv() {
                return Some(event);
            }

            loop {
                match run.columns.try_take() {
                    Ok(column) if self.cancel.is_cancelled() => {
                        drop(column);
                        continue;
                    }
                    Ok(column) => return Some(SessionEvent::Column(column)),
                    Err(TakeError::Empty) => return None,
                    Err(TakeError::Closed) => break,
                }
            }
        }

        // A closed channel with an unsettled state means the producer is on
        // its way out, or died before settling
        if !self.state().is_terminal() && !self.reap_exited_worker() {
            return None;
        }

        // Progress sent just before the state changed must come first
        if let Some(event) = self.run.as_ref().and_then(|run| run.events.try_recv().ok()) {
            return Some(event);
        }

        self.terminal_delivered = true;
        self.status().terminal_event()
    }

    /// Wait up to `timeout` for the next event
    pub fn wait_event(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.poll_event() {
                return Some(event);
            }
            let run = match self.run.as_ref() {
                Some(run) if !self.terminal_delivered => run,
                _ => return None,
            };

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let mut select = Select::new();
            select.recv(&run.events);
            if !run.columns.is_finished() {
                select.recv(run.columns.raw());
            }
            let _ = select.ready_timeout(deadline - now);
        }
    }

    /// Columns handed out per batch
    fn column_batch(&self) -> usize {
        self.config.as_ref().map_or(1, |config| config.column_batch.max(1))
    }

    /// Events that are ready now, holding at most `column_batch` columns.
    /// Side events ride along without counting against the limit.
    pub fn poll_batch(&mut self) -> Vec<SessionEvent> {
        let mut batch = Vec::new();
        self.fill_batch(&mut batch, 0);
        batch
    }

    /// Wait up to `timeout` for the first event, then top the batch up with
    /// whatever else is ready
    pub fn wait_batch(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        let mut batch = Vec::new();
        if let Some(first) = self.wait_event(timeout) {
            let columns = usize::from(matches!(first, SessionEvent::Column(_)));
            batch.push(first);
            self.fill_batch(&mut batch, columns);
        }
        batch
    }

    fn fill_batch(&mut self, batch: &mut Vec<SessionEvent>, mut columns: usize) {
        let limit = self.column_batch();
        while columns < limit {
            match self.poll_event() {
                Some(event) => {
                    if matches!(event, SessionEvent::Column(_)) {
                        columns += 1;
                    }
                    batch.push(event);
                }
                None => break,
            }
        }
    }

    /// Feed event batches to `on_batch` until the terminal event has been
    /// delivered. Returns the final state.
    pub fn run_batched<F>(&mut self, mut on_batch: F) -> SessionState
    where
        F: FnMut(Vec<SessionEvent>),
    {
        while self.run.is_some() && !self.terminal_delivered {
            let batch = self.wait_batch(Duration::from_millis(100));
            if !batch.is_empty() {
                on_batch(batch);
            }
        }
        self.join();
        self.state()
    }

    /// Feed every event to `on_event` until the terminal one. Returns the
    /// final state.
    pub fn run_to_completion<F>(&mut self, mut on_event: F) -> SessionState
    where
        F: FnMut(SessionEvent),
    {
        self.run_batched(|batch| batch.into_iter().for_each(&mut on_event))
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        if self.run.is_some() {
            self.cancel.cancel();
            self.join();
        }
    }
}

/// Owner of the current session: loading a new stream first cancels the
/// previous one and waits for its producer to exit.
#[derive(Default)]
pub struct SessionSlot {
    current: Option<AnalysisSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current session with a new analysis of `path`
    pub fn load<P: AsRef<Path>>(&mut self, path: P, config: AnalysisConfig) -> Result<&mut AnalysisSession> {
        config.validate()?;
        self.close();
        let mut session = AnalysisSession::new();
        session.start(path, config)?;
        Ok(self.current.insert(session))
    }

    /// Replace the current session with a new analysis of `source`
    pub fn load_source<S>(&mut self, source: S, config: AnalysisConfig) -> Result<&mut AnalysisSession>
    where
        S: SampleSource + Send + 'static,
    {
        config.validate()?;
        self.close();
        let mut session = AnalysisSession::new();
        session.start_with_source(source, config)?;
        Ok(self.current.insert(session))
    }

    pub fn current(&self) -> Option<&AnalysisSession> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut AnalysisSession> {
        self.current.as_mut()
    }

    /// Tear down the current session. Returns its final state.
    pub fn close(&mut self) -> Option<SessionState> {
        let mut session = self.current.take()?;
        let state = if session.state().is_terminal() {
            session.join();
            session.state()
        } else {
            session.cancel_and_wait()
        };
        debug!("Closed session in state {}", state);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelMix, ConfigBuilder};
    use crate::core::source::{AudioMetadata, AudioStream, Frame, MemorySource};
    use crate::error::ErrorKind;

    /// Declares stereo but always yields a single lane
    struct SingleLaneSource {
        stream: AudioStream,
    }

    impl SingleLaneSource {
        fn new(frames: u64) -> Self {
            Self {
                stream: AudioStream::new(AudioMetadata::new(8000, 2, Some(frames))),
            }
        }
    }

    impl SampleSource for SingleLaneSource {
        fn stream(&self) -> &AudioStream {
            &self.stream
        }

        fn set_channel_mix(&mut self, _mix: ChannelMix) {}

        fn decode_next(&mut self, chunk_size: usize) -> Result<Option<Frame>> {
            let left = self.stream.metadata.total_frames.unwrap_or(0) - self.stream.position();
            let len = (left as usize).min(chunk_size);
            if len == 0 {
                return Ok(None);
            }
            let frame = Frame {
                start: self.stream.position(),
                lanes: vec![vec![0.1; len]],
            };
            self.stream.advance(len as u64);
            Ok(Some(frame))
        }
    }

    /// Panics on its second chunk
    struct PanickingSource {
        stream: AudioStream,
        calls: usize,
    }

    impl SampleSource for PanickingSource {
        fn stream(&self) -> &AudioStream {
            &self.stream
        }

        fn set_channel_mix(&mut self, _mix: ChannelMix) {}

        fn decode_next(&mut self, chunk_size: usize) -> Result<Option<Frame>> {
            self.calls += 1;
            if self.calls > 1 {
                panic!("decoder blew up");
            }
            let frame = Frame {
                start: 0,
                lanes: vec![vec![0.0; chunk_size]],
            };
            self.stream.advance(chunk_size as u64);
            Ok(Some(frame))
        }
    }

    fn stereo_config() -> AnalysisConfig {
        ConfigBuilder::new()
            .window_size(512)
            .hop_size(256)
            .channel_mix(ChannelMix::PerChannel)
            .build()
            .unwrap()
    }

    fn run_with_deadline(session: &mut AnalysisSession) -> Vec<SessionEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while !session.is_finished() {
            assert!(Instant::now() < deadline, "no terminal event, state {}", session.state());
            if let Some(event) = session.wait_event(Duration::from_millis(50)) {
                events.push(event);
            }
        }
        events
    }

    fn collect(session: &mut AnalysisSession) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        session.run_to_completion(|e| events.push(e));
        events
    }

    #[test]
    fn test_idle_session_has_no_events() {
        let mut session = AnalysisSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.poll_event().is_none());
        assert!(session.wait_event(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_invalid_config_keeps_idle() {
        let mut session = AnalysisSession::new();
        let config = ConfigBuilder::new().window_size(256).hop_size(512).build_unchecked();
        let err = session
            .start_with_source(MemorySource::mono(vec![0.0; 100], 8000), config)
            .unwrap_err();
        assert!(matches!(err, SpectroError::Configuration(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_completes_with_ordered_columns() {
        let config = ConfigBuilder::new()
            .window_size(1024)
            .hop_size(512)
            .chunk_size(300)
            .build()
            .unwrap();
        let mut session = AnalysisSession::new();
        session
            .start_with_source(MemorySource::mono(vec![0.25; 2048], 8000), config)
            .unwrap();

        let events = collect(&mut session);
        assert_eq!(session.state(), SessionState::Completed);
        assert!(matches!(events.first(), Some(SessionEvent::Metadata(_))));
        assert_eq!(events.last(), Some(&SessionEvent::Completed));

        let offsets: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Column(c) => Some(c.time_offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 512, 1024]);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[test]
    fn test_second_start_rejected() {
        let mut session = AnalysisSession::new();
        let config = AnalysisConfig::default();
        session
            .start_with_source(MemorySource::mono(vec![0.0; 4096], 8000), config.clone())
            .unwrap();
        let err = session
            .start_with_source(MemorySource::mono(vec![0.0; 4096], 8000), config)
            .unwrap_err();
        assert!(matches!(err, SpectroError::InvalidState(_)));
        collect(&mut session);
    }

    #[test]
    fn test_missing_file_fails_through_events() {
        let mut session = AnalysisSession::new();
        session
            .start("/nonexistent/definitely/missing.wav", AnalysisConfig::default())
            .unwrap();
        let events = collect(&mut session);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            SessionEvent::Failed { kind: ErrorKind::UnsupportedFormat, .. }
        ));
    }

    #[test]
    fn test_slot_replaces_running_session() {
        let config = ConfigBuilder::new()
            .window_size(256)
            .hop_size(128)
            .chunk_size(256)
            .channel_capacity(1)
            .build()
            .unwrap();
        let mut slot = SessionSlot::new();
        // Nobody consumes, so the producer stalls on a full channel
        slot.load_source(MemorySource::mono(vec![0.1; 1 << 20], 8000), config.clone())
            .unwrap();

        let long_running = slot.current().map(|s| s.state());
        assert!(matches!(long_running, Some(SessionState::Idle) | Some(SessionState::Running)));

        slot.load_source(MemorySource::mono(vec![0.1; 512], 8000), config).unwrap();
        let session = slot.current_mut().unwrap();
        let mut events = Vec::new();
        session.run_to_completion(|e| events.push(e));
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(slot.close(), Some(SessionState::Completed));
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_config_decides_channel_mix() {
        let mut session = AnalysisSession::new();
        let source = MemorySource::interleaved(vec![0.1; 8192], 8000, 2, ChannelMix::MonoDownmix);
        session.start_with_source(source, stereo_config()).unwrap();

        let events = run_with_deadline(&mut session);
        assert_eq!(session.state(), SessionState::Completed);
        let channels: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Column(c) => Some(c.channel),
                _ => None,
            })
            .collect();
        let expected = session.metadata().and_then(|m| m.expected_columns);
        assert_eq!(Some(channels.len() as u64), expected);
        assert!(channels.contains(&1));
    }

    #[test]
    fn test_lane_mismatch_fails_session() {
        let mut session = AnalysisSession::new();
        session
            .start_with_source(SingleLaneSource::new(8192), stereo_config())
            .unwrap();

        let events = run_with_deadline(&mut session);
        assert_eq!(session.state(), SessionState::Failed);
        match events.last() {
            Some(SessionEvent::Failed { kind, message }) => {
                assert_eq!(*kind, ErrorKind::Decode);
                assert!(message.contains("lanes"), "{}", message);
            }
            other => panic!("expected a failure, got {:?}", other),
        }
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::Column(_))));
    }

    #[test]
    fn test_producer_panic_fails_session() {
        let mut session = AnalysisSession::new();
        let source = PanickingSource {
            stream: AudioStream::new(AudioMetadata::new(8000, 1, Some(1 << 16))),
            calls: 0,
        };
        session.start_with_source(source, AnalysisConfig::default()).unwrap();

        let events = run_with_deadline(&mut session);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Failed { kind: ErrorKind::Decode, .. })
        ));

        // The callback driver settles the same way
        let mut session = AnalysisSession::new();
        let source = PanickingSource {
            stream: AudioStream::new(AudioMetadata::new(8000, 1, Some(1 << 16))),
            calls: 0,
        };
        session.start_with_source(source, AnalysisConfig::default()).unwrap();
        assert!(!collect(&mut session).is_empty());
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_cancel_after_completion_keeps_columns() {
        let config = ConfigBuilder::new()
            .window_size(1024)
            .hop_size(512)
            .chunk_size(300)
            .channel_capacity(32)
            .build()
            .unwrap();
        let mut session = AnalysisSession::new();
        session
            .start_with_source(MemorySource::mono(vec![0.1; 8192], 8000), config)
            .unwrap();
        session.join();
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.columns().map(|rx| rx.len()), Some(15));

        session.cancel();
        let events = collect(&mut session);
        let delivered = events.iter().filter(|e| matches!(e, SessionEvent::Column(_))).count();
        assert_eq!(delivered, 15);
        assert_eq!(events.last(), Some(&SessionEvent::Completed));
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_cancel_before_start_is_ignored() {
        let mut session = AnalysisSession::new();
        session.cancel();
        session
            .start_with_source(MemorySource::mono(vec![0.1; 4096], 8000), AnalysisConfig::default())
            .unwrap();
        collect(&mut session);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_batches_respect_column_batch() {
        let config = ConfigBuilder::new()
            .window_size(1024)
            .hop_size(512)
            .chunk_size(300)
            .channel_capacity(32)
            .column_batch(4)
            .build()
            .unwrap();
        let mut session = AnalysisSession::new();
        session
            .start_with_source(MemorySource::mono(vec![0.1; 8192], 8000), config)
            .unwrap();
        session.join();

        let mut sizes = Vec::new();
        let mut last = None;
        let state = session.run_batched(|batch| {
            sizes.push(batch.iter().filter(|e| matches!(e, SessionEvent::Column(_))).count());
            last = batch.last().cloned();
        });
        assert_eq!(state, SessionState::Completed);
        assert_eq!(sizes, vec![4, 4, 4, 3]);
        assert_eq!(last, Some(SessionEvent::Completed));
    }
}
