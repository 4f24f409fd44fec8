// src/core/batcher.rs
//
// Rolling assembly of decoded samples into overlapping analysis windows.

use std::collections::VecDeque;

use super::dsp::WindowFunction;
use super::source::Frame;
use crate::error::{Result, SpectroError};

/// A fixed-length run of samples ready for the transform
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWindow {
    /// Stream index of the first sample
    pub offset: u64,
    /// Lane the samples came from (0 when downmixed)
    pub channel: usize,
    /// Exactly `window_size` samples
    pub samples: Vec<f32>,
    pub window_function: WindowFunction,
    /// Zero-padded tail window emitted at end of stream
    pub partial: bool,
    /// Samples taken from the stream; the rest is padding
    pub valid_len: usize,
}

/// Outcome of `FrameBatcher::pop_window`
#[derive(Debug, Clone, PartialEq)]
pub enum WindowPoll {
    Ready(AnalysisWindow),
    NotReady,
}

impl WindowPoll {
    pub fn ready(self) -> Option<AnalysisWindow> {
        match self {
            WindowPoll::Ready(window) => Some(window),
            WindowPoll::NotReady => None,
        }
    }
}

/// Turns a sequence of frames into overlapping windows.
///
/// Each lane keeps its own rolling buffer. The first window is emitted once
/// `window_size` samples are buffered, then one more for every `hop_size`
/// samples that arrive. With several lanes the windows for one offset are
/// emitted for every lane, in lane order, before the buffers advance.
pub struct FrameBatcher {
    window_size: usize,
    hop_size: usize,
    window_function: WindowFunction,
    rings: Vec<VecDeque<f32>>,
    /// Stream index of the front of every ring
    next_offset: u64,
    /// Next lane to emit at `next_offset`
    next_lane: usize,
    /// End index (exclusive) of the last full window emitted on every lane
    covered_end: u64,
    /// Samples pushed per lane
    total: u64,
    finished: bool,
}

impl FrameBatcher {
    pub fn new(
        window_size: usize,
        hop_size: usize,
        chunk_size: usize,
        lanes: usize,
        window_function: WindowFunction,
    ) -> Self {
        let lanes = lanes.max(1);
        let capacity = window_size + chunk_size;
        Self {
            window_size,
            hop_size,
            window_function,
            rings: (0..lanes).map(|_| VecDeque::with_capacity(capacity)).collect(),
            next_offset: 0,
            next_lane: 0,
            covered_end: 0,
            total: 0,
            finished: false,
        }
    }

    pub fn lanes(&self) -> usize {
        self.rings.len()
    }

    /// Samples currently held in one lane
    pub fn buffered(&self) -> usize {
        self.rings[0].len()
    }

    /// Append a frame. Frames must arrive in stream order without gaps and
    /// carry one lane per ring.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if frame.lanes.len() != self.rings.len() {
            return Err(SpectroError::Decode(format!(
                "chunk at {} has {} lanes, expected {}",
                frame.start,
                frame.lanes.len(),
                self.rings.len()
            )));
        }
        if frame.start != self.total {
            return Err(SpectroError::Decode(format!(
                "chunk starts at {}, expected {}",
                frame.start, self.total
            )));
        }
        let len = frame.len() as u64;
        if frame.lanes.iter().any(|lane| lane.len() as u64 != len) {
            return Err(SpectroError::Decode(format!(
                "chunk at {} has lanes of different lengths",
                frame.start
            )));
        }

        for (ring, lane) in self.rings.iter_mut().zip(frame.lanes) {
            ring.extend(lane);
        }
        self.total += len;
        Ok(())
    }

    /// Emit the next full window if enough samples are buffered
    pub fn pop_window(&mut self) -> WindowPoll {
        if self.finished || self.rings[0].len() < self.window_size {
            return WindowPoll::NotReady;
        }

        let lane = self.next_lane;
        let samples: Vec<f32> = self.rings[lane].range(..self.window_size).copied().collect();
        let window = AnalysisWindow {
            offset: self.next_offset,
            channel: lane,
            samples,
            window_function: self.window_function,
            partial: false,
            valid_len: self.window_size,
        };

        self.next_lane += 1;
        if self.next_lane == self.rings.len() {
            self.next_lane = 0;
            self.covered_end = self.next_offset + self.window_size as u64;
            for ring in &mut self.rings {
                ring.drain(..self.hop_size);
            }
            self.next_offset += self.hop_size as u64;
        }

        WindowPoll::Ready(window)
    }

    /// Flush at end of stream.
    ///
    /// Call after `pop_window` has returned `NotReady`. Returns the
    /// zero-padded tail window for each lane when some samples were not
    /// covered by any full window, and nothing otherwise.
    pub fn finish(&mut self) -> Vec<AnalysisWindow> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let uncovered = self.total > self.covered_end && !self.rings[0].is_empty();
        let mut windows = Vec::new();

        if uncovered {
            for (channel, ring) in self.rings.iter().enumerate() {
                let valid_len = ring.len().min(self.window_size);
                let mut samples: Vec<f32> = ring.range(..valid_len).copied().collect();
                samples.resize(self.window_size, 0.0);
                windows.push(AnalysisWindow {
                    offset: self.next_offset,
                    channel,
                    samples,
                    window_function: self.window_function,
                    partial: true,
                    valid_len,
                });
            }
        }

        self.discard();
        windows
    }

    /// Drop all buffered samples
    pub fn discard(&mut self) {
        for ring in &mut self.rings {
            ring.clear();
        }
    }
}
