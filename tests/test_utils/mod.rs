#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use spectrum_weaver::testgen::{self, WavEncoding};
use spectrum_weaver::{AnalysisSession, SessionEvent, SpectrogramColumn};
use uuid::Uuid;

/// A file in the system temp dir, removed when dropped
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(extension: &str) -> Self {
        let name = format!("spectrum-weaver-{}.{}", Uuid::new_v4(), extension);
        Self {
            path: std::env::temp_dir().join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Mono 16-bit WAV with a steady sine
pub fn tone_wav(freq_hz: f32, sample_rate: u32, frames: usize) -> TempFile {
    let file = TempFile::new("wav");
    let samples = testgen::sine(freq_hz, sample_rate, frames, 0.5);
    testgen::write_wav(file.path(), &samples, sample_rate, 1, WavEncoding::Pcm16)
        .expect("Failed to write tone fixture");
    file
}

/// Interleaved WAV from planar channels
pub fn multichannel_wav(channels: &[Vec<f32>], sample_rate: u32, encoding: WavEncoding) -> TempFile {
    let file = TempFile::new("wav");
    let samples = testgen::interleave(channels);
    testgen::write_wav(file.path(), &samples, sample_rate, channels.len() as u16, encoding)
        .expect("Failed to write multichannel fixture");
    file
}

/// A file with arbitrary bytes under the given extension
pub fn raw_file(extension: &str, bytes: &[u8]) -> TempFile {
    let file = TempFile::new(extension);
    fs::write(file.path(), bytes).expect("Failed to write raw fixture");
    file
}

/// Drive a session to its terminal event, collecting everything
pub fn collect_events(session: &mut AnalysisSession) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    session.run_to_completion(|e| events.push(e));
    events
}

/// Like `collect_events`, but with a consumer that sleeps after every column
pub fn collect_slowly(session: &mut AnalysisSession, delay: Duration) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while !session.is_finished() {
        if let Some(event) = session.wait_event(Duration::from_millis(200)) {
            if matches!(event, SessionEvent::Column(_)) {
                std::thread::sleep(delay);
            }
            events.push(event);
        }
    }
    events
}

pub fn columns(events: &[SessionEvent]) -> Vec<&SpectrogramColumn> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Column(c) => Some(c),
            _ => None,
        })
        .collect()
}

pub fn progress_values(events: &[SessionEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Progress { fraction } => Some(*fraction),
            _ => None,
        })
        .collect()
}

pub fn terminal_events(events: &[SessionEvent]) -> Vec<&SessionEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}

pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_spectrum-weaver"))
}

pub fn run_cli<I, S>(args: I) -> std::process::Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(get_binary_path())
        .args(args)
        .output()
        .expect("Failed to execute spectrum-weaver")
}
