// src/core/decoder.rs
//
// Streaming audio decoding. The container is identified from its leading
// bytes, then Symphonia decodes it packet by packet; decoded samples are
// handed out in fixed-size chunks so the whole file never sits in memory.

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision};
use symphonia::core::probe::Hint;

use super::source::{AudioMetadata, AudioStream, Frame, SampleSource};
use crate::config::ChannelMix;
use crate::error::{Result, SpectroError};

/// Transient I/O failures tolerated in a row before decoding gives up
pub const MAX_IO_RETRIES: usize = 3;

/// Bytes read from the head of the file for format sniffing
const SNIFF_LEN: usize = 64;

/// Supported containers, identified by content rather than file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Wav,
    Mp3,
    Flac,
    Ogg,
    M4a,
    /// Raw AAC in an ADTS stream
    Aac,
}

impl FormatKind {
    /// Identify a container from the first bytes of a file
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.len() >= 12
            && (&header[0..4] == b"RIFF" || &header[0..4] == b"RF64")
            && &header[8..12] == b"WAVE"
        {
            return Some(Self::Wav);
        }
        if header.starts_with(b"fLaC") {
            return Some(Self::Flac);
        }
        if header.starts_with(b"OggS") {
            return Some(Self::Ogg);
        }
        if header.len() >= 8 && &header[4..8] == b"ftyp" {
            return Some(Self::M4a);
        }
        if header.starts_with(b"ID3") {
            return Some(Self::Mp3);
        }
        if header.len() >= 2 && header[0] == 0xFF {
            // ADTS: 12-bit sync, layer bits always 00
            if header[1] & 0xF6 == 0xF0 {
                return Some(Self::Aac);
            }
            // MPEG audio frame sync with a valid layer
            if header[1] & 0xE0 == 0xE0 && header[1] & 0x06 != 0 {
                return Some(Self::Mp3);
            }
        }
        None
    }

    /// Sniff the header; the extension only settles the ID3-prefixed case,
    /// which may wrap either MP3 or ADTS data.
    pub fn detect(header: &[u8], path: &Path) -> Option<Self> {
        let sniffed = Self::sniff(header)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match (sniffed, ext.as_deref()) {
            (Self::Mp3, Some("aac")) if header.starts_with(b"ID3") => Some(Self::Aac),
            (kind, _) => Some(kind),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::M4a => "m4a",
            Self::Aac => "aac",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Wav => "WAV",
            Self::Mp3 => "MP3",
            Self::Flac => "FLAC",
            Self::Ogg => "Ogg",
            Self::M4a => "M4A",
            Self::Aac => "AAC",
        }
    }

    /// Whether the header states an exact frame count we can hold decoding to
    fn declares_exact_length(&self) -> bool {
        matches!(self, Self::Wav | Self::Flac)
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Forward-only decoder over one audio file
pub struct AudioSource {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: FormatKind,
    stream: AudioStream,
    channel_mix: ChannelMix,
    /// Reusable conversion buffer and its capacity in frames
    sample_buf: Option<(SampleBuffer<f32>, usize)>,
    /// Interleaved samples decoded but not yet handed out
    pending: VecDeque<f32>,
    /// Channel count of the decoded buffers
    channels: usize,
    decoded_frames: u64,
    io_retries: usize,
    exhausted: bool,
}

impl AudioSource {
    /// Open a file, identify its container and prepare the decoder.
    ///
    /// The first packet is decoded eagerly so the channel layout is known
    /// before the metadata is handed out.
    pub fn open(path: &Path, channel_mix: ChannelMix) -> Result<Self> {
        let unreadable = |e: std::io::Error| {
            SpectroError::UnsupportedFormat(format!("{}: cannot be read: {}", path.display(), e))
        };
        let mut file = File::open(path).map_err(unreadable)?;

        let mut header = [0u8; SNIFF_LEN];
        let read = read_header(&mut file, &mut header).map_err(unreadable)?;
        let format = FormatKind::detect(&header[..read], path).ok_or_else(|| {
            SpectroError::UnsupportedFormat(format!(
                "{}: unrecognized container",
                path.display()
            ))
        })?;
        file.seek(SeekFrom::Start(0)).map_err(unreadable)?;

        debug!("{}: sniffed {} container", path.display(), format);

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let mut probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| {
                SpectroError::UnsupportedFormat(format!(
                    "{}: {} container could not be parsed: {}",
                    path.display(),
                    format,
                    e
                ))
            })?;

        let mut tags = Vec::new();
        if let Some(meta) = probed.metadata.get() {
            if let Some(revision) = meta.current() {
                collect_tags(revision, &mut tags);
            }
        }
        let mut reader = probed.format;
        if let Some(revision) = reader.metadata().current() {
            collect_tags(revision, &mut tags);
        }

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SpectroError::UnsupportedFormat(format!(
                    "{}: no decodable audio track",
                    path.display()
                ))
            })?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or_else(|| {
            SpectroError::UnsupportedFormat(format!(
                "{}: stream does not specify a sample rate",
                path.display()
            ))
        })?;

        let codecs = symphonia::default::get_codecs();
        let codec_name = codecs
            .get_codec(params.codec)
            .map(|d| d.short_name.to_string())
            .unwrap_or_else(|| format!("{:?}", params.codec));

        let decoder = codecs
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                SpectroError::UnsupportedFormat(format!(
                    "{}: no decoder for codec {}: {}",
                    path.display(),
                    codec_name,
                    e
                ))
            })?;

        let channels = params.channels.map(|c| c.count()).unwrap_or(0);
        let total_frames = params.n_frames.filter(|&n| n > 0);

        let mut metadata = AudioMetadata::new(sample_rate, channels, total_frames);
        metadata.format = Some(format);
        metadata.codec_name = codec_name;
        metadata.tags = tags;

        let mut source = Self {
            reader,
            decoder,
            track_id,
            format,
            stream: AudioStream::new(metadata),
            channel_mix,
            sample_buf: None,
            pending: VecDeque::new(),
            channels,
            decoded_frames: 0,
            io_retries: 0,
            exhausted: false,
        };

        if !source.fill_pending()? {
            source.check_complete()?;
            return Err(SpectroError::Decode(format!(
                "{}: no audio samples decoded",
                path.display()
            )));
        }
        source.stream.metadata.channels = source.channels;

        info!(
            "Opened {} ({} / {}, {} Hz, {} ch, {})",
            path.display(),
            source.format,
            source.stream.metadata.codec_name,
            sample_rate,
            source.channels,
            match source.stream.metadata.duration_secs {
                Some(secs) => format!("{:.2}s", secs),
                None => "unknown length".to_string(),
            }
        );

        Ok(source)
    }

    /// Open the file only to read its metadata
    pub fn probe(path: &Path) -> Result<AudioMetadata> {
        Ok(Self::open(path, ChannelMix::MonoDownmix)?.stream.metadata)
    }

    pub fn format(&self) -> FormatKind {
        self.format
    }

    /// Decode the next packet into `pending`. Returns `false` at end of stream.
    fn fill_pending(&mut self) -> Result<bool> {
        loop {
            let reader = &mut self.reader;
            let packet = match read_with_retry(&mut self.io_retries, || reader.next_packet())? {
                PacketRead::Packet(packet) => packet,
                PacketRead::EndOfStream => return Ok(false),
                PacketRead::Reset => {
                    self.decoder.reset();
                    continue;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(buf) => buf,
                Err(e) => {
                    return Err(SpectroError::Decode(format!(
                        "corrupt packet at timestamp {}: {}",
                        packet.ts(),
                        e
                    )));
                }
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let capacity = decoded.capacity();
            let frames = decoded.frames();

            if self.sample_buf.as_ref().map_or(true, |(_, cap)| *cap < capacity) {
                self.sample_buf = Some((SampleBuffer::new(capacity as u64, spec), capacity));
            }
            if let Some((buf, _)) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                self.pending.extend(buf.samples());
            }

            let channels = spec.channels.count();
            if self.decoded_frames > 0 && channels != self.channels {
                return Err(SpectroError::Decode(format!(
                    "channel count changed from {} to {} at frame {}",
                    self.channels, channels, self.decoded_frames
                )));
            }
            self.channels = channels;
            self.decoded_frames += frames as u64;
            return Ok(true);
        }
    }

    /// A declared-length stream that ends early is truncated
    fn check_complete(&self) -> Result<()> {
        if !self.format.declares_exact_length() {
            return Ok(());
        }
        match self.stream.metadata.total_frames {
            Some(total) if self.decoded_frames < total => Err(SpectroError::Decode(format!(
                "stream truncated: decoded {} of {} frames",
                self.decoded_frames, total
            ))),
            _ => Ok(()),
        }
    }
}

impl SampleSource for AudioSource {
    fn stream(&self) -> &AudioStream {
        &self.stream
    }

    fn set_channel_mix(&mut self, mix: ChannelMix) {
        self.channel_mix = mix;
    }

    fn decode_next(&mut self, chunk_size: usize) -> Result<Option<Frame>> {
        let channels = self.channels.max(1);
        let wanted = chunk_size * channels;

        while self.pending.len() < wanted && !self.exhausted {
            if !self.fill_pending()? {
                self.exhausted = true;
                self.check_complete()?;
                debug!("End of stream after {} frames", self.decoded_frames);
            }
        }

        let take = (self.pending.len() / channels).min(chunk_size) * channels;
        if take == 0 {
            return Ok(None);
        }

        let samples: Vec<f32> = self.pending.drain(..take).collect();
        let frame = Frame::from_interleaved(
            self.stream.position(),
            &samples,
            channels,
            self.channel_mix,
        );
        self.stream.advance((take / channels) as u64);
        Ok(Some(frame))
    }
}

fn read_header(file: &mut File, header: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A packet read after transient I/O failures were absorbed
enum PacketRead<T> {
    Packet(T),
    EndOfStream,
    /// The decoder must be reset before the next packet
    Reset,
}

/// Run `read`, retrying transient I/O errors. `retries` counts consecutive
/// failures across calls and is cleared by every successful read.
fn read_with_retry<T, F>(retries: &mut usize, mut read: F) -> Result<PacketRead<T>>
where
    F: FnMut() -> symphonia::core::errors::Result<T>,
{
    loop {
        match read() {
            Ok(packet) => {
                *retries = 0;
                return Ok(PacketRead::Packet(packet));
            }
            Err(SymphoniaError::IoError(ref e)) if e.kind() == IoErrorKind::UnexpectedEof => {
                return Ok(PacketRead::EndOfStream);
            }
            Err(SymphoniaError::IoError(e)) if is_transient(&e) => {
                *retries += 1;
                if *retries > MAX_IO_RETRIES {
                    return Err(SpectroError::Decode(format!(
                        "I/O did not recover after {} retries: {}",
                        MAX_IO_RETRIES, e
                    )));
                }
                warn!("Transient read error ({}), retry {}/{}", e, retries, MAX_IO_RETRIES);
            }
            Err(SymphoniaError::ResetRequired) => return Ok(PacketRead::Reset),
            Err(e) => return Err(SpectroError::Decode(e.to_string())),
        }
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        IoErrorKind::Interrupted | IoErrorKind::WouldBlock | IoErrorKind::TimedOut
    )
}

fn collect_tags(revision: &MetadataRevision, tags: &mut Vec<(String, String)>) {
    for tag in revision.tags() {
        let key = match tag.std_key {
            Some(std_key) => format!("{:?}", std_key),
            None => tag.key.clone(),
        };
        tags.push((key, tag.value.to_string()));
    }
}
