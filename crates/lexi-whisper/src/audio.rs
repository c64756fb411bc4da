//! Decoding of uploaded audio into the mono f32 PCM the engines expect.
//!
//! WAV is decoded in process. Browser recordings (Ogg or WebM, usually
//! Opus) are transcoded by an `ffmpeg` child process into 16 kHz mono
//! PCM. The container is detected from the leading bytes, never from a
//! file name or content type.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use hound::{SampleFormat, WavReader};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use lexi_core::error::LexiError;

/// Sample rate requested from ffmpeg, which is what Whisper runs at.
pub const TRANSCODE_SAMPLE_RATE: u32 = 16_000;

/// Container formats recognised in uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Ogg,
    WebM,
    Unknown,
}

impl AudioFormat {
    /// Identify the container from its magic bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioFormat::Wav
        } else if bytes.starts_with(b"OggS") {
            AudioFormat::Ogg
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            AudioFormat::WebM
        } else {
            AudioFormat::Unknown
        }
    }

    /// File extension used when an upload is kept on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
            AudioFormat::WebM => "webm",
            AudioFormat::Unknown => "bin",
        }
    }

    /// ffmpeg demuxer name, for formats that go through ffmpeg.
    fn demuxer(&self) -> Option<&'static str> {
        match self {
            AudioFormat::Ogg => Some("ogg"),
            AudioFormat::WebM => Some("matroska"),
            AudioFormat::Wav | AudioFormat::Unknown => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFormat::Wav => "WAV",
            AudioFormat::Ogg => "Ogg",
            AudioFormat::WebM => "WebM",
            AudioFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Mono PCM samples in [-1.0, 1.0] plus their sample rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Length of the audio in whole milliseconds.
    pub fn duration_ms(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as f64 * 1000.0 / self.sample_rate as f64).round() as i64
    }
}

/// Decode a WAV file held in memory, downmixing to mono.
///
/// Accepts integer PCM of any bit depth hound supports and 32-bit float.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, LexiError> {
    let mut reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| LexiError::Audio(format!("Unsupported audio, expected WAV: {}", e)))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(LexiError::Audio("WAV header declares zero channels".into()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| LexiError::Audio(format!("Corrupt WAV data: {}", e)))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| LexiError::Audio(format!("Corrupt WAV data: {}", e)))?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    tracing::debug!(
        samples = samples.len(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "Decoded WAV upload"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Decodes uploads of any supported container.
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    ffmpeg_path: PathBuf,
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl AudioDecoder {
    /// Decoder that runs the ffmpeg binary at `ffmpeg_path`. A bare name
    /// is looked up on `PATH`.
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Decode an upload to mono PCM, picking the decoder from its content.
    pub async fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, LexiError> {
        let format = AudioFormat::sniff(bytes);
        match format {
            AudioFormat::Wav => decode_wav(bytes),
            AudioFormat::Ogg | AudioFormat::WebM => self.transcode(bytes, format).await,
            AudioFormat::Unknown => Err(LexiError::Audio(
                "Unsupported audio, expected WAV, Ogg or WebM".to_string(),
            )),
        }
    }

    async fn transcode(
        &self,
        bytes: &[u8],
        format: AudioFormat,
    ) -> Result<DecodedAudio, LexiError> {
        let demuxer = format
            .demuxer()
            .ok_or_else(|| LexiError::Audio(format!("{} audio cannot be transcoded", format)))?;
        let sample_rate = TRANSCODE_SAMPLE_RATE.to_string();

        let mut child = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-f", demuxer, "-i", "pipe:0"])
            .args(["-vn", "-ac", "1", "-ar", sample_rate.as_str()])
            .args(["-f", "s16le", "-acodec", "pcm_s16le", "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LexiError::Audio(format!(
                        "{} uploads need ffmpeg, not found at {}",
                        format,
                        self.ffmpeg_path.display()
                    ))
                } else {
                    LexiError::Audio(format!("Failed to start ffmpeg: {}", e))
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LexiError::Audio("ffmpeg stdin was not captured".to_string()))?;
        let input = bytes.to_vec();
        // Written from its own task so stdout drains while input is fed.
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LexiError::Audio(format!("ffmpeg did not finish: {}", e)))?;

        if let Ok(Err(e)) = writer.await {
            tracing::debug!(error = %e, "ffmpeg closed its input early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LexiError::Audio(format!(
                "ffmpeg could not decode {} upload ({}): {}",
                format,
                output.status,
                stderr.trim()
            )));
        }

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect();
        if samples.is_empty() {
            return Err(LexiError::Audio(format!("{} upload contained no audio", format)));
        }

        tracing::debug!(
            samples = samples.len(),
            container = %format,
            input_bytes = bytes.len(),
            "Transcoded upload with ffmpeg"
        );

        Ok(DecodedAudio {
            samples,
            sample_rate: TRANSCODE_SAMPLE_RATE,
        })
    }
}
