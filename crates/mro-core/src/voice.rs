//! Voice capture: raw PCM in, transcripts out.
//!
//! Audio arrives as 16 kHz mono signed 16-bit little-endian PCM on any async
//! reader (stdin from `arecord -f S16_LE -r 16000 -c 1 -t raw`, or a raw file).
//! Every five seconds of frames is wrapped in a WAV container, sent to the
//! transcription service and the text pushed onto an unbounded channel.

use std::future::Future;
use std::io::Cursor;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::chat::GROQ_BASE_URL;
use crate::config::ConfigError;
use crate::error::{ErrorClass, ServiceError};
use crate::http;

pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const FRAME_SAMPLES: usize = 1024;
pub const BATCH_SECONDS: usize = 5;
/// Five seconds of samples in whole frames: 80000 / 1024 rounds down to 78
/// (just under five seconds).
pub const FRAMES_PER_BATCH: usize = SAMPLE_RATE as usize * BATCH_SECONDS / FRAME_SAMPLES;
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3-turbo";

const SERVICE: &str = "groq-transcription";

/// Reads fixed-size i16 frames from a byte stream.
pub struct PcmSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> PcmSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0; FRAME_SAMPLES * 2],
        }
    }

    /// Next full frame, or `None` at end of input. A trailing partial frame is
    /// dropped.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<i16>>, VoiceError> {
        match self.reader.read_exact(&mut self.buf).await {
            Ok(_) => Ok(Some(
                self.buf
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect(),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(VoiceError::Io(e)),
        }
    }
}

/// 16-bit PCM, mono, 16 kHz WAV bytes.
pub fn encode_wav(samples: &[i16]) -> Result<Vec<u8>, VoiceError> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, ServiceError>;
}

/// Groq's Whisper endpoint (`/audio/transcriptions`, multipart upload).
#[derive(Debug, Clone)]
pub struct GroqTranscriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl GroqTranscriber {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http::client(http::DEFAULT_TIMEOUT)?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: GROQ_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl Transcriber for GroqTranscriber {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, ServiceError> {
        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|source| ServiceError::Http {
                service: SERVICE,
                source,
            })?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone());
        let request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .multipart(form);
        let res: TranscriptionResponse = http::send_json(SERVICE, request).await?;
        Ok(res.text)
    }
}

/// Reads `source` until end of input or until `shutdown` resolves, sending one
/// transcript per full batch to `tx`. A failed transcription loses that batch
/// and capture goes on. Frames of an unfinished batch are discarded.
///
/// Returns the number of transcripts sent.
pub async fn capture<R, F>(
    source: &mut PcmSource<R>,
    transcriber: &dyn Transcriber,
    tx: &UnboundedSender<String>,
    shutdown: F,
) -> Result<usize, VoiceError>
where
    R: AsyncRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut batch: Vec<i16> = Vec::with_capacity(FRAMES_PER_BATCH * FRAME_SAMPLES);
    let mut frames = 0;
    let mut sent = 0;
    info!(sample_rate = SAMPLE_RATE, frames_per_batch = FRAMES_PER_BATCH, "listening");
    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("stopping capture");
                break;
            }
            frame = source.read_frame() => frame?,
        };
        let Some(frame) = frame else {
            debug!("end of audio input");
            break;
        };
        batch.extend_from_slice(&frame);
        frames += 1;
        if frames < FRAMES_PER_BATCH {
            continue;
        }

        let wav = encode_wav(&batch)?;
        batch.clear();
        frames = 0;
        match transcriber.transcribe(wav).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("empty transcript");
                    continue;
                }
                if tx.send(text.to_string()).is_err() {
                    debug!("transcript receiver dropped");
                    break;
                }
                sent += 1;
            }
            Err(e) => warn!(error = %e, "transcription failed, batch dropped"),
        }
    }
    if frames > 0 {
        debug!(frames, "discarding partial batch");
    }
    Ok(sent)
}

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("failed to read audio: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode WAV: {0}")]
    Wav(#[from] hound::Error),
}

impl VoiceError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Data
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::mpsc;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn pcm(frames: usize, extra_bytes: usize) -> Vec<u8> {
        let samples = frames * FRAME_SAMPLES;
        let mut bytes: Vec<u8> = (0..samples)
            .flat_map(|i| ((i % 2000) as i16 - 1000).to_le_bytes())
            .collect();
        bytes.extend(std::iter::repeat(0u8).take(extra_bytes));
        bytes
    }

    /// Counts uploads; fails the calls listed in `fail_on` (1-based).
    #[derive(Default)]
    struct CountingTranscriber {
        sizes: Mutex<Vec<usize>>,
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl Transcriber for CountingTranscriber {
        async fn transcribe(&self, wav: Vec<u8>) -> Result<String, ServiceError> {
            let mut sizes = self.sizes.lock().unwrap();
            sizes.push(wav.len());
            let n = sizes.len();
            if self.fail_on.contains(&n) {
                return Err(ServiceError::Status {
                    service: SERVICE,
                    status: 429,
                    body: "rate limited".to_string(),
                });
            }
            Ok(format!(" batch {n} "))
        }
    }

    #[test]
    fn batch_is_78_frames() {
        assert_eq!(FRAMES_PER_BATCH, 78);
        let samples = FRAMES_PER_BATCH * FRAME_SAMPLES;
        let five_seconds = SAMPLE_RATE as usize * BATCH_SECONDS;
        assert!(samples <= five_seconds && five_seconds - samples < FRAME_SAMPLES);
    }

    #[tokio::test]
    async fn frames_are_little_endian_and_partial_tail_is_dropped() {
        let mut bytes = Vec::new();
        for i in 0..FRAME_SAMPLES as i16 {
            bytes.extend_from_slice(&(i - 512).to_le_bytes());
        }
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut source = PcmSource::new(&bytes[..]);

        let frame = source.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.len(), FRAME_SAMPLES);
        assert_eq!(frame[0], -512);
        assert_eq!(frame[FRAME_SAMPLES - 1], 511);
        assert!(source.read_frame().await.unwrap().is_none());
    }

    #[test]
    fn wav_is_16bit_mono_16khz() {
        let samples = [0i16, 1000, -1000, i16::MAX, i16::MIN];
        let bytes = encode_wav(&samples).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[tokio::test]
    async fn each_full_batch_is_transcribed_once() {
        let bytes = pcm(FRAMES_PER_BATCH * 2 + 10, 100);
        let mut source = PcmSource::new(&bytes[..]);
        let transcriber = CountingTranscriber::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sent = capture(&mut source, &transcriber, &tx, std::future::pending())
            .await
            .unwrap();
        assert_eq!(sent, 2);
        assert_eq!(rx.recv().await.as_deref(), Some("batch 1"));
        assert_eq!(rx.recv().await.as_deref(), Some("batch 2"));

        // Buffer is cleared between batches: both uploads are one batch long.
        let sizes = transcriber.sizes.lock().unwrap();
        assert_eq!(sizes.len(), 2);
        let pcm_bytes = FRAMES_PER_BATCH * FRAME_SAMPLES * 2;
        assert!(sizes[0] > pcm_bytes && sizes[0] < pcm_bytes + 100);
        assert_eq!(sizes[0], sizes[1]);
    }

    #[tokio::test]
    async fn failed_batch_is_skipped() {
        let bytes = pcm(FRAMES_PER_BATCH * 3, 0);
        let mut source = PcmSource::new(&bytes[..]);
        let transcriber = CountingTranscriber {
            fail_on: vec![2],
            ..CountingTranscriber::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sent = capture(&mut source, &transcriber, &tx, std::future::pending())
            .await
            .unwrap();
        assert_eq!(sent, 2);
        assert_eq!(rx.recv().await.as_deref(), Some("batch 1"));
        assert_eq!(rx.recv().await.as_deref(), Some("batch 3"));
    }

    #[tokio::test]
    async fn shutdown_stops_before_reading() {
        let bytes = pcm(FRAMES_PER_BATCH, 0);
        let mut source = PcmSource::new(&bytes[..]);
        let transcriber = CountingTranscriber::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sent = capture(&mut source, &transcriber, &tx, async {}).await.unwrap();
        assert_eq!(sent, 0);
        assert!(transcriber.sizes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn groq_transcriber_uploads_multipart_wav() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer gsk-test"))
            .and(body_string_contains("whisper-large-v3-turbo"))
            .and(body_string_contains("filename=\"audio.wav\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "Check the hydraulic pressure."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transcriber = GroqTranscriber::new("gsk-test", DEFAULT_TRANSCRIPTION_MODEL)
            .unwrap()
            .with_base_url(format!("{}/openai/v1", server.uri()));
        let text = transcriber.transcribe(b"RIFF....WAVE".to_vec()).await.unwrap();
        assert_eq!(text, "Check the hydraulic pressure.");
    }

    #[tokio::test]
    async fn groq_transcriber_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;
        let transcriber = GroqTranscriber::new("bad", DEFAULT_TRANSCRIPTION_MODEL)
            .unwrap()
            .with_base_url(server.uri());
        let err = transcriber.transcribe(vec![]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 401, .. }));
    }
}
