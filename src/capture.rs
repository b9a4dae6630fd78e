//! Audio capture sessions
//!
//! A `CaptureSession` owns the input device from "start listening" until the
//! capture is finished or dropped. The device is released exactly once on
//! every exit path; a failed release is logged and otherwise ignored.

use crate::runtime::AudioInput;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const SYNTHETIC_TIMESLICE: Duration = Duration::from_millis(100);
/// One timeslice of 16 kHz mono PCM16
const SYNTHETIC_CHUNK_BYTES: usize = 3200;
const CHUNK_CHANNEL_CAPACITY: usize = 64;
/// One minute of 16 kHz mono PCM16. Audio past this point is dropped.
const MAX_CAPTURE_BYTES: usize = 1_920_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("Failed to release audio input: {0}")]
    Release(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Everything recorded during one capture, ready for the voice responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    pub capture_id: String,
    pub chunks: Vec<AudioChunk>,
}

impl CapturedAudio {
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(|c| c.data.len()).sum()
    }
}

/// Stops the input and frees the device
pub trait DeviceRelease: Send {
    fn release(self: Box<Self>) -> Result<(), CaptureError>;
}

/// A granted input device: a stream of chunks plus the means to let go of it
pub struct CaptureDevice {
    chunks: mpsc::Receiver<AudioChunk>,
    release: Box<dyn DeviceRelease>,
}

impl CaptureDevice {
    pub fn new(chunks: mpsc::Receiver<AudioChunk>, release: impl DeviceRelease + 'static) -> Self {
        Self {
            chunks,
            release: Box::new(release),
        }
    }
}

pub struct CaptureSession {
    id: String,
    chunks: Option<mpsc::Receiver<AudioChunk>>,
    buffer: Vec<AudioChunk>,
    buffered_bytes: usize,
    truncated: bool,
    release: Option<Box<dyn DeviceRelease>>,
    started_at: Instant,
}

impl CaptureSession {
    pub fn open(device: CaptureDevice) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(capture_id = %id, "Capture session opened");
        Self {
            id,
            chunks: Some(device.chunks),
            buffer: Vec::new(),
            buffered_bytes: 0,
            truncated: false,
            release: Some(device.release),
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next chunk from the device. Pends forever once the stream has ended,
    /// so it can sit in a `select!` without spinning.
    pub async fn recv(&mut self) -> Option<AudioChunk> {
        match self.chunks.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Buffer a chunk unless that would exceed the capture limit
    pub fn push(&mut self, chunk: AudioChunk) {
        if self.buffered_bytes + chunk.data.len() > MAX_CAPTURE_BYTES {
            if !self.truncated {
                self.truncated = true;
                tracing::warn!(
                    capture_id = %self.id,
                    limit_bytes = MAX_CAPTURE_BYTES,
                    "Capture limit reached, dropping further audio"
                );
            }
            return;
        }
        self.buffered_bytes += chunk.data.len();
        self.buffer.push(chunk);
    }

    pub fn close_stream(&mut self) {
        tracing::debug!(capture_id = %self.id, "Audio stream ended");
        self.chunks = None;
    }

    /// Stop input, release the device and hand over everything captured
    pub fn finish(mut self) -> CapturedAudio {
        if let Some(mut rx) = self.chunks.take() {
            rx.close();
            while let Ok(chunk) = rx.try_recv() {
                self.push(chunk);
            }
        }
        self.release_device();

        let audio = CapturedAudio {
            capture_id: self.id.clone(),
            chunks: std::mem::take(&mut self.buffer),
        };
        tracing::info!(
            capture_id = %self.id,
            chunks = audio.chunks.len(),
            bytes = audio.byte_len(),
            truncated = self.truncated,
            duration_ms = %self.started_at.elapsed().as_millis(),
            "Capture session finished"
        );
        audio
    }

    fn release_device(&mut self) {
        if let Some(release) = self.release.take() {
            if let Err(e) = release.release() {
                tracing::warn!(capture_id = %self.id, error = %e, "Device release failed");
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.release.is_some() {
            tracing::info!(capture_id = %self.id, "Capture session dropped mid-capture");
            self.release_device();
        }
    }
}

// ============================================================================
// Simulated inputs
// ============================================================================

/// Stops the chunk pump task
struct PumpRelease(JoinHandle<()>);

impl DeviceRelease for PumpRelease {
    fn release(self: Box<Self>) -> Result<(), CaptureError> {
        self.0.abort();
        Ok(())
    }
}

/// Emits a chunk of silence every timeslice, like a recorder with nobody talking
#[derive(Debug, Clone, Default)]
pub struct SyntheticMicrophone;

#[async_trait]
impl AudioInput for SyntheticMicrophone {
    async fn acquire(&self) -> Result<CaptureDevice, CaptureError> {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let pump = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SYNTHETIC_TIMESLICE);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(AudioChunk::new(vec![0; SYNTHETIC_CHUNK_BYTES])).await.is_err() {
                    break;
                }
            }
        });
        Ok(CaptureDevice::new(rx, PumpRelease(pump)))
    }
}

/// Refuses access, as when the user blocks the permission prompt
#[derive(Debug, Clone, Default)]
pub struct DeniedMicrophone;

#[async_trait]
impl AudioInput for DeniedMicrophone {
    async fn acquire(&self) -> Result<CaptureDevice, CaptureError> {
        Err(CaptureError::PermissionDenied(
            "microphone disabled by configuration".to_string(),
        ))
    }
}
