//! Audio answer capture.
//!
//! The capture device is held exclusively by one recording at a time. A recording
//! buffers its bytes locally; they only leave the process as part of a full exam
//! submission.

use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Largest clip accepted for one answer.
pub const MAX_CLIP_BYTES: usize = 25 * 1024 * 1024;

/// AudioClip
///
/// A finished recording for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub pregunta_id: Uuid,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecorderError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("no recording in progress")]
    NotRecording,
    #[error("the active recording belongs to question {0}")]
    OtherQuestion(Uuid),
    #[error("recording exceeds the 25 MiB limit")]
    TooLarge,
}

/// CaptureStream
///
/// An open handle on the capture device. `release` takes the handle by value, so a
/// stream can only ever be released once.
pub trait CaptureStream: Send {
    fn mime_type(&self) -> &str;
    fn release(self);
}

/// CaptureDevice
///
/// Something that can hand out capture streams.
pub trait CaptureDevice: Send {
    type Stream: CaptureStream;

    fn open(&mut self) -> Result<Self::Stream, RecorderError>;
}

struct ActiveRecording<S> {
    pregunta_id: Uuid,
    stream: S,
    buffer: Vec<u8>,
}

/// RecorderStatus
///
/// View state of the record controls. While `grabando` is true every other record
/// button is disabled.
#[derive(Debug, Clone, Serialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct RecorderStatus {
    pub grabando: bool,
    pub pregunta_id: Option<Uuid>,
    pub bytes: usize,
}

/// Recorder
///
/// At most one recording at a time over a single device.
pub struct Recorder<D: CaptureDevice> {
    device: D,
    active: Option<ActiveRecording<D::Stream>>,
}

impl<D: CaptureDevice> Recorder<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn status(&self) -> RecorderStatus {
        match &self.active {
            Some(active) => RecorderStatus {
                grabando: true,
                pregunta_id: Some(active.pregunta_id),
                bytes: active.buffer.len(),
            },
            None => RecorderStatus {
                grabando: false,
                pregunta_id: None,
                bytes: 0,
            },
        }
    }

    /// start
    ///
    /// Opens the device for `pregunta_id`. Returns `Ok(false)` without touching anything
    /// when a recording is already running.
    pub fn start(&mut self, pregunta_id: Uuid) -> Result<bool, RecorderError> {
        if self.active.is_some() {
            return Ok(false);
        }

        let stream = self.device.open()?;
        tracing::debug!(%pregunta_id, "recording started");
        self.active = Some(ActiveRecording {
            pregunta_id,
            stream,
            buffer: Vec::new(),
        });
        Ok(true)
    }

    pub fn push(&mut self, pregunta_id: Uuid, chunk: &[u8]) -> Result<(), RecorderError> {
        let active = self.active.as_mut().ok_or(RecorderError::NotRecording)?;
        if active.pregunta_id != pregunta_id {
            return Err(RecorderError::OtherQuestion(active.pregunta_id));
        }
        if active.buffer.len() + chunk.len() > MAX_CLIP_BYTES {
            return Err(RecorderError::TooLarge);
        }
        active.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// stop
    ///
    /// Ends the running recording, releases the device stream and returns the clip.
    /// Returns `None` when nothing was recording.
    pub fn stop(&mut self) -> Option<AudioClip> {
        let active = self.active.take()?;
        let mime_type = active.stream.mime_type().to_string();
        active.stream.release();
        tracing::debug!(pregunta_id = %active.pregunta_id, bytes = active.buffer.len(), "recording stopped");

        Some(AudioClip {
            pregunta_id: active.pregunta_id,
            mime_type,
            bytes: active.buffer,
        })
    }

    /// Drops the running recording without producing a clip.
    pub fn discard(&mut self) {
        if let Some(active) = self.active.take() {
            active.stream.release();
        }
    }
}

impl<D: CaptureDevice> Drop for Recorder<D> {
    fn drop(&mut self) {
        self.discard();
    }
}

/// RelayedCapture
///
/// The device used by the server: the renderer's microphone stream is relayed to us
/// chunk by chunk, so opening it only announces the format we expect.
pub struct RelayedCapture {
    mime_type: String,
}

impl RelayedCapture {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }
}

pub struct RelayedStream {
    mime_type: String,
}

impl CaptureStream for RelayedStream {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn release(self) {
        tracing::debug!("relayed capture stream released");
    }
}

impl CaptureDevice for RelayedCapture {
    type Stream = RelayedStream;

    fn open(&mut self) -> Result<Self::Stream, RecorderError> {
        if self.mime_type.trim().is_empty() {
            return Err(RecorderError::DeviceUnavailable(
                "no audio format configured".to_string(),
            ));
        }
        Ok(RelayedStream {
            mime_type: self.mime_type.clone(),
        })
    }
}
