use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::time::Instant;

use crate::error::{FlowError, Result};

/// Default container/codec probe order; sessions may override it through
/// their config.
pub const PREFERRED_MIME_TYPES: [&str; 4] = [
    "video/mp4",
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

const FALLBACK_MIME_TYPE: &str = "video/webm";

/// Recording capability of the hosting platform.
pub trait RecordingSupport: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;
    /// Whether an incremental recorder exists at all.
    fn has_recorder(&self) -> bool;
}

/// The live camera+microphone stream. Exclusively owned by one session;
/// `stop_tracks` must be safe to call more than once.
pub trait CameraStream: Send {
    fn stop_tracks(&mut self);
}

/// Camera/microphone acquisition. Denied permission surfaces as
/// `FlowError::PermissionDenied`.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_camera_stream(&self) -> Result<Box<dyn CameraStream>>;
}

/// Probe the candidates in order; the first supported entry wins. An empty
/// result means "let the platform pick".
pub fn pick_mime_type(support: &dyn RecordingSupport, candidates: &[String]) -> String {
    for candidate in candidates {
        if support.is_type_supported(candidate) {
            return candidate.clone();
        }
    }
    String::new()
}

/// One finished recording.
#[derive(Debug, Clone)]
pub struct Clip {
    pub blob: Bytes,
    pub duration_seconds: u32,
    pub mime_type: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl Clip {
    pub fn size_bytes(&self) -> usize {
        self.blob.len()
    }
}

/// Buffers incremental chunks from a live stream and finalizes them into a
/// single clip on stop.
pub struct ClipRecorder {
    mime_type: String,
    chunks: Vec<Bytes>,
    started_mono: Option<Instant>,
    started_wall: Option<DateTime<Utc>>,
}

impl ClipRecorder {
    pub fn new(mime_type: &str) -> Self {
        ClipRecorder {
            mime_type: mime_type.to_string(),
            chunks: Vec::new(),
            started_mono: None,
            started_wall: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_mono.is_some()
    }

    pub fn start(&mut self) {
        self.chunks.clear();
        self.started_mono = Some(Instant::now());
        self.started_wall = Some(Utc::now());
    }

    /// Hand a captured chunk into the buffer. Empty chunks and chunks
    /// arriving before `start` are dropped; capture-side errors are logged
    /// rather than thrown so an in-progress recording never crashes.
    pub fn push_chunk(&mut self, data: Bytes) {
        if self.started_mono.is_none() {
            error!("Chunk received before recorder start ({} bytes), dropping", data.len());
            return;
        }
        if data.is_empty() {
            debug!("Ignoring empty capture chunk");
            return;
        }
        self.chunks.push(data);
    }

    /// Finalize the buffered chunks into one clip. Fails if the recorder was
    /// never started. Duration is rounded to whole seconds with a floor of 1.
    pub async fn stop(&mut self) -> Result<Clip> {
        let started_mono = self.started_mono.take().ok_or(FlowError::RecorderNotStarted)?;
        let started_wall = self.started_wall.take().unwrap_or_else(Utc::now);
        let stopped_at = Utc::now();

        let elapsed_ms = started_mono.elapsed().as_millis() as f64;
        let duration_seconds = ((elapsed_ms / 1000.0).round() as u32).max(1);

        let mut blob = BytesMut::new();
        for chunk in self.chunks.drain(..) {
            blob.extend_from_slice(&chunk);
        }

        let mime_type = if self.mime_type.is_empty() {
            FALLBACK_MIME_TYPE.to_string()
        } else {
            self.mime_type.clone()
        };

        Ok(Clip {
            blob: blob.freeze(),
            duration_seconds,
            mime_type,
            started_at: started_wall,
            stopped_at,
        })
    }
}

/// Human-readable size, used in playback metadata and logs.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut num = bytes as f64;
    let mut i = 0;
    while num >= 1024.0 && i < UNITS.len() - 1 {
        num /= 1024.0;
        i += 1;
    }
    if i == 0 {
        format!("{} {}", bytes, UNITS[i])
    } else {
        format!("{:.1} {}", num, UNITS[i])
    }
}
