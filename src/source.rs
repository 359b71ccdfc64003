use crate::error::CaptureError;
use crate::frame::CapturedFrame;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace};

/// Producer of encoded frames, polled by the frame pump on every tick
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Produce the next encoded frame. `quality` is a 0.0..=1.0 hint.
    async fn capture(&self, quality: f32) -> Result<CapturedFrame, CaptureError>;
}

/// Replays the JPEG files of a directory in name order, looping forever
pub struct DirectoryFrameSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: Mutex<usize>,
    frame_counter: AtomicU64,
}

impl DirectoryFrameSource {
    /// Scan `dir` for `*.jpg` / `*.jpeg` files
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CaptureError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir).map_err(|e| CaptureError::Unavailable {
            details: format!("cannot read {}: {}", dir.display(), e),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::Unavailable {
                details: format!("no JPEG files in {}", dir.display()),
            });
        }

        info!(
            "Frame source replaying {} files from {}",
            files.len(),
            dir.display()
        );

        Ok(Self {
            dir,
            files,
            cursor: Mutex::new(0),
            frame_counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    fn next_path(&self) -> PathBuf {
        let mut cursor = self.cursor.lock();
        let path = self.files[*cursor % self.files.len()].clone();
        *cursor = (*cursor + 1) % self.files.len();
        path
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn capture(&self, quality: f32) -> Result<CapturedFrame, CaptureError> {
        let path = self.next_path();
        trace!("Capturing {} (quality hint {:.2})", path.display(), quality);

        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| CaptureError::Read {
                path: path.display().to_string(),
                details: e.to_string(),
            })?;

        if data.is_empty() {
            return Err(CaptureError::Empty);
        }

        let id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        debug!("Captured frame {} ({} bytes)", id, data.len());
        Ok(CapturedFrame::new(id, data))
    }
}

/// Returns the same payload on every capture
pub struct StaticFrameSource {
    payload: Vec<u8>,
    frame_counter: AtomicU64,
}

impl StaticFrameSource {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            frame_counter: AtomicU64::new(0),
        }
    }

    /// A minimal JPEG marker pair, enough for servers that only check SOI/EOI
    pub fn placeholder_jpeg() -> Self {
        Self::new(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    pub fn captures(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn capture(&self, _quality: f32) -> Result<CapturedFrame, CaptureError> {
        if self.payload.is_empty() {
            return Err(CaptureError::Empty);
        }
        let id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        Ok(CapturedFrame::new(id, self.payload.clone()))
    }
}
