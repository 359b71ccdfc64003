use super::stats::StatsCounters;
use super::types::Generation;
use crate::frame::{FrameEncoding, OutboundFrame};
use crate::source::FrameSource;
use crate::transport::TransportHandle;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn, Instrument};

/// Periodic capture and send loop bound to one session generation
pub(crate) struct FramePump {
    pub generation: Generation,
    pub current_generation: Arc<AtomicU64>,
    pub handle: TransportHandle,
    pub source: Arc<dyn FrameSource>,
    pub processing: Arc<AtomicBool>,
    pub stats: Arc<StatsCounters>,
    pub interval: Duration,
    pub quality: f32,
    pub encoding: FrameEncoding,
    pub cancel: CancellationToken,
}

impl FramePump {
    pub fn spawn(self) -> JoinHandle<()> {
        let span = tracing::debug_span!("frame_pump", generation = self.generation);
        tokio::spawn(self.run().instrument(span))
    }

    fn is_current(&self) -> bool {
        self.current_generation.load(Ordering::Acquire) == self.generation
    }

    fn may_send(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.is_current()
            && self.handle.is_open()
            && self.processing.load(Ordering::Acquire)
    }

    async fn run(self) {
        debug!("Frame pump started ({}ms interval)", self.interval.as_millis());

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.is_current() {
                break;
            }
            if !self.processing.load(Ordering::Acquire) {
                trace!("Processing disabled, skipping tick");
                continue;
            }

            // A capture in flight when the session ends still completes; its frame is discarded below
            let frame = match self.source.capture(self.quality).await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Frame capture failed: {}", e);
                    self.stats.record_capture_error();
                    continue;
                }
            };

            if !self.may_send() {
                trace!("Discarding frame {} captured for an inactive session", frame.id);
                self.stats.record_dropped();
                continue;
            }

            let outbound = OutboundFrame::encode(&frame, self.encoding);
            let size = outbound.len();
            match self.handle.send(outbound) {
                Ok(()) => {
                    trace!("Sent frame {} ({} bytes)", frame.id, size);
                    self.stats.record_sent(size);
                }
                Err(e) if e.is_frame_drop() => {
                    debug!("Frame {} dropped: {}", frame.id, e);
                    self.stats.record_dropped();
                }
                Err(e) => {
                    warn!("Frame {} send failed: {}", frame.id, e);
                    self.stats.record_dropped();
                }
            }
        }

        debug!("Frame pump stopped");
    }
}
