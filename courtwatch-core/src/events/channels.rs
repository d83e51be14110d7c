//! Event channel factories and handles.

use super::types::{BatchReady, ScrapeLogObserved};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for ScrapeLogObserved events.
pub type ScrapeLogObservedSender = mpsc::Sender<ScrapeLogObserved>;
/// Receiver handle for ScrapeLogObserved events.
pub type ScrapeLogObservedReceiver = mpsc::Receiver<ScrapeLogObserved>;

/// Sender handle for BatchReady events.
pub type BatchReadySender = mpsc::Sender<BatchReady>;
/// Receiver handle for BatchReady events.
pub type BatchReadyReceiver = mpsc::Receiver<BatchReady>;

/// Create a new ScrapeLogObserved channel.
///
/// The live listener and the fallback poller each hold a clone of the sender.
pub fn scrape_log_observed_channel() -> (ScrapeLogObservedSender, ScrapeLogObservedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new BatchReady channel.
///
/// Flush timers send on it; the dispatcher receives.
pub fn batch_ready_channel() -> (BatchReadySender, BatchReadyReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
