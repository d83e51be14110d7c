//! Recording notifier used by processor tests.

use super::{Notifier, NotifierError, OutgoingMessage};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutgoingMessage>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifierError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifierError::Rejected(message.recipient.clone()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
