//! Outbound message delivery

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::MessageHandle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("message could not be sent: {0}")]
    SendFailed(String),
    #[error("message {0:?} could not be deleted")]
    DeleteFailed(MessageHandle),
}

/// Posts and retracts chat messages
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn send(
        &self,
        chat_id: i64,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError>;

    async fn delete(&self, handle: MessageHandle) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub handle: MessageHandle,
    pub reply_to: Option<i64>,
    pub text: String,
}

#[derive(Default)]
struct DeliveryLog {
    sent: Vec<SentMessage>,
    deleted: Vec<MessageHandle>,
    next_message_id: i64,
}

/// Delivery that keeps every message in memory
///
/// Used by the console front end (with echo on) and by tests.
#[derive(Default)]
pub struct RecordingDelivery {
    log: Mutex<DeliveryLog>,
    echo: bool,
    failing: AtomicBool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print each sent and deleted message to stdout
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Make every subsequent send and delete fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.log().sent.clone()
    }

    pub fn deleted(&self) -> Vec<MessageHandle> {
        self.log().deleted.clone()
    }

    /// Sent messages that were not deleted afterwards
    pub fn visible(&self) -> Vec<SentMessage> {
        let log = self.log();
        log.sent
            .iter()
            .filter(|message| !log.deleted.contains(&message.handle))
            .cloned()
            .collect()
    }

    fn log(&self) -> MutexGuard<'_, DeliveryLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessageDelivery for RecordingDelivery {
    async fn send(
        &self,
        chat_id: i64,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::SendFailed("delivery disabled".into()));
        }

        let mut log = self.log();
        log.next_message_id += 1;
        let handle = MessageHandle {
            chat_id,
            message_id: log.next_message_id,
        };
        log.sent.push(SentMessage {
            handle,
            reply_to,
            text: text.to_string(),
        });

        if self.echo {
            println!("[bot #{}] {}", handle.message_id, text);
        }
        Ok(handle)
    }

    async fn delete(&self, handle: MessageHandle) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::DeleteFailed(handle));
        }

        self.log().deleted.push(handle);
        if self.echo {
            println!("[bot #{} deleted]", handle.message_id);
        }
        Ok(())
    }
}
