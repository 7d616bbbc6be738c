use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Errors that can occur while talking to the messaging transport
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Failed to send message to {address}: {reason}")]
    SendFailed { address: String, reason: String },

    #[error("Monitoring is already active")]
    AlreadyMonitoring,

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// A message received from the transport
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
}

impl InboundMessage {
    pub fn new(id: impl Into<String>, sender: impl Into<String>, text: impl Into<String>) -> Self {
        let sender = sender.into();
        Self {
            id: id.into(),
            text: text.into(),
            chat_id: sender.clone(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// Messaging transport the gateway sends through and listens on
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `text` to `address`
    async fn send_message(&self, address: &str, text: &str) -> Result<(), MessagingError>;

    /// Begin monitoring; inbound messages arrive on the returned receiver
    /// until [`Messenger::stop_monitoring`] is called
    async fn start_monitoring(&self) -> Result<mpsc::Receiver<InboundMessage>, MessagingError>;

    async fn stop_monitoring(&self);
}

/// Messenger with no real transport behind it
///
/// Outbound messages are written to the log and nothing is ever received.
/// Used by the binary when only the tool transport is wired.
#[derive(Debug, Default)]
pub struct LogMessenger {
    // Held so the inbound receiver stays open while monitoring
    inbound: Mutex<Option<mpsc::Sender<InboundMessage>>>,
}

impl LogMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_monitoring(&self) -> bool {
        self.inbound
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Messenger for LogMessenger {
    async fn send_message(&self, address: &str, text: &str) -> Result<(), MessagingError> {
        // Bodies can carry freshly issued tokens
        info!(address, length = text.len(), "Outbound message");
        Ok(())
    }

    async fn start_monitoring(&self) -> Result<mpsc::Receiver<InboundMessage>, MessagingError> {
        let mut inbound = self
            .inbound
            .lock()
            .map_err(|_| MessagingError::Unavailable("monitor state poisoned".to_string()))?;
        if inbound.is_some() {
            return Err(MessagingError::AlreadyMonitoring);
        }
        let (tx, rx) = mpsc::channel(1);
        *inbound = Some(tx);
        Ok(rx)
    }

    async fn stop_monitoring(&self) {
        if let Ok(mut inbound) = self.inbound.lock() {
            inbound.take();
        }
    }
}
