//! Fire-and-forget change notification sinks.
//!
//! The coordinator hands every committed [`ChangeEvent`] to a
//! [`ChangeNotifier`] after the commit. Delivery failures are logged and
//! never undo or fail the transition.

use async_trait::async_trait;
use patrol_dispatch_models::ChangeEvent;
use tokio::sync::mpsc;

use crate::NotifyError;

/// Receives committed dispatch changes.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Delivers one event.
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError>;
}

/// Forwards events to an in-process channel, e.g. a push or stream
/// transport running on its own task.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ChangeNotifier for ChannelNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        self.sender
            .send(event.clone())
            .map_err(|_| NotifyError::Closed)
    }
}

/// Writes events to the log.
pub struct LogNotifier;

#[async_trait]
impl ChangeNotifier for LogNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        log::info!(
            "Dispatch {} {}: {:?} -> {} (officer={:?}, recipients={:?})",
            event.dispatch_id,
            event.kind,
            event.from,
            event.to,
            event.officer_id,
            event.recipients
        );
        Ok(())
    }
}

/// Drops every event.
pub struct NullNotifier;

#[async_trait]
impl ChangeNotifier for NullNotifier {
    async fn notify(&self, _event: &ChangeEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
