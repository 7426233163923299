//! Outbound message transport.
//!
//! The controller and scheduler are platform-agnostic; a [`Transport`] is the
//! seam where a concrete chat platform (or a console adapter) plugs in.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use bosswatch_scheduler::ReminderSink;

use crate::TimerController;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The destination string is not one this transport can deliver to.
    #[error("undeliverable destination: {0}")]
    BadDestination(String),

    /// The platform rejected or dropped the send.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Delivers rendered messages to an opaque destination
/// (`group:{id}` or `private:{id}`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError>;
}

/// Adapt a controller and transport into the scheduler's delivery sink.
///
/// The controller renders the reminder text; the transport carries it. Errors
/// flow back as strings because the scheduler only logs them.
pub fn reminder_sink(
    controller: Arc<TimerController>,
    transport: Arc<dyn Transport>,
) -> ReminderSink {
    Box::new(move |reminder| {
        let controller = Arc::clone(&controller);
        let transport = Arc::clone(&transport);
        Box::pin(async move {
            let text = controller.reminder_text(&reminder);
            transport
                .send(&reminder.destination, &text)
                .await
                .map_err(|e| e.to_string())
        })
    })
}
