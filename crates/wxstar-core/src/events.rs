//! Structured events for the logging collaborator.
//!
//! Emission is fire-and-forget: sinks must never block the caller.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    RefreshSucceeded {
        location: String,
        provider: String,
        changed: bool,
    },
    RefreshFailed {
        location: String,
        reason: String,
    },
    PageSkipped {
        page: String,
        reason: String,
    },
    SettingsChanged {
        version: u64,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: CoreEvent);
}

/// Writes every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CoreEvent) {
        match event {
            CoreEvent::RefreshSucceeded {
                location,
                provider,
                changed,
            } => {
                tracing::info!(%location, %provider, changed, "refresh succeeded");
            }
            CoreEvent::RefreshFailed { location, reason } => {
                tracing::warn!(%location, %reason, "refresh failed, serving stale data");
            }
            CoreEvent::PageSkipped { page, reason } => {
                tracing::debug!(%page, %reason, "page skipped");
            }
            CoreEvent::SettingsChanged { version } => {
                tracing::info!(version, "settings changed");
            }
        }
    }
}

/// Forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CoreEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CoreEvent) {
        // A dropped receiver just means nobody is listening
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(CoreEvent::SettingsChanged { version: 1 });
        sink.emit(CoreEvent::PageSkipped {
            page: "hazards".into(),
            reason: "no active alerts".into(),
        });

        assert_eq!(rx.recv().await, Some(CoreEvent::SettingsChanged { version: 1 }));
        assert!(matches!(rx.recv().await, Some(CoreEvent::PageSkipped { .. })));
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(CoreEvent::SettingsChanged { version: 2 });
    }
}
