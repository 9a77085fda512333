//! Best-effort outbound signaling toward the host page.

use tokio::sync::mpsc;
use tracing::warn;

use crate::signal::HostSignal;

/// One-way channel from the widget to its host.
///
/// Delivery is best-effort by contract: the host frame may be gone, busy or
/// simply not listening, and the session must not care. Implementations log
/// drops and never surface them.
pub trait HostBridge: Send + Sync {
    fn notify(&self, signal: HostSignal);
}

/// [`HostBridge`] backed by an in-process channel, for embedding the widget
/// runtime and its host surface in the same process.
#[derive(Debug, Clone)]
pub struct ChannelHostBridge {
    outbound: mpsc::Sender<HostSignal>,
}

impl ChannelHostBridge {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<HostSignal>) {
        let (outbound, inbound) = mpsc::channel(buffer);
        (Self { outbound }, inbound)
    }
}

impl HostBridge for ChannelHostBridge {
    fn notify(&self, signal: HostSignal) {
        if let Err(err) = self.outbound.try_send(signal) {
            warn!(%err, "host signal dropped");
        }
    }
}

/// [`HostBridge`] that discards every signal, for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHostBridge;

impl HostBridge for NullHostBridge {
    fn notify(&self, _signal: HostSignal) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_signals_in_order() {
        let (bridge, mut inbound) = ChannelHostBridge::new(4);

        bridge.notify(HostSignal::MinimizeChat);
        bridge.notify(HostSignal::EndChat);

        assert_eq!(inbound.recv().await, Some(HostSignal::MinimizeChat));
        assert_eq!(inbound.recv().await, Some(HostSignal::EndChat));
    }

    #[tokio::test]
    async fn drops_silently_when_buffer_is_full() {
        let (bridge, mut inbound) = ChannelHostBridge::new(1);

        bridge.notify(HostSignal::MinimizeChat);
        bridge.notify(HostSignal::EndChat);

        assert_eq!(inbound.recv().await, Some(HostSignal::MinimizeChat));
        assert!(inbound.try_recv().is_err(), "second signal was dropped");
    }

    #[test]
    fn drops_silently_when_receiver_is_gone() {
        let (bridge, inbound) = ChannelHostBridge::new(1);
        drop(inbound);
        bridge.notify(HostSignal::EndChat);
    }
}
