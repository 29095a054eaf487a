//! Relay task answering engine signals through a config bridge

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::{BridgeSignal, ConfigBridge, EngineSignal};
use crate::constants;

/// Serve engine signals until either side of the conversation goes away
pub async fn run_relay<B: ConfigBridge>(
    mut bridge: B,
    key: String,
    mut signals: UnboundedReceiver<EngineSignal>,
    replies: UnboundedSender<BridgeSignal>,
) {
    info!(key = %key, "Bridge relay started");

    while let Some(signal) = signals.recv().await {
        match signal {
            EngineSignal::RequestOrder => {
                debug!(key = %key, "Engine requested initial order");
                match bridge.get_setting(&key) {
                    Ok(settings) => {
                        if replies.send(BridgeSignal::InitialOrder(settings)).is_err() {
                            warn!("Engine dropped its reply channel (shutting down?)");
                            break;
                        }
                    }
                    // No reply; the engine re-requests on its next trigger
                    Err(e) => error!(error = ?e, key = %key, "Failed to read setting"),
                }
            }

            EngineSignal::OrderChanged(settings) => {
                info!(key = %key, tokens = settings.tokens().len(), "Persisting new token order");
                if let Err(e) = bridge.set_setting(constants::bridge::PERSIST, &key, &settings) {
                    error!(error = ?e, key = %key, "Failed to store setting");
                }
            }

            EngineSignal::ResetComplete => {
                debug!("Engine reset cooldown elapsed");
            }
        }
    }

    info!("Bridge relay stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;
    use crate::token::{ColorToken, TokenId, TokenSettings};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_relay_answers_requests_and_persists_changes() {
        let stored: TokenSettings = [(TokenId::from("a"), ColorToken::new(0, "rgba(1,1,1,1)"))]
            .into_iter()
            .collect();
        let bridge = MemoryBridge::with_setting("k", stored.clone());
        let observer = bridge.clone();

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

        signal_tx.send(EngineSignal::RequestOrder).unwrap();
        signal_tx.send(EngineSignal::OrderChanged(TokenSettings::default())).unwrap();
        signal_tx.send(EngineSignal::ResetComplete).unwrap();
        drop(signal_tx);

        run_relay(bridge, "k".to_string(), signal_rx, reply_tx).await;

        assert_eq!(reply_rx.recv().await, Some(BridgeSignal::InitialOrder(stored)));
        assert_eq!(reply_rx.recv().await, None);
        assert_eq!(observer.reads(), 1);

        let writes = observer.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].persist);
        assert_eq!(writes[0].value, TokenSettings::default());
    }
}
