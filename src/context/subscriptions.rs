use futures::Stream;
use tokio::runtime::{Builder, Handle};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::ReliefContext;
use crate::audio::{ChannelEvent, ChannelKind};
use crate::breathing::BreathingUpdate;
use crate::session::TimerUpdate;

impl ReliefContext {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_audio(&self, kind: ChannelKind) -> mpsc::UnboundedReceiver<ChannelEvent> {
        forward(self.coordinator.subscribe(kind))
    }

    pub fn subscribe_breathing(&self) -> mpsc::UnboundedReceiver<BreathingUpdate> {
        forward(self.breathing.subscribe())
    }

    pub fn subscribe_timer(&self) -> mpsc::UnboundedReceiver<TimerUpdate> {
        forward(self.timer.subscribe())
    }

    pub fn breathing_stream(&self) -> impl Stream<Item = BreathingUpdate> {
        UnboundedReceiverStream::new(self.subscribe_breathing())
    }
}

/// Pump a broadcast receiver into an unbounded mpsc receiver.
///
/// Runs on the current tokio runtime when there is one, otherwise on a
/// dedicated thread with its own single-threaded runtime. Lagged messages
/// are skipped; the pump stops when either side closes.
fn forward<T>(mut source: broadcast::Receiver<T>) -> mpsc::UnboundedReceiver<T>
where
    T: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let pump = async move {
        loop {
            match source.recv().await {
                Ok(item) => {
                    if tx.send(item).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("[Subscriptions] subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(pump);
        }
        Err(_) => {
            std::thread::spawn(move || match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt.block_on(pump),
                Err(err) => log::error!("[Subscriptions] failed to create runtime: {}", err),
            });
        }
    }

    rx
}
