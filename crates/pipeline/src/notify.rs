//! In-process "cover updated" events.

use folio_cover::CoverSource;
use tokio::sync::broadcast;

/// Published once per completed background resolution, whether or not the
/// cover actually changed. Consumers must be idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverUpdated {
    pub cache_key: String,
    pub url: String,
    pub book_id: String,
    pub source: CoverSource,
}

/// Fan-out bus for [`CoverUpdated`]. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<CoverUpdated>,
}
impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoverUpdated> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers the event reached.
    pub fn publish(&self, event: CoverUpdated) -> usize {
        let cache_key = event.cache_key.clone();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(cache_key = %cache_key, receivers, "Published cover update");
                receivers
            },
            Err(_) => {
                tracing::trace!(cache_key = %cache_key, "No subscribers for cover update");
                0
            },
        }
    }
}
impl Default for Notifier {
    fn default() -> Self {
        Self::new(1024)
    }
}
