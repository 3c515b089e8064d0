use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use pagewatch_core_types::MonitorId;
use pagewatch_registry::ChangeRecord;

/// Notification emitted to subscribers. Fire-and-forget: no acknowledgment
/// is expected, lagging receivers drop events.
#[derive(Clone, Debug)]
pub enum WatchEvent {
    ChangeDetected {
        monitor: MonitorId,
        target: String,
        record: ChangeRecord,
        timestamp: DateTime<Utc>,
    },
    /// Emitted when repeated capture failures auto-pause a monitor.
    /// Distinct from a change event so subscribers can tell the two apart.
    MonitorAutoPaused {
        monitor: MonitorId,
        target: String,
        consecutive_failures: u32,
        timestamp: DateTime<Utc>,
    },
}

/// In-memory broadcast bus for change notifications.
pub struct ChangeNotifier {
    sender: broadcast::Sender<WatchEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: WatchEvent) {
        // No subscribers is fine; the engine never waits on delivery.
        if self.sender.send(event).is_err() {
            debug!("change notification dropped, no subscribers");
        }
    }
}
