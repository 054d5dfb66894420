//! Events dispatched outward through the render surface to the hosting UI

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Signals for the host UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SurfaceEvent {
    /// Show the detail dialog of an external entity
    #[serde(rename = "open_entity_detail")]
    OpenEntityDetail { entity_id: String },
    /// Prompt the user to pick an entity for an unlinked device
    #[serde(rename = "select_entity")]
    SelectEntity { device_id: String },
}

/// Sender side of the render-surface event channel
#[derive(Debug, Clone)]
pub struct SurfaceEvents {
    tx: broadcast::Sender<SurfaceEvent>,
}

impl SurfaceEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.tx.subscribe()
    }

    /// Dispatch an event. Having no listener is not an error.
    pub fn dispatch(&self, event: SurfaceEvent) {
        debug!(event = ?event, "Surface event");
        let _ = self.tx.send(event);
    }

    pub fn open_entity_detail(&self, entity_id: &str) {
        self.dispatch(SurfaceEvent::OpenEntityDetail {
            entity_id: entity_id.to_string(),
        });
    }

    pub fn request_entity_selection(&self, device_id: &str) {
        self.dispatch(SurfaceEvent::SelectEntity {
            device_id: device_id.to_string(),
        });
    }
}

impl Default for SurfaceEvents {
    fn default() -> Self {
        Self::new()
    }
}
