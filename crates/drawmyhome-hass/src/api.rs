//! External entity state source
//!
//! [`EntityStateSource`] is the contract the binding layer consumes:
//! per-entity subscriptions that fire once with the current state and then on
//! every change, plus service calls. [`StateHub`] is an in-process
//! implementation backed by a broadcast channel of state-change events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use drawmyhome_core::Attributes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum HassError {
    #[error("Not connected to the home-automation server")]
    NotConnected,

    #[error("No async runtime available for state listeners")]
    NoRuntime,

    #[error("Service {domain}.{service} failed: {reason}")]
    ServiceFailed {
        domain: String,
        service: String,
        reason: String,
    },
}

/// Receives `(state, attributes)` for one entity
pub type StateCallback = Arc<dyn Fn(&str, &Attributes) + Send + Sync>;

/// Current state of an external entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl EntityState {
    pub fn new(entity_id: &str, state: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// `friendly_name` attribute, or the entity id
    pub fn display_name(&self) -> &str {
        self.attributes
            .get("friendly_name")
            .and_then(Value::as_str)
            .unwrap_or(&self.entity_id)
    }

    /// Domain part of the entity id (`light` for `light.kitchen`)
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map(|(domain, _)| domain)
            .unwrap_or(&self.entity_id)
    }
}

/// A `state_changed` event
#[derive(Debug, Clone, PartialEq)]
pub struct StateChanged {
    pub entity_id: String,
    pub new_state: EntityState,
}

/// A live state listener. Released on [`Subscription::unsubscribe`] or drop.
pub struct Subscription {
    entity_id: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(entity_id: &str, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            release: Some(Box::new(release)),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Release the listener. Further calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!(entity = %self.entity_id, "Unsubscribed from entity state");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("entity_id", &self.entity_id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Source of external entity states
#[async_trait]
pub trait EntityStateSource: Send + Sync {
    /// Subscribe to one entity. The callback runs immediately with the
    /// current state, if the entity has one, then on every change.
    fn subscribe(&self, entity_id: &str, callback: StateCallback) -> Result<Subscription, HassError>;

    /// Call a service such as `light.turn_on`
    async fn call_service(&self, domain: &str, service: &str, data: Value) -> Result<Value, HassError>;

    /// Current state of one entity
    fn state(&self, entity_id: &str) -> Option<EntityState>;

    /// Every entity id with a known state, sorted
    fn entity_ids(&self) -> Vec<String>;
}

/// A service call received by the hub
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Value,
}

/// In-process entity state source
pub struct StateHub {
    states: RwLock<HashMap<String, EntityState>>,
    events: broadcast::Sender<StateChanged>,
    connected: AtomicBool,
    active: Arc<AtomicUsize>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl StateHub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            states: RwLock::new(HashMap::new()),
            events,
            connected: AtomicBool::new(true),
            active: Arc::new(AtomicUsize::new(0)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set an entity state and notify listeners
    pub fn set_state(&self, new_state: EntityState) {
        let entity_id = new_state.entity_id.clone();
        self.states.write().insert(entity_id.clone(), new_state.clone());
        debug!(entity = %entity_id, state = %new_state.state, "Entity state changed");
        let _ = self.events.send(StateChanged {
            entity_id,
            new_state,
        });
    }

    /// Subscribe to every state change
    pub fn events(&self) -> broadcast::Receiver<StateChanged> {
        self.events.subscribe()
    }

    /// Number of live entity subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        info!(connected, "State hub connection changed");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Service calls received so far
    pub fn service_calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().clone()
    }

    fn target_entity(data: &Value) -> Option<&str> {
        data.get("entity_id").and_then(Value::as_str)
    }
}

impl Default for StateHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStateSource for StateHub {
    fn subscribe(&self, entity_id: &str, callback: StateCallback) -> Result<Subscription, HassError> {
        if !self.is_connected() {
            return Err(HassError::NotConnected);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| HassError::NoRuntime)?;

        // Listen before reading the current state so no change slips between
        let mut rx = self.events.subscribe();
        if let Some(current) = self.state(entity_id) {
            callback(&current.state, &current.attributes);
        }

        let target = entity_id.to_string();
        let listener = runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.entity_id == target => {
                        callback(&event.new_state.state, &event.new_state.attributes);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!(entity = %target, skipped = n, "State listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let active = self.active.clone();
        active.fetch_add(1, Ordering::SeqCst);
        debug!(entity = %entity_id, "Subscribed to entity state");

        Ok(Subscription::new(entity_id, move || {
            listener.abort();
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    async fn call_service(&self, domain: &str, service: &str, data: Value) -> Result<Value, HassError> {
        if !self.is_connected() {
            return Err(HassError::NotConnected);
        }
        self.calls.lock().push(ServiceCall {
            domain: domain.to_string(),
            service: service.to_string(),
            data: data.clone(),
        });

        let next = match service {
            "turn_on" => Some("on"),
            "turn_off" => Some("off"),
            "toggle" => None,
            _ => return Ok(Value::Null),
        };

        let entity_id = Self::target_entity(&data).ok_or_else(|| HassError::ServiceFailed {
            domain: domain.to_string(),
            service: service.to_string(),
            reason: "missing entity_id".to_string(),
        })?;

        let mut state = self.state(entity_id).ok_or_else(|| HassError::ServiceFailed {
            domain: domain.to_string(),
            service: service.to_string(),
            reason: format!("unknown entity {entity_id}"),
        })?;
        state.state = match next {
            Some(next) => next.to_string(),
            None if state.state == "on" => "off".to_string(),
            None => "on".to_string(),
        };
        self.set_state(state);
        Ok(Value::Null)
    }

    fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.states.read().get(entity_id).cloned()
    }

    fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
