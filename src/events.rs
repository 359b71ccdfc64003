use crate::dispatch::{DepthUnit, InboundEvent};
use crate::error::EventBusError;
use crate::session::{Generation, SessionState};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the navigation client
#[derive(Debug, Clone)]
pub enum NavEvent {
    /// The session controller moved between states
    SessionStateChanged {
        generation: Generation,
        previous: SessionState,
        state: SessionState,
        timestamp: DateTime<Utc>,
    },
    /// A decoded result from the inference server for the current generation
    Inbound {
        generation: Generation,
        event: InboundEvent,
        target_language: String,
        timestamp: DateTime<Utc>,
    },
    /// An object came within the proximity threshold
    ProximityWarning {
        generation: Generation,
        depth: f64,
        unit: DepthUnit,
        target_language: String,
        timestamp: DateTime<Utc>,
    },
    /// A reconnect attempt was scheduled after a dropped connection
    ReconnectScheduled {
        generation: Generation,
        attempt: u32,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A component reported a recoverable error
    SystemError { component: String, error: String },
    /// Application shutdown requested
    ShutdownRequested {
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

impl NavEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            NavEvent::SessionStateChanged { timestamp, .. } => *timestamp,
            NavEvent::Inbound { timestamp, .. } => *timestamp,
            NavEvent::ProximityWarning { timestamp, .. } => *timestamp,
            NavEvent::ReconnectScheduled { timestamp, .. } => *timestamp,
            NavEvent::SystemError { .. } => Utc::now(),
            NavEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            NavEvent::SessionStateChanged {
                generation,
                previous,
                state,
                ..
            } => format!("Session {} {:?} -> {:?}", generation, previous, state),
            NavEvent::Inbound {
                generation, event, ..
            } => format!("Session {} received {}", generation, event.kind()),
            NavEvent::ProximityWarning { depth, unit, .. } => {
                format!("Object close at {}", unit.format(*depth))
            }
            NavEvent::ReconnectScheduled {
                generation,
                attempt,
                delay_ms,
                ..
            } => format!(
                "Reconnect attempt {} after session {} in {}ms",
                attempt, generation, delay_ms
            ),
            NavEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            NavEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            NavEvent::SessionStateChanged { .. } => "session_state_changed",
            NavEvent::Inbound { .. } => "inbound",
            NavEvent::ProximityWarning { .. } => "proximity_warning",
            NavEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            NavEvent::SystemError { .. } => "system_error",
            NavEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NavEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        Self {
            debug_logging: true,
            ..Self::new(capacity)
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<NavEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter and a name for log lines
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: NavEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        // Log important events at appropriate levels
        match &event {
            NavEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            NavEvent::ProximityWarning { depth, unit, .. } => {
                info!("Proximity warning at {}", unit.format(*depth));
            }
            NavEvent::ReconnectScheduled {
                attempt, delay_ms, ..
            } => {
                warn!("Reconnecting in {}ms (attempt {})", delay_ms, attempt);
            }
            NavEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {}
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&NavEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &NavEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<NavEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<NavEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<NavEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<NavEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn state_event(generation: Generation) -> NavEvent {
        NavEvent::SessionStateChanged {
            generation,
            previous: SessionState::Idle,
            state: SessionState::Connecting,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(state_event(3)).await.unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            NavEvent::SessionStateChanged {
                generation, state, ..
            } => {
                assert_eq!(generation, 3);
                assert_eq!(state, SessionState::Connecting);
            }
            other => panic!("Unexpected event type: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());
        assert!(event_bus.publish(state_event(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver =
            event_bus.subscribe_filtered(EventFilter::EventTypes(vec!["proximity_warning"]), "test");

        event_bus.publish(state_event(1)).await.unwrap();
        event_bus
            .publish(NavEvent::ProximityWarning {
                generation: 1,
                depth: 5.0,
                unit: DepthUnit::Centimeters,
                target_language: "en".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "proximity_warning");
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_custom_filter() {
        let filter = EventFilter::Custom(|event| {
            matches!(event, NavEvent::SessionStateChanged { generation, .. } if *generation > 1)
        });
        assert!(!filter.matches(&state_event(1)));
        assert!(filter.matches(&state_event(2)));
        assert!(EventFilter::All.matches(&state_event(1)));
    }
}
