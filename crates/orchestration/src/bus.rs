//! Agent-to-agent message bus
//!
//! Point-to-point delivery into per-agent inboxes plus type-keyed broadcast
//! for untargeted events. Delivery is at-most-once; a bounded history of
//! recent events is retained for observability. Nothing survives a process
//! restart.

use std::collections::{HashMap, VecDeque};
use swarmforge_common::{AgentId, CoordinationEvent, CoordinationEventType, Result, SwarmError};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct BusInner {
    inboxes: HashMap<AgentId, mpsc::UnboundedSender<CoordinationEvent>>,
    subscribers: HashMap<CoordinationEventType, Vec<mpsc::UnboundedSender<CoordinationEvent>>>,
    history: VecDeque<CoordinationEvent>,
}

pub struct MessageBus {
    inner: RwLock<BusInner>,
    history_limit: usize,
}

impl MessageBus {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: RwLock::new(BusInner {
                inboxes: HashMap::new(),
                subscribers: HashMap::new(),
                history: VecDeque::with_capacity(history_limit),
            }),
            history_limit,
        }
    }

    /// Attach an inbox for a known agent; direct sends to that agent land here.
    ///
    /// Re-attaching replaces the previous inbox (last-write-wins).
    pub async fn attach_inbox(&self, agent: &AgentId) -> mpsc::UnboundedReceiver<CoordinationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().await;
        inner.inboxes.insert(agent.clone(), tx);
        rx
    }

    /// Subscribe to all broadcast events of one type
    pub async fn subscribe(
        &self,
        event_type: CoordinationEventType,
    ) -> mpsc::UnboundedReceiver<CoordinationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().await;
        inner.subscribers.entry(event_type).or_default().push(tx);
        rx
    }

    /// Deliver a coordination event
    ///
    /// Targeted events go to the target's inbox and fail with
    /// `UnknownRecipient` when the target has no inbox (logged, non-fatal for
    /// the sender's flow). Untargeted events fan out to every subscriber of
    /// the event's type. Per-sender insertion order is preserved; there is no
    /// cross-sender ordering guarantee.
    pub async fn send(&self, event: CoordinationEvent) -> Result<()> {
        let mut inner = self.inner.write().await;

        inner.history.push_back(event.clone());
        while inner.history.len() > self.history_limit {
            inner.history.pop_front();
        }

        match &event.target {
            Some(target) => {
                let Some(inbox) = inner.inboxes.get(target) else {
                    warn!("Dropping {} event for unknown recipient {}", event.event_type, target);
                    return Err(SwarmError::UnknownRecipient(target.clone()));
                };
                if inbox.send(event.clone()).is_err() {
                    debug!("Inbox closed for agent {}", target);
                }
            }
            None => {
                if let Some(subs) = inner.subscribers.get_mut(&event.event_type) {
                    subs.retain(|tx| tx.send(event.clone()).is_ok());
                }
            }
        }

        Ok(())
    }

    /// The most recent `limit` events, insertion-ordered
    pub async fn history(&self, limit: usize) -> Vec<CoordinationEvent> {
        let inner = self.inner.read().await;
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }
}
