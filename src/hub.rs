// Live-rate fan-out. One actor task owns the registry of subscriber outboxes and
// applies register/unregister/broadcast in arrival order. Every outbox is a
// bounded channel; a subscriber whose outbox is full or closed is removed
// instead of slowing the hub or the sampler.

use crate::models::RateSample;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-subscriber outbox capacity.
    pub subscriber_buffer: usize,
    /// Hub command queue capacity.
    pub queue_capacity: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("subscriber hub is not running")]
pub struct HubClosed;

enum HubCommand {
    Register {
        id: u64,
        outbox: mpsc::Sender<RateSample>,
    },
    Unregister {
        id: u64,
    },
    Broadcast(RateSample),
}

/// Cloneable handle to the hub actor.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
    subscribers: Arc<AtomicUsize>,
    subscriber_buffer: usize,
    /// Set while the command queue keeps rejecting broadcasts.
    queue_full: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl Hub {
    /// Starts the actor. It runs until every `Hub` handle (including those held
    /// by live subscriptions) has been dropped.
    pub fn spawn(config: HubConfig) -> (Hub, tokio::task::JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(config.queue_capacity.max(1));
        let subscribers = Arc::new(AtomicUsize::new(0));
        let hub = Hub {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            subscribers: subscribers.clone(),
            subscriber_buffer: config.subscriber_buffer.max(1),
            queue_full: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let handle = tokio::spawn(run(rx, subscribers));
        (hub, handle)
    }

    /// Registers a new subscriber and returns its inbound queue.
    pub async fn register(&self) -> Result<Subscription, HubClosed> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbox, inbox) = mpsc::channel(self.subscriber_buffer);
        self.commands
            .send(HubCommand::Register { id, outbox })
            .await
            .map_err(|_| HubClosed)?;
        Ok(Subscription {
            id,
            inbox,
            hub: self.clone(),
        })
    }

    /// Removes a subscriber. Unknown or already removed ids are ignored.
    /// Never blocks: if the command queue is full the closed outbox is pruned
    /// on the next broadcast instead.
    pub fn unregister(&self, id: u64) {
        if self.commands.try_send(HubCommand::Unregister { id }).is_err() {
            tracing::debug!(subscriber = id, "hub queue unavailable; unregister deferred");
        }
    }

    /// Hands `sample` to the actor without waiting. Best effort: when the hub
    /// queue is saturated the sample is dropped. Warns once per full streak.
    pub fn broadcast(&self, sample: RateSample) {
        match self.commands.try_send(HubCommand::Broadcast(sample)) {
            Ok(()) => {
                if self.queue_full.swap(false, Ordering::Relaxed) {
                    tracing::info!(
                        operation = "broadcast",
                        dropped_total = self.dropped_broadcasts(),
                        "hub queue drained"
                    );
                }
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if self.queue_full.swap(true, Ordering::Relaxed) {
                    tracing::debug!(operation = "broadcast", "hub queue full; sample dropped");
                } else {
                    tracing::warn!(operation = "broadcast", "hub queue full; dropping samples");
                }
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(operation = "broadcast", "hub stopped; sample dropped");
            }
        }
    }

    /// Samples dropped because the hub queue was full.
    pub fn dropped_broadcasts(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Registered subscribers, as last seen by the actor.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }
}

/// A live viewer's inbound queue. Dropping it unregisters the subscriber.
pub struct Subscription {
    id: u64,
    inbox: mpsc::Receiver<RateSample>,
    hub: Hub,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next sample, or `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<RateSample> {
        self.inbox.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

async fn run(mut rx: mpsc::Receiver<HubCommand>, subscribers: Arc<AtomicUsize>) {
    let mut outboxes: HashMap<u64, mpsc::Sender<RateSample>> = HashMap::new();
    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Register { id, outbox } => {
                outboxes.insert(id, outbox);
                tracing::debug!(subscriber = id, "subscriber registered");
            }
            HubCommand::Unregister { id } => {
                if outboxes.remove(&id).is_some() {
                    tracing::debug!(subscriber = id, "subscriber unregistered");
                }
            }
            HubCommand::Broadcast(sample) => deliver(&mut outboxes, sample),
        }
        subscribers.store(outboxes.len(), Ordering::Relaxed);
    }
    tracing::debug!("Hub shutting down");
}

fn deliver(outboxes: &mut HashMap<u64, mpsc::Sender<RateSample>>, sample: RateSample) {
    outboxes.retain(|id, outbox| match outbox.try_send(sample) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::info!(subscriber = *id, "subscriber outbox full; dropping slow subscriber");
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(subscriber = *id, "subscriber gone; removing");
            false
        }
    });
}
