// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

// Dashboard Bus - Pub/Sub for Dashboard Notifications
//
// In-process fan-out over tokio broadcast channels. Feeds the `/events` SSE
// endpoint. Delivery is best-effort: nothing is persisted and a lagging
// receiver loses the oldest notifications.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::DashboardEvent;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Broadcast bus for dashboard notifications
#[derive(Clone)]
pub struct DashboardBus {
    sender: Arc<broadcast::Sender<DashboardEvent>>,
}

impl DashboardBus {
    /// Create a new bus with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: DashboardEvent) -> usize {
        let name = event.name();
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!(event = name, "No dashboard subscribers listening");
        }
        receiver_count
    }

    pub fn subscribe(&self) -> DashboardReceiver {
        DashboardReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DashboardBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for dashboard notifications
pub struct DashboardReceiver {
    receiver: broadcast::Receiver<DashboardEvent>,
}

impl DashboardReceiver {
    /// Receive the next notification (waits until one is available)
    pub async fn recv(&mut self) -> Result<DashboardEvent, DashboardBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => DashboardBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Dashboard receiver lagged by {} events", n);
                DashboardBusError::Lagged(n)
            }
        })
    }

    /// Try to receive a notification without waiting
    pub fn try_recv(&mut self) -> Result<DashboardEvent, DashboardBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => DashboardBusError::Empty,
            broadcast::error::TryRecvError::Closed => DashboardBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Dashboard receiver lagged by {} events", n);
                DashboardBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered, skipping over lag gaps.
    pub fn drain(&mut self) -> Vec<DashboardEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(DashboardBusError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }

    pub fn into_inner(self) -> broadcast::Receiver<DashboardEvent> {
        self.receiver
    }
}

/// Errors that can occur when receiving notifications
#[derive(Debug, thiserror::Error)]
pub enum DashboardBusError {
    #[error("Dashboard bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
