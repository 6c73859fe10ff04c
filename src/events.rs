use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services after successful state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),

    // Vendor events
    VendorRegistered(Uuid),
    VendorApproved(Uuid),
    VendorRejected(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    ProductApproved(Uuid),
    ProductDisabled(Uuid),

    // Cart events
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemUpdated { cart_id: Uuid, item_id: Uuid },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },

    // Order and payment events
    OrderCreated(Uuid),
    PaymentConfirmed { order_id: Uuid, payment_id: Uuid },
    PaymentFailed { order_id: Uuid, reason: String },
    OrderItemCompleted { order_id: Uuid, item_id: Uuid },
    OrderCompleted(Uuid),
    OrderStatusChanged { order_id: Uuid, new_status: String },
    OrderDeleted(Uuid),

    // Moderation events
    UserActiveToggled { user_id: Uuid, is_active: bool },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Services use this after commit: a dropped event must not fail the request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!("Event dropped: {:?} ({})", event, e);
        }
    }
}

/// Drains the event channel. Events are currently consumed for structured
/// logging only; notification fan-out hangs off this loop when it lands.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentConfirmed { order_id, payment_id } => {
                info!(%order_id, %payment_id, "payment confirmed");
            }
            Event::PaymentFailed { order_id, reason } => {
                warn!(%order_id, %reason, "payment failed");
            }
            Event::OrderCompleted(order_id) => {
                info!(%order_id, "order completed");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}
