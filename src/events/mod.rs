//! Domain events emitted by the engine.
//!
//! Events are informational: every committed mutation emits one, and the
//! processing loop is where the observability collaborator attaches. Event
//! delivery failure never rolls back the mutation that produced it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::movement_document::MovementDirection;
use crate::entities::partner::PartnerKind;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// The events that can occur in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Movement lifecycle
    MovementCreated {
        document_id: Uuid,
        code: String,
        direction: MovementDirection,
        created_by: Uuid,
    },
    MovementApproved {
        document_id: Uuid,
        code: String,
        approved_by: Uuid,
        line_count: usize,
    },
    MovementRejected {
        document_id: Uuid,
        code: String,
        rejected_by: Uuid,
    },

    // Settlement
    DebtSettled {
        partner_id: Uuid,
        partner_kind: PartnerKind,
        total_applied: Decimal,
        unallocated: Decimal,
        orders_touched: usize,
        settled_by: Uuid,
        settled_at: DateTime<Utc>,
    },
    LedgerEntryPosted {
        entry_id: Uuid,
        bank_account_id: Option<Uuid>,
        amount: Decimal,
    },
}

/// Consumes and logs engine events until the channel closes.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::MovementApproved {
                document_id,
                code,
                approved_by,
                line_count,
            } => {
                info!(
                    document_id = %document_id,
                    code = %code,
                    approved_by = %approved_by,
                    line_count,
                    "Movement approved"
                );
            }
            Event::DebtSettled {
                partner_id,
                total_applied,
                unallocated,
                ..
            } => {
                if !unallocated.is_zero() {
                    warn!(
                        partner_id = %partner_id,
                        %unallocated,
                        "Settlement left an unallocated remainder"
                    );
                }
                info!(partner_id = %partner_id, %total_applied, "Debt settled");
            }
            other => match serde_json::to_string(other) {
                Ok(payload) => info!(event = %payload, "Received event"),
                Err(e) => warn!(error = %e, "Failed to serialize event: {:?}", other),
            },
        }
    }

    info!("Event processing loop stopped");
}
