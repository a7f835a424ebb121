//! Inventory Movement Lifecycle.
//!
//! Movement documents are created in `PENDING` state and only touch stock
//! balances when approved. Sufficiency is checked twice: at creation as a
//! fast-fail courtesy to the caller, and authoritatively at approval via a
//! guarded decrement inside the transaction, so two racing approvals can
//! never jointly drive a balance negative.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{resources, Action, Actor, PermissionGate};
use crate::entities::document_sequence::{self, Entity as DocumentSequence};
use crate::entities::material::Entity as Material;
use crate::entities::movement_document::{
    self, Entity as MovementDocument, MovementDirection, MovementState,
};
use crate::entities::movement_line::{self, Entity as MovementLine};
use crate::entities::product::Entity as Product;
use crate::entities::stock_balance::{self, Entity as StockBalance, ItemKind, ItemRef};
use crate::entities::stock_history;
use crate::entities::warehouse::{self, Entity as Warehouse};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// One requested item line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

/// Request to create a movement document.
///
/// `IN` documents populate `dest_warehouse_id`, `OUT` documents
/// `source_warehouse_id`, `TRANSFER` documents both.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMovementRequest {
    pub direction: MovementDirection,
    pub source_warehouse_id: Option<Uuid>,
    pub dest_warehouse_id: Option<Uuid>,
    #[validate(length(min = 1, message = "at least one line is required"))]
    pub lines: Vec<MovementLineInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementLineView {
    pub item: ItemRef,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub amount: Option<Decimal>,
}

/// Serializable projection of a movement document, stable for the reporting
/// and PDF collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct MovementResponse {
    pub id: Uuid,
    pub code: String,
    pub direction: MovementDirection,
    pub state: MovementState,
    pub source_warehouse_id: Option<Uuid>,
    pub dest_warehouse_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: chrono::DateTime<Utc>,
    pub approved_at: Option<chrono::DateTime<Utc>>,
    pub lines: Vec<MovementLineView>,
}

impl MovementResponse {
    fn from_models(doc: movement_document::Model, lines: Vec<movement_line::Model>) -> Self {
        Self {
            id: doc.id,
            code: doc.code,
            direction: doc.direction,
            state: doc.state,
            source_warehouse_id: doc.source_warehouse_id,
            dest_warehouse_id: doc.dest_warehouse_id,
            notes: doc.notes,
            created_by: doc.created_by,
            approved_by: doc.approved_by,
            created_at: doc.created_at,
            approved_at: doc.approved_at,
            lines: lines
                .into_iter()
                .map(|l| MovementLineView {
                    item: ItemRef {
                        kind: l.item_kind,
                        id: l.item_id,
                    },
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    amount: l.amount,
                })
                .collect(),
        }
    }
}

/// One row of a warehouse balance listing.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceRow {
    pub item: ItemRef,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
}

/// Formats a document code: `{prefix}{YYMMDD}{seq:04}`.
pub fn format_document_code(prefix: &str, date: NaiveDate, sequence: i32) -> String {
    format!("{}{}{:04}", prefix, date.format("%y%m%d"), sequence)
}

/// Service owning movement documents, stock balances and stock history.
///
/// No other component writes balances or history.
#[derive(Clone)]
pub struct InventoryMovementService {
    db_pool: Arc<DatabaseConnection>,
    gate: PermissionGate,
    event_sender: EventSender,
}

impl InventoryMovementService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        gate: PermissionGate,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db_pool,
            gate,
            event_sender,
        }
    }

    /// Creates a movement document in `PENDING` state.
    #[instrument(skip(self, request), fields(direction = ?request.direction))]
    pub async fn create_movement(
        &self,
        actor: &Actor,
        request: CreateMovementRequest,
    ) -> Result<MovementResponse, ServiceError> {
        request.validate()?;

        self.gate
            .authorize(actor, request.direction.resource_code(), Action::Create)
            .await?;

        let db = &*self.db_pool;

        let (source, dest) = self
            .resolve_warehouses(db, actor, &request)
            .await?;
        let owning = source
            .as_ref()
            .or(dest.as_ref())
            .ok_or_else(|| ServiceError::InternalError("no warehouse resolved".into()))?;
        let item_kind = owning.kind.item_kind();
        let branch_id = owning.branch_id;

        self.validate_lines(db, &request, item_kind, branch_id)
            .await?;

        // Fast-fail sufficiency check against committed state. Approval
        // re-validates under the transaction, which is the authoritative
        // guard.
        if let Some(src) = &source {
            self.check_sufficiency(db, src.id, item_kind, &request.lines)
                .await?;
        }

        let now = Utc::now();
        let today = now.date_naive();
        let prefix = request.direction.code_prefix();
        let document_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for movement creation");
            ServiceError::DatabaseError(e)
        })?;

        let sequence = next_sequence(&txn, prefix, today).await?;
        let code = format_document_code(prefix, today, sequence);

        let doc = movement_document::ActiveModel {
            id: Set(document_id),
            code: Set(code.clone()),
            direction: Set(request.direction),
            state: Set(MovementState::Pending),
            source_warehouse_id: Set(source.as_ref().map(|w| w.id)),
            dest_warehouse_id: Set(dest.as_ref().map(|w| w.id)),
            notes: Set(request.notes.clone()),
            created_by: Set(actor.user_id),
            approved_by: Set(None),
            created_at: Set(now),
            approved_at: Set(None),
        };
        doc.insert(&txn).await?;

        let line_models: Vec<movement_line::ActiveModel> = request
            .lines
            .iter()
            .map(|line| movement_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(document_id),
                item_id: Set(line.item_id),
                item_kind: Set(item_kind),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                amount: Set(line.unit_price.map(|p| p * line.quantity)),
            })
            .collect();
        MovementLine::insert_many(line_models).exec(&txn).await?;

        txn.commit().await?;

        info!(
            document_id = %document_id,
            code = %code,
            created_by = %actor.user_id,
            "Movement document created"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::MovementCreated {
                document_id,
                code,
                direction: request.direction,
                created_by: actor.user_id,
            })
            .await
        {
            error!(error = %e, "Failed to emit MovementCreated event");
        }

        self.get_movement_unchecked(document_id).await
    }

    /// Approves a `PENDING` document and applies its balance deltas.
    ///
    /// The `PENDING -> APPROVED` flip is itself a guarded update, so two
    /// racing approvals of the same document resolve to exactly one winner.
    #[instrument(skip(self))]
    pub async fn approve_movement(
        &self,
        actor: &Actor,
        document_id: Uuid,
    ) -> Result<MovementResponse, ServiceError> {
        let db = &*self.db_pool;

        let doc = MovementDocument::find_by_id(document_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("movement document {}", document_id)))?;

        self.gate
            .authorize(actor, doc.direction.resource_code(), Action::Edit)
            .await?;
        self.check_branch_scope(db, actor, &doc).await?;

        let actor_id = actor.user_id;
        let direction = doc.direction;
        let source_id = doc.source_warehouse_id;
        let dest_id = doc.dest_warehouse_id;

        let approved = db
            .transaction::<_, movement_document::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();

                    let flipped = MovementDocument::update_many()
                        .col_expr(
                            movement_document::Column::State,
                            Expr::value(MovementState::Approved),
                        )
                        .col_expr(movement_document::Column::ApprovedBy, Expr::value(actor_id))
                        .col_expr(movement_document::Column::ApprovedAt, Expr::value(now))
                        .filter(movement_document::Column::Id.eq(document_id))
                        .filter(movement_document::Column::State.eq(MovementState::Pending))
                        .exec(txn)
                        .await?;
                    if flipped.rows_affected == 0 {
                        return Err(state_transition_error(txn, document_id, "approve").await);
                    }

                    let lines = MovementLine::find()
                        .filter(movement_line::Column::DocumentId.eq(document_id))
                        .all(txn)
                        .await?;

                    for line in &lines {
                        let item = ItemRef {
                            kind: line.item_kind,
                            id: line.item_id,
                        };
                        match direction {
                            MovementDirection::In => {
                                let wh = dest_id.ok_or_else(missing_warehouse)?;
                                increase_balance(txn, wh, item, line.quantity).await?;
                                record_history(
                                    txn,
                                    wh,
                                    item,
                                    MovementDirection::In,
                                    line.quantity,
                                    document_id,
                                    actor_id,
                                )
                                .await?;
                            }
                            MovementDirection::Out => {
                                let wh = source_id.ok_or_else(missing_warehouse)?;
                                decrease_balance(txn, wh, item, line.quantity).await?;
                                record_history(
                                    txn,
                                    wh,
                                    item,
                                    MovementDirection::Out,
                                    line.quantity,
                                    document_id,
                                    actor_id,
                                )
                                .await?;
                            }
                            MovementDirection::Transfer => {
                                let src = source_id.ok_or_else(missing_warehouse)?;
                                let dst = dest_id.ok_or_else(missing_warehouse)?;
                                decrease_balance(txn, src, item, line.quantity).await?;
                                increase_balance(txn, dst, item, line.quantity).await?;
                                record_history(
                                    txn,
                                    src,
                                    item,
                                    MovementDirection::Out,
                                    line.quantity,
                                    document_id,
                                    actor_id,
                                )
                                .await?;
                                record_history(
                                    txn,
                                    dst,
                                    item,
                                    MovementDirection::In,
                                    line.quantity,
                                    document_id,
                                    actor_id,
                                )
                                .await?;
                            }
                        }
                    }

                    MovementDocument::find_by_id(document_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::InternalError("approved document vanished".into())
                        })
                })
            })
            .await?;

        info!(
            document_id = %approved.id,
            code = %approved.code,
            approved_by = %actor_id,
            "Movement document approved"
        );

        let lines = MovementLine::find()
            .filter(movement_line::Column::DocumentId.eq(document_id))
            .all(db)
            .await?;

        if let Err(e) = self
            .event_sender
            .send(Event::MovementApproved {
                document_id,
                code: approved.code.clone(),
                approved_by: actor_id,
                line_count: lines.len(),
            })
            .await
        {
            error!(error = %e, "Failed to emit MovementApproved event");
        }

        Ok(MovementResponse::from_models(approved, lines))
    }

    /// Rejects a `PENDING` document. Terminal; no balance or history effect.
    #[instrument(skip(self))]
    pub async fn reject_movement(
        &self,
        actor: &Actor,
        document_id: Uuid,
    ) -> Result<MovementResponse, ServiceError> {
        let db = &*self.db_pool;

        let doc = MovementDocument::find_by_id(document_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("movement document {}", document_id)))?;

        self.gate
            .authorize(actor, doc.direction.resource_code(), Action::Edit)
            .await?;
        self.check_branch_scope(db, actor, &doc).await?;

        // Only the state flips; approved_by/approved_at stay null so the
        // projection never shows an "approver" on a rejected document. The
        // rejecting actor is carried by the event and the log line.
        let flipped = MovementDocument::update_many()
            .col_expr(
                movement_document::Column::State,
                Expr::value(MovementState::Rejected),
            )
            .filter(movement_document::Column::Id.eq(document_id))
            .filter(movement_document::Column::State.eq(MovementState::Pending))
            .exec(db)
            .await?;
        if flipped.rows_affected == 0 {
            return Err(ServiceError::InvalidStateTransition(format!(
                "cannot reject movement document {} outside PENDING state",
                document_id
            )));
        }

        info!(document_id = %document_id, rejected_by = %actor.user_id, "Movement document rejected");

        if let Err(e) = self
            .event_sender
            .send(Event::MovementRejected {
                document_id,
                code: doc.code.clone(),
                rejected_by: actor.user_id,
            })
            .await
        {
            error!(error = %e, "Failed to emit MovementRejected event");
        }

        self.get_movement_unchecked(document_id).await
    }

    /// Lists current quantities for every item of the warehouse's item class.
    ///
    /// `include_zero` lists items with no stock as quantity 0 (the default
    /// listing); `false` keeps only items with positive stock.
    #[instrument(skip(self))]
    pub async fn get_balance(
        &self,
        actor: &Actor,
        warehouse_id: Uuid,
        include_zero: bool,
    ) -> Result<Vec<BalanceRow>, ServiceError> {
        self.gate
            .authorize(actor, resources::INVENTORY_BALANCE, Action::View)
            .await?;

        let db = &*self.db_pool;
        let wh = load_warehouse(db, warehouse_id).await?;
        if !actor.can_act_on_branch(wh.branch_id) {
            return Err(ServiceError::Forbidden(format!(
                "warehouse {} belongs to another branch",
                wh.code
            )));
        }

        let item_kind = wh.kind.item_kind();
        let balances: HashMap<Uuid, Decimal> = StockBalance::find()
            .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_balance::Column::ItemKind.eq(item_kind))
            .all(db)
            .await?
            .into_iter()
            .map(|b| (b.item_id, b.quantity))
            .collect();

        let mut rows: Vec<BalanceRow> = match item_kind {
            ItemKind::Material => Material::find()
                .filter(crate::entities::material::Column::BranchId.eq(wh.branch_id))
                .order_by_asc(crate::entities::material::Column::Code)
                .all(db)
                .await?
                .into_iter()
                .map(|m| BalanceRow {
                    item: ItemRef::material(m.id),
                    code: m.code,
                    name: m.name,
                    unit: m.unit,
                    quantity: balances.get(&m.id).copied().unwrap_or(Decimal::ZERO),
                })
                .collect(),
            ItemKind::Product => Product::find()
                .filter(crate::entities::product::Column::BranchId.eq(wh.branch_id))
                .order_by_asc(crate::entities::product::Column::Code)
                .all(db)
                .await?
                .into_iter()
                .map(|p| BalanceRow {
                    item: ItemRef::product(p.id),
                    code: p.code,
                    name: p.name,
                    unit: p.unit,
                    quantity: balances.get(&p.id).copied().unwrap_or(Decimal::ZERO),
                })
                .collect(),
        };

        if !include_zero {
            rows.retain(|r| r.quantity > Decimal::ZERO);
        }

        Ok(rows)
    }

    /// Read-only projection of a document with its lines.
    #[instrument(skip(self))]
    pub async fn get_movement(
        &self,
        actor: &Actor,
        document_id: Uuid,
    ) -> Result<MovementResponse, ServiceError> {
        let db = &*self.db_pool;
        let doc = MovementDocument::find_by_id(document_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("movement document {}", document_id)))?;

        self.gate
            .authorize(actor, doc.direction.resource_code(), Action::View)
            .await?;
        self.check_branch_scope(db, actor, &doc).await?;

        let lines = MovementLine::find()
            .filter(movement_line::Column::DocumentId.eq(document_id))
            .all(db)
            .await?;
        Ok(MovementResponse::from_models(doc, lines))
    }

    async fn get_movement_unchecked(
        &self,
        document_id: Uuid,
    ) -> Result<MovementResponse, ServiceError> {
        let db = &*self.db_pool;
        let doc = MovementDocument::find_by_id(document_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("movement document {}", document_id)))?;
        let lines = MovementLine::find()
            .filter(movement_line::Column::DocumentId.eq(document_id))
            .all(db)
            .await?;
        Ok(MovementResponse::from_models(doc, lines))
    }

    /// Resolves and branch-checks the warehouses named by a create request.
    async fn resolve_warehouses(
        &self,
        db: &DatabaseConnection,
        actor: &Actor,
        request: &CreateMovementRequest,
    ) -> Result<(Option<warehouse::Model>, Option<warehouse::Model>), ServiceError> {
        let (source_id, dest_id) = match request.direction {
            MovementDirection::In => {
                if request.source_warehouse_id.is_some() || request.dest_warehouse_id.is_none() {
                    return Err(ServiceError::ValidationError(
                        "IN documents take a destination warehouse only".into(),
                    ));
                }
                (None, request.dest_warehouse_id)
            }
            MovementDirection::Out => {
                if request.dest_warehouse_id.is_some() || request.source_warehouse_id.is_none() {
                    return Err(ServiceError::ValidationError(
                        "OUT documents take a source warehouse only".into(),
                    ));
                }
                (request.source_warehouse_id, None)
            }
            MovementDirection::Transfer => {
                let (src, dst) = match (request.source_warehouse_id, request.dest_warehouse_id) {
                    (Some(s), Some(d)) if s != d => (s, d),
                    (Some(_), Some(_)) => {
                        return Err(ServiceError::ValidationError(
                            "transfer source and destination must differ".into(),
                        ))
                    }
                    _ => {
                        return Err(ServiceError::ValidationError(
                            "TRANSFER documents take both warehouses".into(),
                        ))
                    }
                };
                (Some(src), Some(dst))
            }
        };

        let mut resolved_source = None;
        let mut resolved_dest = None;

        for (slot, id) in [(&mut resolved_source, source_id), (&mut resolved_dest, dest_id)] {
            if let Some(warehouse_id) = id {
                let wh = load_warehouse(db, warehouse_id).await?;
                if !wh.active {
                    return Err(ServiceError::ValidationError(format!(
                        "warehouse {} is deactivated",
                        wh.code
                    )));
                }
                if !actor.can_act_on_branch(wh.branch_id) {
                    return Err(ServiceError::Forbidden(format!(
                        "warehouse {} belongs to another branch",
                        wh.code
                    )));
                }
                *slot = Some(wh);
            }
        }

        if let (Some(src), Some(dst)) = (&resolved_source, &resolved_dest) {
            if src.kind != dst.kind {
                return Err(ServiceError::ValidationError(
                    "transfer warehouses must hold the same item class".into(),
                ));
            }
        }

        Ok((resolved_source, resolved_dest))
    }

    async fn validate_lines(
        &self,
        db: &DatabaseConnection,
        request: &CreateMovementRequest,
        item_kind: ItemKind,
        branch_id: Uuid,
    ) -> Result<(), ServiceError> {
        for line in &request.lines {
            if line.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "quantity for item {} must be positive",
                    line.item_id
                )));
            }
            if request.direction == MovementDirection::In && line.unit_price.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "unit price is required on IN lines (item {})",
                    line.item_id
                )));
            }
            if let Some(price) = line.unit_price {
                if price < Decimal::ZERO {
                    return Err(ServiceError::ValidationError(format!(
                        "unit price for item {} must not be negative",
                        line.item_id
                    )));
                }
            }

            // Items must live in the warehouse's branch, otherwise the
            // branch-scoped balance listing could not account for them.
            let item_branch = match item_kind {
                ItemKind::Material => Material::find_by_id(line.item_id)
                    .one(db)
                    .await?
                    .map(|m| m.branch_id),
                ItemKind::Product => Product::find_by_id(line.item_id)
                    .one(db)
                    .await?
                    .map(|p| p.branch_id),
            };
            match item_branch {
                None => {
                    return Err(ServiceError::NotFound(format!(
                        "{:?} {} does not exist",
                        item_kind, line.item_id
                    )))
                }
                Some(b) if b != branch_id => {
                    return Err(ServiceError::ValidationError(format!(
                        "{:?} {} belongs to another branch",
                        item_kind, line.item_id
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Creation-time sufficiency check for OUT/TRANSFER requests. Reads
    /// committed state only.
    async fn check_sufficiency(
        &self,
        db: &DatabaseConnection,
        warehouse_id: Uuid,
        item_kind: ItemKind,
        lines: &[MovementLineInput],
    ) -> Result<(), ServiceError> {
        let mut required: HashMap<Uuid, Decimal> = HashMap::new();
        for line in lines {
            *required.entry(line.item_id).or_insert(Decimal::ZERO) += line.quantity;
        }

        for (item_id, needed) in required {
            let available = StockBalance::find()
                .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
                .filter(stock_balance::Column::ItemId.eq(item_id))
                .filter(stock_balance::Column::ItemKind.eq(item_kind))
                .one(db)
                .await?
                .map(|b| b.quantity)
                .unwrap_or(Decimal::ZERO);
            if available < needed {
                return Err(ServiceError::InsufficientStock(format!(
                    "item {}: requested {}, available {}",
                    item_id, needed, available
                )));
            }
        }
        Ok(())
    }

    async fn check_branch_scope(
        &self,
        db: &DatabaseConnection,
        actor: &Actor,
        doc: &movement_document::Model,
    ) -> Result<(), ServiceError> {
        for id in [doc.source_warehouse_id, doc.dest_warehouse_id]
            .into_iter()
            .flatten()
        {
            let wh = load_warehouse(db, id).await?;
            if !actor.can_act_on_branch(wh.branch_id) {
                return Err(ServiceError::Forbidden(format!(
                    "warehouse {} belongs to another branch",
                    wh.code
                )));
            }
        }
        Ok(())
    }
}

async fn load_warehouse(
    db: &DatabaseConnection,
    warehouse_id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    Warehouse::find_by_id(warehouse_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("warehouse {}", warehouse_id)))
}

fn missing_warehouse() -> ServiceError {
    ServiceError::InternalError("movement document is missing its warehouse reference".into())
}

/// Maps a lost `PENDING` guard to the right error, distinguishing a vanished
/// document from a terminal one.
async fn state_transition_error(
    txn: &DatabaseTransaction,
    document_id: Uuid,
    verb: &str,
) -> ServiceError {
    match MovementDocument::find_by_id(document_id).one(txn).await {
        Ok(Some(doc)) => ServiceError::InvalidStateTransition(format!(
            "cannot {} movement document {} in state {:?}",
            verb, document_id, doc.state
        )),
        Ok(None) => ServiceError::NotFound(format!("movement document {}", document_id)),
        Err(e) => ServiceError::DatabaseError(e),
    }
}

/// Increments the per-day document counter and returns the new value.
///
/// The guarded UPDATE serializes concurrent creators on the counter row; an
/// insert race on the first document of the day surfaces as `Conflict`.
async fn next_sequence(
    txn: &DatabaseTransaction,
    prefix: &str,
    date: NaiveDate,
) -> Result<i32, ServiceError> {
    let updated = DocumentSequence::update_many()
        .col_expr(
            document_sequence::Column::LastValue,
            Expr::col(document_sequence::Column::LastValue).add(1),
        )
        .filter(document_sequence::Column::Prefix.eq(prefix))
        .filter(document_sequence::Column::SeqDate.eq(date))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        let row = document_sequence::ActiveModel {
            prefix: Set(prefix.to_string()),
            seq_date: Set(date),
            last_value: Set(1),
        };
        row.insert(txn).await.map_err(sequence_insert_error)?;
        return Ok(1);
    }

    let row = DocumentSequence::find_by_id((prefix.to_string(), date))
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::InternalError("document sequence row vanished".into()))?;
    Ok(row.last_value)
}

fn sequence_insert_error(e: DbErr) -> ServiceError {
    let msg = e.to_string();
    if matches!(e, DbErr::RecordNotInserted)
        || msg.contains("UNIQUE")
        || msg.contains("duplicate key")
    {
        ServiceError::Conflict("document sequence initialization race, retry the operation".into())
    } else {
        ServiceError::DatabaseError(e)
    }
}

/// Adds `quantity` to a balance, creating the row lazily on first movement.
async fn increase_balance(
    txn: &DatabaseTransaction,
    warehouse_id: Uuid,
    item: ItemRef,
    quantity: Decimal,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let updated = StockBalance::update_many()
        .col_expr(
            stock_balance::Column::Quantity,
            Expr::col(stock_balance::Column::Quantity).add(quantity),
        )
        .col_expr(stock_balance::Column::UpdatedAt, Expr::value(now))
        .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_balance::Column::ItemId.eq(item.id))
        .filter(stock_balance::Column::ItemKind.eq(item.kind))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        let row = stock_balance::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(warehouse_id),
            item_id: Set(item.id),
            item_kind: Set(item.kind),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(None),
        };
        row.insert(txn).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE") || msg.contains("duplicate key") {
                ServiceError::Conflict("balance row initialization race, retry the operation".into())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;
    }
    Ok(())
}

/// Subtracts `quantity` from a balance with a non-negativity guard.
///
/// `UPDATE ... SET quantity = quantity - q WHERE ... AND quantity >= q`; zero
/// affected rows means the stock is insufficient (or the row never existed)
/// and the whole approval aborts.
async fn decrease_balance(
    txn: &DatabaseTransaction,
    warehouse_id: Uuid,
    item: ItemRef,
    quantity: Decimal,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let updated = StockBalance::update_many()
        .col_expr(
            stock_balance::Column::Quantity,
            Expr::col(stock_balance::Column::Quantity).sub(quantity),
        )
        .col_expr(stock_balance::Column::UpdatedAt, Expr::value(now))
        .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_balance::Column::ItemId.eq(item.id))
        .filter(stock_balance::Column::ItemKind.eq(item.kind))
        .filter(stock_balance::Column::Quantity.gte(quantity))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        let available = StockBalance::find()
            .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_balance::Column::ItemId.eq(item.id))
            .filter(stock_balance::Column::ItemKind.eq(item.kind))
            .one(txn)
            .await?
            .map(|b| b.quantity)
            .unwrap_or(Decimal::ZERO);
        return Err(ServiceError::InsufficientStock(format!(
            "item {} in warehouse {}: requested {}, available {}",
            item.id, warehouse_id, quantity, available
        )));
    }
    Ok(())
}

/// Appends the audit fact for one applied line at one warehouse.
async fn record_history(
    txn: &DatabaseTransaction,
    warehouse_id: Uuid,
    item: ItemRef,
    direction: MovementDirection,
    quantity: Decimal,
    document_id: Uuid,
    actor_id: Uuid,
) -> Result<(), ServiceError> {
    let row = stock_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        item_id: Set(item.id),
        item_kind: Set(item.kind),
        direction: Set(direction),
        quantity: Set(quantity),
        document_id: Set(document_id),
        actor_id: Set(actor_id),
        recorded_at: Set(Utc::now()),
    };
    row.insert(txn).await?;
    Ok(())
}
