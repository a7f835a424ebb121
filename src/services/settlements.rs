//! Debt Settlement Allocator.
//!
//! Distributes one caller-supplied payment across a partner's outstanding
//! orders oldest-first, synchronized with the cash/bank ledger and the
//! partner's aggregate debt. The whole allocation is one transaction; no
//! intermediate state is externally observable.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{resources, Action, Actor, PermissionGate};
use crate::entities::bank_account::{self, Entity as BankAccount};
use crate::entities::ledger_entry::{self, LedgerEntryType, PaymentMethod};
use crate::entities::partner::{self, Entity as Partner, PartnerKind};
use crate::entities::purchase_order::{self, Entity as PurchaseOrder};
use crate::entities::sales_order::{self, Entity as SalesOrder, PaymentStatus, STATUS_CANCELLED};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Request to settle part of a partner's debt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleDebtRequest {
    pub partner_id: Uuid,
    pub partner_kind: PartnerKind,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub bank_account_id: Option<Uuid>,
}

/// What one order received from the settlement.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAllocation {
    pub order_id: Uuid,
    pub applied: Decimal,
    pub new_paid_amount: Decimal,
    pub new_payment_status: PaymentStatus,
}

/// Serializable settlement result for the caller and the reporting
/// collaborators.
///
/// `unallocated` is whatever remained after every outstanding order was
/// satisfied. Per the documented behavior it is not an error and no credit is
/// carried forward; product owners still owe a decision on whether
/// overpayment should become an error or a partner credit.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementBreakdown {
    pub partner_id: Uuid,
    pub partner_kind: PartnerKind,
    pub amount: Decimal,
    pub total_applied: Decimal,
    pub unallocated: Decimal,
    pub ledger_entry_id: Uuid,
    pub allocations: Vec<OrderAllocation>,
}

/// Outstanding order snapshot fed to the planner, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingOrder {
    pub id: Uuid,
    pub order_number: String,
    pub total: Decimal,
    pub paid: Decimal,
}

/// FIFO allocation walk. Pure; the transactional apply mirrors its output
/// row for row.
pub fn plan_allocation(
    orders: &[OutstandingOrder],
    amount: Decimal,
) -> Vec<OrderAllocation> {
    let mut remaining_payment = amount;
    let mut allocations = Vec::new();

    for order in orders {
        if remaining_payment <= Decimal::ZERO {
            break;
        }
        let order_remaining = order.total - order.paid;
        let applied = remaining_payment.min(order_remaining);
        let new_paid = order.paid + applied;
        allocations.push(OrderAllocation {
            order_id: order.id,
            applied,
            new_paid_amount: new_paid,
            new_payment_status: PaymentStatus::from_amounts(new_paid, order.total),
        });
        remaining_payment -= applied;
    }

    allocations
}

/// Service owning `paid_amount`/`payment_status` on orders, partner
/// `debt_amount`, and ledger entries.
#[derive(Clone)]
pub struct DebtSettlementService {
    db_pool: Arc<DatabaseConnection>,
    gate: PermissionGate,
    event_sender: EventSender,
}

impl DebtSettlementService {
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

    /// Settles `request.amount` against the partner's outstanding orders,
    /// oldest first.
    #[instrument(skip(self, request), fields(partner_id = %request.partner_id, amount = %request.amount))]
    pub async fn settle_debt(
        &self,
        actor: &Actor,
        request: SettleDebtRequest,
    ) -> Result<SettlementBreakdown, ServiceError> {
        self.gate
            .authorize(actor, resources::FINANCE_DEBTS, Action::Create)
            .await?;

        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidAmount(format!(
                "settlement amount must be positive, got {}",
                request.amount
            )));
        }

        let db = &*self.db_pool;

        let partner = Partner::find_by_id(request.partner_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("partner {}", request.partner_id)))?;
        if partner.kind != request.partner_kind {
            return Err(ServiceError::ValidationError(format!(
                "partner {} is a {:?}, not a {:?}",
                partner.name, partner.kind, request.partner_kind
            )));
        }

        let bank = match request.bank_account_id {
            Some(account_id) => {
                let account = BankAccount::find_by_id(account_id).one(db).await?.ok_or_else(
                    || ServiceError::NotFound(format!("bank account {}", account_id)),
                )?;
                if !account.active {
                    return Err(ServiceError::ValidationError(format!(
                        "bank account {} is deactivated",
                        account.code
                    )));
                }
                if !actor.can_act_on_branch(account.branch_id) {
                    return Err(ServiceError::Forbidden(format!(
                        "bank account {} belongs to another branch",
                        account.code
                    )));
                }
                Some(account)
            }
            None => None,
        };

        let entry_type = match partner.kind {
            PartnerKind::Customer => LedgerEntryType::Receipt,
            PartnerKind::Supplier => LedgerEntryType::Payment,
        };

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start settlement transaction");
            ServiceError::DatabaseError(e)
        })?;

        let outstanding = load_outstanding(&txn, partner.id, partner.kind).await?;
        if outstanding.is_empty() {
            txn.rollback().await?;
            return Err(ServiceError::NoOutstandingOrders(partner.id.to_string()));
        }

        let allocations = plan_allocation(&outstanding, request.amount);
        let total_applied: Decimal = allocations.iter().map(|a| a.applied).sum();
        let unallocated = request.amount - total_applied;

        apply_allocations(&txn, partner.kind, &outstanding, &allocations).await?;

        // Partner debt shrinks by what was actually applied, never by the
        // unallocated remainder.
        let debited = Partner::update_many()
            .col_expr(
                partner::Column::DebtAmount,
                Expr::col(partner::Column::DebtAmount).sub(total_applied),
            )
            .col_expr(partner::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(partner::Column::Id.eq(partner.id))
            .exec(&txn)
            .await?;
        if debited.rows_affected == 0 {
            txn.rollback().await?;
            return Err(ServiceError::Conflict(format!(
                "partner {} disappeared during settlement",
                partner.id
            )));
        }

        if let Some(account) = &bank {
            let delta = match entry_type {
                LedgerEntryType::Receipt => Expr::col(bank_account::Column::Balance).add(request.amount),
                LedgerEntryType::Payment => Expr::col(bank_account::Column::Balance).sub(request.amount),
            };
            BankAccount::update_many()
                .col_expr(bank_account::Column::Balance, delta)
                .col_expr(bank_account::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(bank_account::Column::Id.eq(account.id))
                .exec(&txn)
                .await?;
        }

        let settled_numbers: Vec<&str> = allocations
            .iter()
            .filter(|a| a.applied > Decimal::ZERO)
            .filter_map(|a| {
                outstanding
                    .iter()
                    .find(|o| o.id == a.order_id)
                    .map(|o| o.order_number.as_str())
            })
            .collect();

        let entry_id = Uuid::new_v4();
        let entry = ledger_entry::ActiveModel {
            id: Set(entry_id),
            entry_type: Set(entry_type),
            amount: Set(request.amount),
            payment_method: Set(request.payment_method),
            bank_account_id: Set(bank.as_ref().map(|b| b.id)),
            partner_id: Set(partner.id),
            reference: Set(Some(settled_numbers.join(", "))),
            created_by: Set(actor.user_id),
            entry_date: Set(request.payment_date),
            created_at: Set(Utc::now()),
        };
        entry.insert(&txn).await?;

        txn.commit().await?;

        if !unallocated.is_zero() {
            warn!(
                partner_id = %partner.id,
                %unallocated,
                "Settlement exceeded total outstanding debt; remainder left unapplied"
            );
        }
        info!(
            partner_id = %partner.id,
            %total_applied,
            orders = allocations.len(),
            settled_by = %actor.user_id,
            "Debt settled"
        );

        let settled_at = Utc::now();
        if let Err(e) = self
            .event_sender
            .send(Event::DebtSettled {
                partner_id: partner.id,
                partner_kind: partner.kind,
                total_applied,
                unallocated,
                orders_touched: allocations.len(),
                settled_by: actor.user_id,
                settled_at,
            })
            .await
        {
            error!(error = %e, "Failed to emit DebtSettled event");
        }
        if let Err(e) = self
            .event_sender
            .send(Event::LedgerEntryPosted {
                entry_id,
                bank_account_id: bank.as_ref().map(|b| b.id),
                amount: request.amount,
            })
            .await
        {
            error!(error = %e, "Failed to emit LedgerEntryPosted event");
        }

        Ok(SettlementBreakdown {
            partner_id: partner.id,
            partner_kind: partner.kind,
            amount: request.amount,
            total_applied,
            unallocated,
            ledger_entry_id: entry_id,
            allocations,
        })
    }
}

/// Non-cancelled orders with a positive remaining amount, oldest first.
async fn load_outstanding(
    txn: &DatabaseTransaction,
    partner_id: Uuid,
    kind: PartnerKind,
) -> Result<Vec<OutstandingOrder>, ServiceError> {
    let orders = match kind {
        PartnerKind::Customer => SalesOrder::find()
            .filter(sales_order::Column::PartnerId.eq(partner_id))
            .filter(sales_order::Column::Status.ne(STATUS_CANCELLED))
            .filter(
                Expr::col(sales_order::Column::PaidAmount)
                    .lt(Expr::col(sales_order::Column::TotalAmount)),
            )
            .order_by_asc(sales_order::Column::CreatedAt)
            .all(txn)
            .await?
            .into_iter()
            .map(|o| OutstandingOrder {
                id: o.id,
                order_number: o.order_number,
                total: o.total_amount,
                paid: o.paid_amount,
            })
            .collect(),
        PartnerKind::Supplier => PurchaseOrder::find()
            .filter(purchase_order::Column::PartnerId.eq(partner_id))
            .filter(purchase_order::Column::Status.ne(STATUS_CANCELLED))
            .filter(
                Expr::col(purchase_order::Column::PaidAmount)
                    .lt(Expr::col(purchase_order::Column::TotalAmount)),
            )
            .order_by_asc(purchase_order::Column::CreatedAt)
            .all(txn)
            .await?
            .into_iter()
            .map(|o| OutstandingOrder {
                id: o.id,
                order_number: o.order_number,
                total: o.total_amount,
                paid: o.paid_amount,
            })
            .collect(),
    };
    Ok(orders)
}

/// Writes the planner's output back, guarding each order with a compare-and-
/// set on the paid amount it was planned against. A lost race aborts the
/// whole settlement as `Conflict`.
async fn apply_allocations(
    txn: &DatabaseTransaction,
    kind: PartnerKind,
    outstanding: &[OutstandingOrder],
    allocations: &[OrderAllocation],
) -> Result<(), ServiceError> {
    let now = Utc::now();

    for allocation in allocations {
        if allocation.applied.is_zero() {
            continue;
        }
        let planned_against = outstanding
            .iter()
            .find(|o| o.id == allocation.order_id)
            .map(|o| o.paid)
            .ok_or_else(|| {
                ServiceError::InternalError("allocation references an unknown order".into())
            })?;

        let updated = match kind {
            PartnerKind::Customer => {
                SalesOrder::update_many()
                    .col_expr(
                        sales_order::Column::PaidAmount,
                        Expr::value(allocation.new_paid_amount),
                    )
                    .col_expr(
                        sales_order::Column::PaymentStatus,
                        Expr::value(allocation.new_payment_status),
                    )
                    .col_expr(sales_order::Column::UpdatedAt, Expr::value(now))
                    .filter(sales_order::Column::Id.eq(allocation.order_id))
                    .filter(sales_order::Column::PaidAmount.eq(planned_against))
                    .exec(txn)
                    .await?
            }
            PartnerKind::Supplier => {
                PurchaseOrder::update_many()
                    .col_expr(
                        purchase_order::Column::PaidAmount,
                        Expr::value(allocation.new_paid_amount),
                    )
                    .col_expr(
                        purchase_order::Column::PaymentStatus,
                        Expr::value(allocation.new_payment_status),
                    )
                    .col_expr(purchase_order::Column::UpdatedAt, Expr::value(now))
                    .filter(purchase_order::Column::Id.eq(allocation.order_id))
                    .filter(purchase_order::Column::PaidAmount.eq(planned_against))
                    .exec(txn)
                    .await?
            }
        };

        if updated.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "order {} was settled concurrently",
                allocation.order_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(total: Decimal, paid: Decimal) -> OutstandingOrder {
        OutstandingOrder {
            id: Uuid::new_v4(),
            order_number: format!("SO-{}", Uuid::new_v4().simple()),
            total,
            paid,
        }
    }

    #[test]
    fn fifo_walk_is_deterministic() {
        let orders = vec![
            order(dec!(100), dec!(0)),
            order(dec!(50), dec!(0)),
            order(dec!(30), dec!(0)),
        ];
        let allocations = plan_allocation(&orders, dec!(120));

        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].applied, dec!(100));
        assert_eq!(allocations[0].new_payment_status, PaymentStatus::Paid);
        assert_eq!(allocations[1].applied, dec!(20));
        assert_eq!(allocations[1].new_payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn overpayment_is_left_unallocated() {
        let orders = vec![order(dec!(100), dec!(20)), order(dec!(100), dec!(0))];
        let allocations = plan_allocation(&orders, dec!(500));

        let applied: Decimal = allocations.iter().map(|a| a.applied).sum();
        assert_eq!(applied, dec!(180));
        assert!(allocations
            .iter()
            .all(|a| a.new_payment_status == PaymentStatus::Paid));
    }

    #[test]
    fn partially_paid_orders_resume_where_they_left_off() {
        let orders = vec![order(dec!(80), dec!(30))];
        let allocations = plan_allocation(&orders, dec!(10));

        assert_eq!(allocations[0].applied, dec!(10));
        assert_eq!(allocations[0].new_paid_amount, dec!(40));
        assert_eq!(allocations[0].new_payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn exact_payment_marks_everything_paid() {
        let orders = vec![order(dec!(60), dec!(0)), order(dec!(40), dec!(0))];
        let allocations = plan_allocation(&orders, dec!(100));

        assert_eq!(allocations.len(), 2);
        assert!(allocations
            .iter()
            .all(|a| a.new_payment_status == PaymentStatus::Paid));
        let applied: Decimal = allocations.iter().map(|a| a.applied).sum();
        assert_eq!(applied, dec!(100));
    }
}
