mod common;

use common::TestEngine;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

use opsledger::entities::ledger_entry::{self, LedgerEntryType, PaymentMethod};
use opsledger::entities::partner::{self, PartnerKind};
use opsledger::entities::{bank_account, purchase_order, sales_order, PaymentStatus};
use opsledger::errors::ServiceError;
use opsledger::services::settlements::SettleDebtRequest;

fn request(partner_id: Uuid, kind: PartnerKind, amount: Decimal, bank: Option<Uuid>) -> SettleDebtRequest {
    SettleDebtRequest {
        partner_id,
        partner_kind: kind,
        amount,
        payment_date: Utc::now().date_naive(),
        payment_method: PaymentMethod::BankTransfer,
        bank_account_id: bank,
    }
}

#[tokio::test]
async fn fifo_allocation_pays_oldest_orders_first() {
    let engine = TestEngine::new().await;
    let customer = engine.seed_partner(PartnerKind::Customer, dec!(180)).await;
    let oldest = engine.seed_sales_order(customer.id, dec!(100), dec!(0), 30).await;
    let middle = engine.seed_sales_order(customer.id, dec!(50), dec!(0), 20).await;
    let newest = engine.seed_sales_order(customer.id, dec!(30), dec!(0), 10).await;
    let bank = engine.seed_bank_account(engine.branch, dec!(1000)).await;

    let breakdown = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(customer.id, PartnerKind::Customer, dec!(120), Some(bank.id)),
        )
        .await
        .expect("settle");

    assert_eq!(breakdown.total_applied, dec!(120));
    assert_eq!(breakdown.unallocated, dec!(0));
    assert_eq!(breakdown.allocations.len(), 2);
    assert_eq!(breakdown.allocations[0].order_id, oldest.id);
    assert_eq!(breakdown.allocations[0].applied, dec!(100));
    assert_eq!(breakdown.allocations[1].order_id, middle.id);
    assert_eq!(breakdown.allocations[1].applied, dec!(20));

    let oldest = sales_order::Entity::find_by_id(oldest.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(oldest.paid_amount, dec!(100));
    assert_eq!(oldest.payment_status, PaymentStatus::Paid);

    let middle = sales_order::Entity::find_by_id(middle.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(middle.paid_amount, dec!(20));
    assert_eq!(middle.payment_status, PaymentStatus::Partial);

    let newest = sales_order::Entity::find_by_id(newest.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(newest.paid_amount, dec!(0));
    assert_eq!(newest.payment_status, PaymentStatus::Unpaid);

    // Partner debt shrinks by the applied total, bank grows by the receipt.
    let p = partner::Entity::find_by_id(customer.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(p.debt_amount, dec!(60));
    let b = bank_account::Entity::find_by_id(bank.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.balance, dec!(1120));
}

#[tokio::test]
async fn overpayment_leaves_remainder_unallocated() {
    let engine = TestEngine::new().await;
    let customer = engine.seed_partner(PartnerKind::Customer, dec!(180)).await;
    engine.seed_sales_order(customer.id, dec!(100), dec!(20), 5).await;
    engine.seed_sales_order(customer.id, dec!(100), dec!(0), 1).await;
    let bank = engine.seed_bank_account(engine.branch, dec!(0)).await;

    let breakdown = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(customer.id, PartnerKind::Customer, dec!(500), Some(bank.id)),
        )
        .await
        .unwrap();

    assert_eq!(breakdown.total_applied, dec!(180));
    assert_eq!(breakdown.unallocated, dec!(320));
    assert!(breakdown
        .allocations
        .iter()
        .all(|a| a.new_payment_status == PaymentStatus::Paid));

    // Debt reflects what was applied, the ledger and bank carry the full
    // received amount.
    let p = partner::Entity::find_by_id(customer.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(p.debt_amount, dec!(0));
    let b = bank_account::Entity::find_by_id(bank.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.balance, dec!(500));
}

#[tokio::test]
async fn supplier_settlement_posts_a_payment_entry() {
    let engine = TestEngine::new().await;
    let supplier = engine.seed_partner(PartnerKind::Supplier, dec!(70)).await;
    let po = engine.seed_purchase_order(supplier.id, dec!(70), dec!(0), 3).await;
    let bank = engine.seed_bank_account(engine.branch, dec!(200)).await;

    let breakdown = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(supplier.id, PartnerKind::Supplier, dec!(70), Some(bank.id)),
        )
        .await
        .unwrap();
    assert_eq!(breakdown.total_applied, dec!(70));

    let po = purchase_order::Entity::find_by_id(po.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(po.payment_status, PaymentStatus::Paid);

    // Paying a supplier drains the account.
    let b = bank_account::Entity::find_by_id(bank.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.balance, dec!(130));

    let entry = ledger_entry::Entity::find_by_id(breakdown.ledger_entry_id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.entry_type, LedgerEntryType::Payment);
    assert_eq!(entry.amount, dec!(70));
    assert_eq!(entry.partner_id, supplier.id);
    assert_eq!(entry.bank_account_id, Some(bank.id));
    assert_eq!(entry.reference.as_deref(), Some(po.order_number.as_str()));
}

#[tokio::test]
async fn cash_settlement_needs_no_bank_account() {
    let engine = TestEngine::new().await;
    let customer = engine.seed_partner(PartnerKind::Customer, dec!(40)).await;
    engine.seed_sales_order(customer.id, dec!(40), dec!(0), 1).await;

    let breakdown = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            SettleDebtRequest {
                partner_id: customer.id,
                partner_kind: PartnerKind::Customer,
                amount: dec!(40),
                payment_date: Utc::now().date_naive(),
                payment_method: PaymentMethod::Cash,
                bank_account_id: None,
            },
        )
        .await
        .unwrap();

    let entry = ledger_entry::Entity::find_by_id(breakdown.ledger_entry_id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.bank_account_id, None);
    assert_eq!(entry.entry_type, LedgerEntryType::Receipt);
}

#[tokio::test]
async fn cancelled_orders_are_never_allocated_to() {
    let engine = TestEngine::new().await;
    let customer = engine.seed_partner(PartnerKind::Customer, dec!(50)).await;
    let cancelled = engine
        .seed_cancelled_sales_order(customer.id, dec!(100), 30)
        .await;
    let live = engine.seed_sales_order(customer.id, dec!(50), dec!(0), 1).await;

    let breakdown = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(customer.id, PartnerKind::Customer, dec!(50), None),
        )
        .await
        .unwrap();

    assert_eq!(breakdown.allocations.len(), 1);
    assert_eq!(breakdown.allocations[0].order_id, live.id);

    let cancelled = sales_order::Entity::find_by_id(cancelled.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.paid_amount, dec!(0));
}

#[tokio::test]
async fn settlement_input_errors() {
    let engine = TestEngine::new().await;
    let customer = engine.seed_partner(PartnerKind::Customer, dec!(0)).await;

    // Non-positive amount.
    let err = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(customer.id, PartnerKind::Customer, dec!(0), None),
        )
        .await
        .expect_err("zero amount");
    assert!(matches!(err, ServiceError::InvalidAmount(_)));

    // Unknown partner.
    let err = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(Uuid::new_v4(), PartnerKind::Customer, dec!(10), None),
        )
        .await
        .expect_err("unknown partner");
    assert!(matches!(err, ServiceError::NotFound(_)));

    // Kind mismatch.
    let err = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(customer.id, PartnerKind::Supplier, dec!(10), None),
        )
        .await
        .expect_err("kind mismatch");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Nothing outstanding.
    let err = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(customer.id, PartnerKind::Customer, dec!(10), None),
        )
        .await
        .expect_err("no outstanding orders");
    assert!(matches!(err, ServiceError::NoOutstandingOrders(_)));

    // Unknown bank account.
    engine.seed_sales_order(customer.id, dec!(10), dec!(0), 1).await;
    let err = engine
        .state
        .settlements
        .settle_debt(
            &engine.admin,
            request(customer.id, PartnerKind::Customer, dec!(10), Some(Uuid::new_v4())),
        )
        .await
        .expect_err("unknown bank account");
    assert!(matches!(err, ServiceError::NotFound(_)));

    // No ledger rows were written by any of the failures.
    let entries = ledger_entry::Entity::find().all(engine.db()).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn cross_branch_bank_account_is_forbidden() {
    let engine = TestEngine::new().await;
    let customer = engine.seed_partner(PartnerKind::Customer, dec!(10)).await;
    engine.seed_sales_order(customer.id, dec!(10), dec!(0), 1).await;
    let foreign_bank = engine.seed_bank_account(Uuid::new_v4(), dec!(0)).await;

    let role_id = Uuid::new_v4();
    engine
        .grant(
            role_id,
            opsledger::auth::resources::FINANCE_DEBTS,
            &[opsledger::auth::Action::Create],
        )
        .await;
    let clerk = engine.restricted_actor(role_id, engine.branch);

    let err = engine
        .state
        .settlements
        .settle_debt(
            &clerk,
            request(customer.id, PartnerKind::Customer, dec!(10), Some(foreign_bank.id)),
        )
        .await
        .expect_err("foreign branch account");
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn partial_settlements_accumulate() {
    let engine = TestEngine::new().await;
    let customer = engine.seed_partner(PartnerKind::Customer, dec!(100)).await;
    let order = engine.seed_sales_order(customer.id, dec!(100), dec!(0), 1).await;

    for _ in 0..2 {
        engine
            .state
            .settlements
            .settle_debt(
                &engine.admin,
                request(customer.id, PartnerKind::Customer, dec!(40), None),
            )
            .await
            .unwrap();
    }

    let order = sales_order::Entity::find_by_id(order.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.paid_amount, dec!(80));
    assert_eq!(order.payment_status, PaymentStatus::Partial);

    let p = partner::Entity::find_by_id(customer.id)
        .one(engine.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(p.debt_amount, dec!(20));

    let entries = ledger_entry::Entity::find().all(engine.db()).await.unwrap();
    assert_eq!(entries.len(), 2);
}
