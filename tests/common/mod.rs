//! Shared harness for integration tests: an engine backed by a throwaway
//! sqlite database with migrations applied, plus seeding helpers.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use opsledger::auth::{Action, Actor, RoleAccess};
use opsledger::config::AppConfig;
use opsledger::db;
use opsledger::entities::{
    bank_account, material, movement_document, partner, partner::PartnerKind, permission_grant,
    product, purchase_order, sales_order, stock_balance, stock_history, warehouse,
    warehouse::WarehouseKind, ItemKind, ItemRef, PaymentStatus,
};
use opsledger::events::{self, EventSender};
use opsledger::EngineState;

pub struct TestEngine {
    pub state: EngineState,
    /// Full-access actor in `branch`.
    pub admin: Actor,
    pub branch: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: tempfile::TempDir,
}

impl TestEngine {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("opsledger_test.db");
        let mut cfg = AppConfig::new(format!("sqlite://{}?mode=rwc", db_path.display()), "test");
        // One pooled connection serializes writers, which is what sqlite
        // wants from us.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let (tx, rx) = mpsc::channel(100);
        let sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let branch = Uuid::new_v4();
        let state = EngineState::new(Arc::new(pool), sender);
        let admin = Actor::new(Uuid::new_v4(), RoleAccess::Full, branch);

        Self {
            state,
            admin,
            branch,
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Actor bound to a stored role and a branch.
    pub fn restricted_actor(&self, role_id: Uuid, branch_id: Uuid) -> Actor {
        Actor::new(Uuid::new_v4(), RoleAccess::Role(role_id), branch_id)
    }

    pub async fn seed_warehouse(&self, branch_id: Uuid, kind: WarehouseKind) -> warehouse::Model {
        let suffix = Uuid::new_v4().simple().to_string();
        warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(format!("WH-{}", &suffix[..8])),
            name: Set(format!("Warehouse {}", &suffix[..4])),
            branch_id: Set(branch_id),
            kind: Set(kind),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed warehouse")
    }

    pub async fn seed_material(&self, branch_id: Uuid) -> material::Model {
        let suffix = Uuid::new_v4().simple().to_string();
        material::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(format!("MAT-{}", &suffix[..8])),
            name: Set(format!("Material {}", &suffix[..4])),
            unit: Set("kg".into()),
            branch_id: Set(branch_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed material")
    }

    pub async fn seed_product(&self, branch_id: Uuid) -> product::Model {
        let suffix = Uuid::new_v4().simple().to_string();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(format!("PRD-{}", &suffix[..8])),
            name: Set(format!("Product {}", &suffix[..4])),
            unit: Set("pcs".into()),
            branch_id: Set(branch_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed product")
    }

    pub async fn seed_partner(&self, kind: PartnerKind, debt: Decimal) -> partner::Model {
        partner::ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(kind),
            name: Set(format!("Partner {}", Uuid::new_v4().simple())),
            debt_amount: Set(debt),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed partner")
    }

    /// Seeds a sales order `age_days` in the past so FIFO ordering is
    /// deterministic.
    pub async fn seed_sales_order(
        &self,
        partner_id: Uuid,
        total: Decimal,
        paid: Decimal,
        age_days: i64,
    ) -> sales_order::Model {
        sales_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(format!("SO-{}", Uuid::new_v4().simple())),
            partner_id: Set(partner_id),
            total_amount: Set(total),
            paid_amount: Set(paid),
            payment_status: Set(PaymentStatus::from_amounts(paid, total)),
            status: Set("CONFIRMED".into()),
            created_at: Set(Utc::now() - Duration::days(age_days)),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed sales order")
    }

    pub async fn seed_cancelled_sales_order(
        &self,
        partner_id: Uuid,
        total: Decimal,
        age_days: i64,
    ) -> sales_order::Model {
        sales_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(format!("SO-{}", Uuid::new_v4().simple())),
            partner_id: Set(partner_id),
            total_amount: Set(total),
            paid_amount: Set(Decimal::ZERO),
            payment_status: Set(PaymentStatus::Unpaid),
            status: Set(sales_order::STATUS_CANCELLED.into()),
            created_at: Set(Utc::now() - Duration::days(age_days)),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed cancelled sales order")
    }

    pub async fn seed_purchase_order(
        &self,
        partner_id: Uuid,
        total: Decimal,
        paid: Decimal,
        age_days: i64,
    ) -> purchase_order::Model {
        purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(format!("PO-{}", Uuid::new_v4().simple())),
            partner_id: Set(partner_id),
            total_amount: Set(total),
            paid_amount: Set(paid),
            payment_status: Set(PaymentStatus::from_amounts(paid, total)),
            status: Set("CONFIRMED".into()),
            created_at: Set(Utc::now() - Duration::days(age_days)),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed purchase order")
    }

    pub async fn seed_bank_account(&self, branch_id: Uuid, balance: Decimal) -> bank_account::Model {
        let suffix = Uuid::new_v4().simple().to_string();
        bank_account::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(format!("BA-{}", &suffix[..8])),
            name: Set(format!("Account {}", &suffix[..4])),
            branch_id: Set(branch_id),
            balance: Set(balance),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed bank account")
    }

    /// Inserts one capability-matrix row for a role.
    pub async fn grant(
        &self,
        role_id: Uuid,
        resource: &str,
        actions: &[Action],
    ) -> permission_grant::Model {
        permission_grant::ActiveModel {
            id: Set(Uuid::new_v4()),
            role_id: Set(role_id),
            resource: Set(resource.to_string()),
            can_view: Set(actions.contains(&Action::View)),
            can_create: Set(actions.contains(&Action::Create)),
            can_edit: Set(actions.contains(&Action::Edit)),
            can_delete: Set(actions.contains(&Action::Delete)),
        }
        .insert(self.db())
        .await
        .expect("seed permission grant")
    }

    /// Current committed balance, zero if the row was never created.
    pub async fn balance_of(&self, warehouse_id: Uuid, item: ItemRef) -> Decimal {
        stock_balance::Entity::find()
            .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_balance::Column::ItemId.eq(item.id))
            .filter(stock_balance::Column::ItemKind.eq(item.kind))
            .one(self.db())
            .await
            .expect("balance query")
            .map(|b| b.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn history_for(&self, warehouse_id: Uuid, item_id: Uuid) -> Vec<stock_history::Model> {
        stock_history::Entity::find()
            .filter(stock_history::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_history::Column::ItemId.eq(item_id))
            .all(self.db())
            .await
            .expect("history query")
    }

    pub async fn movement_count(&self) -> u64 {
        use sea_orm::PaginatorTrait;
        movement_document::Entity::find()
            .count(self.db())
            .await
            .expect("movement count")
    }
}

/// Convenience builder for IN/OUT requests with a single line.
pub fn single_line_request(
    direction: movement_document::MovementDirection,
    source: Option<Uuid>,
    dest: Option<Uuid>,
    item_id: Uuid,
    quantity: Decimal,
    unit_price: Option<Decimal>,
) -> opsledger::services::movements::CreateMovementRequest {
    opsledger::services::movements::CreateMovementRequest {
        direction,
        source_warehouse_id: source,
        dest_warehouse_id: dest,
        lines: vec![opsledger::services::movements::MovementLineInput {
            item_id,
            quantity,
            unit_price,
        }],
        notes: None,
    }
}

/// Shorthand for an ItemRef of either kind.
pub fn item_ref(kind: ItemKind, id: Uuid) -> ItemRef {
    ItemRef { kind, id }
}
