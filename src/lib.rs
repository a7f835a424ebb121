//! opsledger — ledger consistency engine for a multi-branch back office.
//!
//! Two transactional subsystems share one hard problem: turning a single
//! caller-supplied amount into multiple coordinated row mutations that either
//! all succeed or none, never drive a balance negative, and are auditable.
//!
//! - the inventory movement lifecycle (draft/approval stock documents over
//!   per-warehouse balances), and
//! - the debt settlement allocator (FIFO payment distribution over a
//!   partner's outstanding orders, synchronized with the cash/bank ledger).
//!
//! The crate is a library-style domain service: no wire protocol, invoked
//! in-process by a boundary layer that supplies an authenticated [`auth::Actor`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Aggregate wiring of the engine's services over one connection pool.
#[derive(Clone)]
pub struct EngineState {
    pub db: Arc<DatabaseConnection>,
    pub gate: auth::PermissionGate,
    pub movements: services::InventoryMovementService,
    pub settlements: services::DebtSettlementService,
}

impl EngineState {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: events::EventSender) -> Self {
        let gate = auth::PermissionGate::new(db.clone());
        let movements = services::InventoryMovementService::new(
            db.clone(),
            gate.clone(),
            event_sender.clone(),
        );
        let settlements =
            services::DebtSettlementService::new(db.clone(), gate.clone(), event_sender);
        Self {
            db,
            gate,
            movements,
            settlements,
        }
    }
}
