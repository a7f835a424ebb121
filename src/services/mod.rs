pub mod movements;
pub mod settlements;

pub use movements::InventoryMovementService;
pub use settlements::DebtSettlementService;
