pub mod bank_account;
pub mod document_sequence;
pub mod ledger_entry;
pub mod material;
pub mod movement_document;
pub mod movement_line;
pub mod partner;
pub mod permission_grant;
pub mod product;
pub mod purchase_order;
pub mod sales_order;
pub mod stock_balance;
pub mod stock_history;
pub mod warehouse;

pub use sales_order::PaymentStatus;
pub use stock_balance::{ItemKind, ItemRef};
