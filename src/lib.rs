#![doc = include_str!("../README.md")]

pub mod clock;
mod error;
pub mod finance;
pub mod inventory;
mod money;
mod records;
pub mod report;
pub mod store;
mod supermarket;

pub use clock::{Clock, ClockFile};
pub use error::{Error, Result};
pub use money::Money;
pub use records::{InventoryEntry, NewPurchase, NewSale, PurchaseRecord, SaleRecord};
pub use store::Store;
pub use supermarket::Supermarket;
