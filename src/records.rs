use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    money::Money,
    store::{Draft, Entry, Log, Logged},
};

/// One purchased lot, as stored in the purchases log.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PurchaseRecord {
    pub id: u64,
    pub product: String,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(rename = "date")]
    pub purchase_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

impl Entry for PurchaseRecord {
    const LOG: Log = Log::Purchases;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "product",
        "quantity",
        "unit_price",
        "date",
        "expiration_date",
    ];
}

impl Logged for PurchaseRecord {
    fn id(&self) -> u64 {
        self.id
    }
}

/// One sale, as stored in the sales log.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SaleRecord {
    pub id: u64,
    pub product: String,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(rename = "date")]
    pub sale_date: NaiveDate,
}

impl Entry for SaleRecord {
    const LOG: Log = Log::Sales;
    const COLUMNS: &'static [&'static str] = &["id", "product", "quantity", "unit_price", "date"];
}

impl Logged for SaleRecord {
    fn id(&self) -> u64 {
        self.id
    }
}

/// Current stock of one product, derived from the purchase and sale logs.
///
/// The inventory file holding these is a cache: it is rewritten wholesale by
/// every reconstruction and never edited in place.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InventoryEntry {
    pub product: String,
    pub quantity: i64,
    pub expiration_date: NaiveDate,
}

impl Entry for InventoryEntry {
    const LOG: Log = Log::Inventory;
    const COLUMNS: &'static [&'static str] = &["product", "quantity", "expiration_date"];
}

/// A purchase that has not been assigned an id yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewPurchase {
    pub product: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub purchase_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

impl Draft for NewPurchase {
    type Record = PurchaseRecord;

    fn with_id(self, id: u64) -> PurchaseRecord {
        PurchaseRecord {
            id,
            product: self.product,
            quantity: self.quantity,
            unit_price: self.unit_price,
            purchase_date: self.purchase_date,
            expiration_date: self.expiration_date,
        }
    }
}

/// A sale that has not been assigned an id yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewSale {
    pub product: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub sale_date: NaiveDate,
}

impl Draft for NewSale {
    type Record = SaleRecord;

    fn with_id(self, id: u64) -> SaleRecord {
        SaleRecord {
            id,
            product: self.product,
            quantity: self.quantity,
            unit_price: self.unit_price,
            sale_date: self.sale_date,
        }
    }
}
