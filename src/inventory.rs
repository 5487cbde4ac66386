//! Rebuilding current stock from the purchase and sale logs.

use chrono::NaiveDate;

use crate::{InventoryEntry, PurchaseRecord, SaleRecord};

/// Computes the stock on hand at `today`.
///
/// A purchased lot counts if it was bought on or before `today` and has not
/// expired (its expiration date is `today` or later). Lots of the same product
/// are merged into one entry, which keeps the expiration date of the first lot
/// seen in the purchase log. Every sale made on or before `today` is then
/// subtracted from its product; a product whose stock reaches zero or less is
/// dropped. Sales of products with no stock are ignored.
///
/// Entries come out in the order their products were first purchased.
#[must_use]
pub fn reconstruct(
    purchases: &[PurchaseRecord],
    sales: &[SaleRecord],
    today: NaiveDate,
) -> Vec<InventoryEntry> {
    let mut stock: Vec<InventoryEntry> = Vec::new();
    for lot in purchases
        .iter()
        .filter(|p| p.purchase_date <= today && p.expiration_date >= today)
    {
        match stock.iter_mut().find(|e| e.product == lot.product) {
            Some(entry) => entry.quantity += i64::from(lot.quantity),
            None => stock.push(InventoryEntry {
                product: lot.product.clone(),
                quantity: i64::from(lot.quantity),
                expiration_date: lot.expiration_date,
            }),
        }
    }
    for sale in sales.iter().filter(|s| s.sale_date <= today) {
        if let Some(pos) = stock.iter().position(|e| e.product == sale.product) {
            stock[pos].quantity -= i64::from(sale.quantity);
            if stock[pos].quantity <= 0 {
                stock.remove(pos);
            }
        }
    }
    stock
}

/// Returns the quantity of `product` in `stock`, or zero if it has none.
#[must_use]
pub fn available(stock: &[InventoryEntry], product: &str) -> i64 {
    stock
        .iter()
        .find(|e| e.product == product)
        .map_or(0, |e| e.quantity)
}
