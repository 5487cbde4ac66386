use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    finance::{self, DailyRevenue, DateRange, ProfitFilter, ProfitLine, RevenueSummary},
    inventory,
    store::StoreLock,
    Error, InventoryEntry, NewPurchase, NewSale, PurchaseRecord, Result, SaleRecord, Store,
};

/// The operations of the shop, all seen from one fixed virtual today.
///
/// Create one per command with the date from [`Clock::today`](crate::Clock::today),
/// so that every step of the command agrees on what day it is.
#[derive(Clone, Debug)]
pub struct Supermarket {
    store: Store,
    today: NaiveDate,
}

impl Supermarket {
    #[must_use]
    pub fn new(store: Store, today: NaiveDate) -> Self {
        Self { store, today }
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Records a purchase, then rebuilds the inventory cache.
    ///
    /// Both logs are read before anything is written, so a malformed sales
    /// log refuses the purchase instead of leaving it recorded with a stale
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if either log is malformed, in which case
    /// nothing is written, or any error from writing the purchase or the
    /// inventory.
    pub fn buy(&self, purchase: NewPurchase) -> Result<PurchaseRecord> {
        if purchase.expiration_date < purchase.purchase_date {
            warn!(
                product = %purchase.product,
                date = %purchase.purchase_date,
                expiration_date = %purchase.expiration_date,
                "purchase expires before it was bought"
            );
        }
        let lock = self.store.lock()?;
        self.compute(lock.store())?;
        let record = lock.append(purchase)?;
        self.reconstruct_locked(&lock)?;
        Ok(record)
    }

    /// Records a sale, then rebuilds the inventory cache.
    ///
    /// The sale is refused unless the inventory at the virtual today holds at
    /// least the quantity sold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientStock`] if there is not enough stock, in
    /// which case nothing is written, or any error from reading or writing the
    /// logs.
    pub fn sell(&self, sale: NewSale) -> Result<SaleRecord> {
        let lock = self.store.lock()?;
        let stock = self.compute(lock.store())?;
        let available = inventory::available(&stock, &sale.product);
        if available < i64::from(sale.quantity) {
            return Err(Error::InsufficientStock {
                product: sale.product,
                requested: sale.quantity,
                available,
            });
        }
        let record = lock.append(sale)?;
        self.reconstruct_locked(&lock)?;
        Ok(record)
    }

    /// Rebuilds the inventory at the virtual today and rewrites the cache.
    ///
    /// The cache is only written once the whole inventory has been computed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if either log is malformed, and any error
    /// from locking the store or writing the cache.
    pub fn reconstruct(&self) -> Result<Vec<InventoryEntry>> {
        let lock = self.store.lock()?;
        self.reconstruct_locked(&lock)
    }

    fn reconstruct_locked(&self, lock: &StoreLock<'_>) -> Result<Vec<InventoryEntry>> {
        let stock = self.compute(lock.store())?;
        lock.replace_all(&stock)?;
        info!(today = %self.today, products = stock.len(), "rebuilt inventory");
        Ok(stock)
    }

    fn compute(&self, store: &Store) -> Result<Vec<InventoryEntry>> {
        let purchases: Vec<PurchaseRecord> = store.read_all()?;
        let sales: Vec<SaleRecord> = store.read_all()?;
        Ok(inventory::reconstruct(&purchases, &sales, self.today))
    }

    /// Returns the purchase log.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the log.
    pub fn purchases(&self) -> Result<Vec<PurchaseRecord>> {
        self.store.read_all()
    }

    /// Returns the sales log.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the log.
    pub fn sales(&self) -> Result<Vec<SaleRecord>> {
        self.store.read_all()
    }

    /// Totals revenue over `range`.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the sales log, or
    /// [`Error::Overflow`] if the total does not fit.
    pub fn revenue(&self, range: DateRange) -> Result<RevenueSummary> {
        let sales = self.sales()?;
        debug!(start = %range.start, end = %range.end, "computing revenue");
        finance::revenue_summary(&sales, range)
    }

    /// Returns revenue per day over `range`.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the sales log, or
    /// [`Error::Overflow`] if a day's total does not fit.
    pub fn daily_revenue(&self, range: DateRange) -> Result<Vec<DailyRevenue>> {
        finance::daily_revenue(&self.sales()?, range)
    }

    /// Returns the profit of each sale passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the logs, or [`Error::Overflow`] if a
    /// sale's profit does not fit.
    pub fn profit(&self, filter: &ProfitFilter) -> Result<Vec<ProfitLine>> {
        let purchases = self.purchases()?;
        let sales = self.sales()?;
        finance::profit_lines(&purchases, &sales, filter)
    }
}
